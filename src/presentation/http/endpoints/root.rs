use std::sync::Arc;

use poem_openapi::Tags;

use crate::application::{
    services::queue::MessageQueue,
    usecases::{
        get_delivery_stats::GetDeliveryStatsUseCase, list_deliveries::ListDeliveriesUseCase,
    },
};

#[derive(Clone)]
pub struct ApiState {
    pub queue: Arc<dyn MessageQueue>,
    pub delivery_stats_usecase: Arc<GetDeliveryStatsUseCase>,
    pub list_deliveries_usecase: Arc<ListDeliveriesUseCase>,
}

/// Enum of API sections (tags)
#[derive(Tags)]
pub enum EndpointsTags {
    Health,
    Deliveries,
}
