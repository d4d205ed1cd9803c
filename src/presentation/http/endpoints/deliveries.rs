use std::sync::Arc;

use poem_openapi::{
    OpenApi,
    param::{Path, Query},
    payload::Json,
};

use crate::presentation::http::{
    endpoints::root::{ApiState, EndpointsTags},
    mappers::map_record,
    responses::{DeliveryPageDto, DeliveryStatsDto},
};

#[derive(Clone)]
pub struct DeliveriesEndpoints {
    state: Arc<ApiState>,
}

impl DeliveriesEndpoints {
    pub fn new(state: Arc<ApiState>) -> Self {
        Self { state }
    }
}

#[OpenApi]
impl DeliveriesEndpoints {
    #[oai(
        path = "/senders/:sender_id/delivery-stats",
        method = "get",
        tag = EndpointsTags::Deliveries,
    )]
    pub async fn delivery_stats(
        &self,
        sender_id: Path<String>,
    ) -> poem::Result<Json<DeliveryStatsDto>> {
        let result = self
            .state
            .delivery_stats_usecase
            .execute(&sender_id.0)
            .await
            .map_err(internal_error)?;

        Ok(Json(DeliveryStatsDto {
            sender_id: sender_id.0,
            total: result.stats.total,
            delivered: result.stats.delivered,
            retrying: result.stats.retrying,
            failed: result.stats.failed,
            balance: result.balance,
        }))
    }

    #[oai(
        path = "/senders/:sender_id/deliveries",
        method = "get",
        tag = EndpointsTags::Deliveries,
    )]
    pub async fn list_deliveries(
        &self,
        sender_id: Path<String>,
        limit: Query<Option<u32>>,
        offset: Query<Option<u32>>,
    ) -> poem::Result<Json<DeliveryPageDto>> {
        let page = self
            .state
            .list_deliveries_usecase
            .execute(&sender_id.0, limit.0, offset.0)
            .await
            .map_err(internal_error)?;

        Ok(Json(DeliveryPageDto {
            deliveries: page.records.iter().map(map_record).collect(),
            has_more: page.has_more,
            next_offset: page.next_offset,
        }))
    }
}

fn internal_error(err: anyhow::Error) -> poem::Error {
    poem::Error::from_string(err.to_string(), poem::http::StatusCode::INTERNAL_SERVER_ERROR)
}
