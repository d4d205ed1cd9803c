use std::sync::Arc;

use crate::domain::{models::DeliveryRecord, repositories::DeliveryRecordRepository};

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

pub struct DeliveryPage {
    pub records: Vec<DeliveryRecord>,
    pub has_more: bool,
    pub next_offset: Option<u32>,
}

/// Delivery outcomes for one sender, newest first.
pub struct ListDeliveriesUseCase {
    records: Arc<dyn DeliveryRecordRepository>,
}

impl ListDeliveriesUseCase {
    pub fn new(records: Arc<dyn DeliveryRecordRepository>) -> Self {
        Self { records }
    }

    pub async fn execute(
        &self,
        sender_id: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> anyhow::Result<DeliveryPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);

        // One extra row tells whether another page exists.
        let mut records = self
            .records
            .list_by_sender(sender_id, limit + 1, offset)
            .await?;
        let has_more = records.len() > limit as usize;
        records.truncate(limit as usize);

        Ok(DeliveryPage {
            next_offset: has_more.then(|| offset + limit),
            records,
            has_more,
        })
    }
}
