use std::sync::Arc;

use crate::domain::{
    models::DeliveryStats,
    repositories::{CreditLedger, DeliveryRecordRepository},
};

pub struct SenderDeliveryStats {
    pub stats: DeliveryStats,
    pub balance: u64,
}

pub struct GetDeliveryStatsUseCase {
    records: Arc<dyn DeliveryRecordRepository>,
    ledger: Arc<dyn CreditLedger>,
}

impl GetDeliveryStatsUseCase {
    pub fn new(records: Arc<dyn DeliveryRecordRepository>, ledger: Arc<dyn CreditLedger>) -> Self {
        Self { records, ledger }
    }

    pub async fn execute(&self, sender_id: &str) -> anyhow::Result<SenderDeliveryStats> {
        let stats = self.records.stats_by_sender(sender_id).await?;
        let balance = self.ledger.balance(sender_id).await?;
        Ok(SenderDeliveryStats { stats, balance })
    }
}
