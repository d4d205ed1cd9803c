use async_trait::async_trait;

use crate::domain::{
    errors::LedgerError,
    models::{DeliveryRecord, DeliveryStats},
};

/// Per-sender prepaid balance.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Atomically decrements the balance by `units`, returning the new balance.
    async fn reserve(&self, sender_id: &str, units: u64) -> Result<u64, LedgerError>;
    async fn balance(&self, sender_id: &str) -> anyhow::Result<u64>;
    async fn top_up(&self, sender_id: &str, units: u64) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait DeliveryRecordRepository: Send + Sync {
    async fn insert(&self, record: DeliveryRecord) -> anyhow::Result<()>;

    /// Newest first.
    async fn list_by_sender(
        &self,
        sender_id: &str,
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<DeliveryRecord>>;

    async fn stats_by_sender(&self, sender_id: &str) -> anyhow::Result<DeliveryStats>;
}
