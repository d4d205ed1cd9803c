use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    errors::LedgerError,
    models::{DeliveryRecord, DeliveryStats, DeliveryStatus},
    repositories::{CreditLedger, DeliveryRecordRepository},
};

#[derive(Default)]
pub struct InMemoryCreditLedger {
    balances: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn reserve(&self, sender_id: &str, units: u64) -> Result<u64, LedgerError> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(sender_id.to_string()).or_default();
        if *balance < units {
            return Err(LedgerError::InsufficientCredits {
                balance: *balance,
                requested: units,
            });
        }
        *balance -= units;
        Ok(*balance)
    }

    async fn balance(&self, sender_id: &str) -> anyhow::Result<u64> {
        let balances = self.balances.read().await;
        Ok(balances.get(sender_id).copied().unwrap_or(0))
    }

    async fn top_up(&self, sender_id: &str, units: u64) -> anyhow::Result<u64> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(sender_id.to_string()).or_default();
        *balance = balance.saturating_add(units);
        Ok(*balance)
    }
}

#[derive(Default)]
pub struct InMemoryDeliveryRecordRepository {
    records: Arc<RwLock<Vec<DeliveryRecord>>>,
}

impl InMemoryDeliveryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<DeliveryRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl DeliveryRecordRepository for InMemoryDeliveryRecordRepository {
    async fn insert(&self, record: DeliveryRecord) -> anyhow::Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_by_sender(
        &self,
        sender_id: &str,
        limit: u32,
        offset: u32,
    ) -> anyhow::Result<Vec<DeliveryRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.sender_id == sender_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn stats_by_sender(&self, sender_id: &str) -> anyhow::Result<DeliveryStats> {
        let records = self.records.read().await;
        let mut stats = DeliveryStats::default();
        for record in records.iter().filter(|r| r.sender_id == sender_id) {
            stats.total += 1;
            match record.status {
                DeliveryStatus::Delivered => stats.delivered += 1,
                DeliveryStatus::Retrying => stats.retrying += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
