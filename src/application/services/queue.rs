use async_trait::async_trait;

use crate::domain::models::EnvelopeType;

/// Broker seam: publishes an encoded envelope to the durable queue of `queue`.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, queue: EnvelopeType, payload: Vec<u8>) -> anyhow::Result<()>;
    async fn is_connected(&self) -> bool;
}
