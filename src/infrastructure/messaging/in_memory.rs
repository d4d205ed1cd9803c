use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{application::services::queue::MessageQueue, domain::models::EnvelopeType};

/// FIFO queues held in memory. Can be switched offline to simulate an
/// unreachable broker.
pub struct InMemoryQueue {
    queues: Arc<RwLock<HashMap<EnvelopeType, VecDeque<Vec<u8>>>>>,
    online: AtomicBool,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self {
            queues: Arc::default(),
            online: AtomicBool::new(true),
        }
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn pop(&self, queue: EnvelopeType) -> Option<Vec<u8>> {
        self.queues.write().await.get_mut(&queue)?.pop_front()
    }

    pub async fn len(&self, queue: EnvelopeType) -> usize {
        self.queues.read().await.get(&queue).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(&self, queue: EnvelopeType, payload: Vec<u8>) -> anyhow::Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            anyhow::bail!("queue {} unavailable", queue.queue_name());
        }
        self.queues
            .write()
            .await
            .entry(queue)
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
