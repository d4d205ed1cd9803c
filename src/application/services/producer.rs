use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{
    application::services::queue::MessageQueue,
    domain::events::{EnvelopePayload, QueueEnvelope, encode},
};

/// Wraps payloads in envelopes and publishes them to their durable queue.
#[derive(Clone)]
pub struct Producer {
    queue: Arc<dyn MessageQueue>,
}

impl Producer {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }

    /// Returns `false` when the broker cannot take the message.
    pub async fn enqueue(&self, payload: EnvelopePayload) -> bool {
        self.publish(QueueEnvelope::new(payload)).await
    }

    pub async fn publish(&self, envelope: QueueEnvelope) -> bool {
        let queue = envelope.envelope_type;
        let bytes = match encode(&envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(queue = queue.queue_name(), error = %err, "failed to encode envelope");
                return false;
            }
        };

        match self.queue.publish(queue, bytes).await {
            Ok(()) => {
                debug!(
                    queue = queue.queue_name(),
                    message_type = envelope.payload.message_type(),
                    sender_id = envelope.payload.sender_id(),
                    "envelope enqueued"
                );
                true
            }
            Err(err) => {
                warn!(
                    queue = queue.queue_name(),
                    error = %err,
                    "queue unavailable, envelope not enqueued"
                );
                false
            }
        }
    }
}
