use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{
    self,
    consumer::{AckPolicy, PullConsumer, pull},
    stream::{RetentionPolicy, StorageType},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{application::services::queue::MessageQueue, domain::models::EnvelopeType};

pub const MESSAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_RETRIES_HINT: u32 = 3;
/// Deferred scheduled messages stay pending until their delayed nak expires,
/// each holding an ack slot.
pub const SCHEDULED_MAX_ACK_PENDING: i64 = 10_000;

#[derive(Clone)]
pub struct JetstreamConfig {
    pub url: String,
    pub ack_wait: Duration,
    pub message_ttl: Duration,
}

impl JetstreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ack_wait: Duration::from_secs(600),
            message_ttl: MESSAGE_TTL,
        }
    }
}

struct Connection {
    client: async_nats::Client,
    context: jetstream::Context,
}

/// Process-wide broker handle. Connects lazily and reconnects when the
/// previous connection is gone.
pub struct JetstreamQueueClient {
    config: JetstreamConfig,
    connection: Mutex<Option<Connection>>,
}

impl JetstreamQueueClient {
    pub fn new(config: JetstreamConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            connection: Mutex::new(None),
        })
    }

    /// Returns a live JetStream context with every queue declared.
    pub async fn context(&self) -> anyhow::Result<jetstream::Context> {
        let mut connection = self.connection.lock().await;
        if let Some(existing) = connection.as_ref() {
            if existing.client.connection_state() == async_nats::connection::State::Connected {
                return Ok(existing.context.clone());
            }
            warn!(url = %self.config.url, "broker connection lost, reconnecting");
        }

        let fresh = self.connect_and_declare().await?;
        let context = fresh.context.clone();
        *connection = Some(fresh);
        Ok(context)
    }

    async fn connect_and_declare(&self) -> anyhow::Result<Connection> {
        let first = self.connect().await?;
        match self.declare_queues(&first.context).await {
            Ok(()) => Ok(first),
            Err(err) => {
                warn!(error = %err, "queue declaration failed, retrying on a fresh connection");
                drop(first);
                let second = self.connect().await?;
                self.declare_queues(&second.context).await?;
                Ok(second)
            }
        }
    }

    async fn connect(&self) -> anyhow::Result<Connection> {
        let client = async_nats::connect(&self.config.url).await?;
        info!(url = %self.config.url, "connected to broker");
        let context = jetstream::new(client.clone());
        Ok(Connection { client, context })
    }

    async fn declare_queues(&self, context: &jetstream::Context) -> anyhow::Result<()> {
        for queue in EnvelopeType::ALL {
            self.declare_queue(context, queue).await?;
        }
        Ok(())
    }

    fn stream_config(&self, queue: EnvelopeType) -> jetstream::stream::Config {
        jetstream::stream::Config {
            name: queue.queue_name().to_string(),
            subjects: vec![queue.queue_name().to_string()],
            retention: RetentionPolicy::WorkQueue,
            storage: StorageType::File,
            max_age: self.config.message_ttl,
            num_replicas: 1,
            metadata: HashMap::from([(
                "x-max-retries".to_string(),
                MAX_RETRIES_HINT.to_string(),
            )]),
            ..Default::default()
        }
    }

    /// Idempotent. A stream declared with incompatible settings is deleted and
    /// recreated; messages it still held are lost.
    async fn declare_queue(
        &self,
        context: &jetstream::Context,
        queue: EnvelopeType,
    ) -> anyhow::Result<()> {
        let desired = self.stream_config(queue);
        let mut stream = context.get_or_create_stream(desired.clone()).await?;
        let info = stream.info().await?;

        if is_compatible(&info.config, &desired) {
            return Ok(());
        }

        warn!(
            queue = queue.queue_name(),
            existing_ttl_secs = info.config.max_age.as_secs(),
            desired_ttl_secs = desired.max_age.as_secs(),
            "queue declared with incompatible settings, recreating"
        );
        context.delete_stream(queue.queue_name()).await?;
        context.create_stream(desired).await?;
        Ok(())
    }

    fn consumer_config(&self, queue: EnvelopeType) -> pull::Config {
        let durable = format!("{}_worker", queue.queue_name());
        pull::Config {
            durable_name: Some(durable),
            ack_policy: AckPolicy::Explicit,
            ack_wait: self.config.ack_wait,
            max_ack_pending: match queue {
                EnvelopeType::Scheduled => SCHEDULED_MAX_ACK_PENDING,
                _ => 1,
            },
            ..Default::default()
        }
    }

    /// Durable pull consumer. Channel and bulk queues keep one message in
    /// flight; an existing consumer with other limits is replaced.
    pub async fn consumer(&self, queue: EnvelopeType) -> anyhow::Result<PullConsumer> {
        let context = self.context().await?;
        let stream = context.get_stream(queue.queue_name()).await?;
        let desired = self.consumer_config(queue);
        let durable = desired.durable_name.clone().unwrap_or_default();

        let consumer: PullConsumer = stream
            .get_or_create_consumer(&durable, desired.clone())
            .await?;
        let existing = &consumer.cached_info().config;
        if existing.max_ack_pending == desired.max_ack_pending
            && existing.ack_wait == desired.ack_wait
        {
            return Ok(consumer);
        }

        warn!(
            queue = queue.queue_name(),
            existing_max_ack_pending = existing.max_ack_pending,
            desired_max_ack_pending = desired.max_ack_pending,
            "consumer declared with other limits, recreating"
        );
        stream.delete_consumer(&durable).await?;
        Ok(stream.create_consumer(desired).await?)
    }

    /// Interval for progress acks: well inside the ack wait.
    pub fn progress_interval(&self) -> Duration {
        (self.config.ack_wait / 3).max(Duration::from_secs(1))
    }

    pub async fn connected(&self) -> bool {
        let connection = self.connection.lock().await;
        connection.as_ref().is_some_and(|c| {
            c.client.connection_state() == async_nats::connection::State::Connected
        })
    }

    pub async fn close(&self) {
        if let Some(connection) = self.connection.lock().await.take() {
            if let Err(err) = connection.client.flush().await {
                warn!(error = %err, "failed to flush broker connection on shutdown");
            }
            info!("broker connection closed");
        }
    }
}

fn is_compatible(
    existing: &jetstream::stream::Config,
    desired: &jetstream::stream::Config,
) -> bool {
    existing.max_age == desired.max_age
        && existing.retention == desired.retention
        && existing.subjects == desired.subjects
}

#[async_trait::async_trait]
impl MessageQueue for JetstreamQueueClient {
    async fn publish(&self, queue: EnvelopeType, payload: Vec<u8>) -> anyhow::Result<()> {
        let context = self.context().await?;
        // File-backed stream; awaiting the ack means the broker persisted it.
        context
            .publish(queue.queue_name().to_string(), payload.into())
            .await?
            .await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_settings_follow_queue() {
        let client = JetstreamQueueClient::new(JetstreamConfig::new("nats://localhost:4222"));
        let config = client.stream_config(EnvelopeType::Bulk);
        assert_eq!(config.name, "bulk_messages");
        assert_eq!(config.subjects, vec!["bulk_messages".to_string()]);
        assert_eq!(config.max_age, Duration::from_secs(86_400));
        assert_eq!(config.metadata.get("x-max-retries").map(String::as_str), Some("3"));
    }

    #[test]
    fn only_scheduled_consumer_allows_parked_messages() {
        let client = JetstreamQueueClient::new(JetstreamConfig::new("nats://localhost:4222"));
        for queue in [EnvelopeType::Whatsapp, EnvelopeType::Email, EnvelopeType::Bulk] {
            let config = client.consumer_config(queue);
            assert_eq!(config.max_ack_pending, 1, "{}", queue.queue_name());
            assert_eq!(config.ack_policy, AckPolicy::Explicit);
        }
        let scheduled = client.consumer_config(EnvelopeType::Scheduled);
        assert_eq!(scheduled.durable_name.as_deref(), Some("scheduled_messages_worker"));
        assert_eq!(scheduled.max_ack_pending, SCHEDULED_MAX_ACK_PENDING);
    }

    #[test]
    fn progress_acks_fire_well_inside_ack_wait() {
        let client = JetstreamQueueClient::new(JetstreamConfig::new("nats://localhost:4222"));
        assert_eq!(client.progress_interval(), Duration::from_secs(200));

        let mut config = JetstreamConfig::new("nats://localhost:4222");
        config.ack_wait = Duration::from_secs(2);
        assert_eq!(
            JetstreamQueueClient::new(config).progress_interval(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn shorter_ttl_is_incompatible() {
        let client = JetstreamQueueClient::new(JetstreamConfig::new("nats://localhost:4222"));
        let desired = client.stream_config(EnvelopeType::Whatsapp);
        let existing = jetstream::stream::Config {
            max_age: Duration::from_secs(3_600),
            ..desired.clone()
        };
        assert!(!is_compatible(&existing, &desired));
        assert!(is_compatible(&desired.clone(), &desired));
    }
}
