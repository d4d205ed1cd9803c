use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        handlers::bulk_throttler::BulkThrottler,
        services::{
            channel::{ChannelError, ChannelGateway},
            failure_classifier::classify,
            producer::Producer,
            retry_policy::{RetryDecision, RetryPolicy},
        },
    },
    domain::{
        events::{EnvelopePayload, QueueEnvelope, decode},
        models::{
            BulkJob, DeliveryRecord, DeliveryResult, DeliveryStatus, EnvelopeType, ErrorClass,
            MessageDescriptor, ScheduledMessage,
        },
        repositories::DeliveryRecordRepository,
    },
};

/// What the consumer loop must tell the broker about a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Done; remove from the queue.
    Ack,
    /// Transient failure; redeliver after the delay.
    Requeue(Duration),
    /// Not due yet; redeliver after the delay without spending a retry.
    Defer(Duration),
    /// Permanent failure, exhausted retries or malformed payload.
    DeadLetter,
}

pub struct MessageDispatchHandler {
    gateway: ChannelGateway,
    records: Arc<dyn DeliveryRecordRepository>,
    throttler: BulkThrottler,
    producer: Producer,
    policy: RetryPolicy,
}

impl MessageDispatchHandler {
    pub fn new(
        gateway: ChannelGateway,
        records: Arc<dyn DeliveryRecordRepository>,
        producer: Producer,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            throttler: BulkThrottler::new(gateway.clone()),
            gateway,
            records,
            producer,
            policy,
        }
    }

    /// Entry point for a raw queue message delivered for the `delivered`-th time.
    pub async fn handle_delivery(&self, payload: &[u8], delivered: u32) -> DispatchOutcome {
        let mut envelope = match decode(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(error = %err, "dropping malformed envelope");
                return DispatchOutcome::DeadLetter;
            }
        };
        // Redeliveries carry the body they were published with.
        envelope.retries = envelope.retries.saturating_add(delivered.saturating_sub(1));
        self.handle(envelope).await
    }

    pub async fn handle(&self, envelope: QueueEnvelope) -> DispatchOutcome {
        let retries = envelope.retries;
        match &envelope.payload {
            EnvelopePayload::Message(message) => {
                self.dispatch_message(envelope.envelope_type, message, retries)
                    .await
            }
            EnvelopePayload::Bulk(job) => self.dispatch_bulk(job).await,
            EnvelopePayload::Scheduled(scheduled) => {
                self.dispatch_scheduled(scheduled, retries).await
            }
        }
    }

    async fn dispatch_message(
        &self,
        envelope_type: EnvelopeType,
        message: &MessageDescriptor,
        retries: u32,
    ) -> DispatchOutcome {
        let err = match self.gateway.send(message).await {
            Ok(receipt) => {
                info!(
                    queue = envelope_type.queue_name(),
                    recipient = %message.recipient,
                    provider_message_id = ?receipt.provider_message_id,
                    retries,
                    "message delivered"
                );
                let result =
                    DeliveryResult::delivered(&message.recipient, receipt.provider_message_id);
                self.record(envelope_type, message, &result, DeliveryStatus::Delivered, retries)
                    .await;
                return DispatchOutcome::Ack;
            }
            Err(err) => err,
        };

        match classify(&err) {
            ErrorClass::Permanent => {
                error!(
                    queue = envelope_type.queue_name(),
                    recipient = %message.recipient,
                    retries,
                    error = %err,
                    "permanent delivery failure, dropping message"
                );
                self.record_failure(
                    envelope_type,
                    message,
                    ErrorClass::Permanent,
                    &err,
                    DeliveryStatus::Failed,
                    retries,
                )
                .await;
                DispatchOutcome::DeadLetter
            }
            ErrorClass::Transient => {
                let retry_count = retries + 1;
                match self.policy.decide(retry_count) {
                    RetryDecision::Retry(delay) => {
                        warn!(
                            queue = envelope_type.queue_name(),
                            recipient = %message.recipient,
                            retry_count,
                            delay_secs = delay.as_secs(),
                            error = %err,
                            "transient delivery failure, requeueing"
                        );
                        self.record_failure(
                            envelope_type,
                            message,
                            ErrorClass::Transient,
                            &err,
                            DeliveryStatus::Retrying,
                            retry_count,
                        )
                        .await;
                        DispatchOutcome::Requeue(delay)
                    }
                    RetryDecision::Exhausted => {
                        error!(
                            queue = envelope_type.queue_name(),
                            recipient = %message.recipient,
                            retries,
                            error = %err,
                            "retries exhausted, dropping message"
                        );
                        self.record_failure(
                            envelope_type,
                            message,
                            ErrorClass::Transient,
                            &err,
                            DeliveryStatus::Failed,
                            retries,
                        )
                        .await;
                        DispatchOutcome::DeadLetter
                    }
                }
            }
        }
    }

    async fn dispatch_bulk(&self, job: &BulkJob) -> DispatchOutcome {
        let run = self.throttler.run(job).await;
        for outcome in &run.outcomes {
            let status = if outcome.result.success {
                DeliveryStatus::Delivered
            } else {
                DeliveryStatus::Failed
            };
            self.record(EnvelopeType::Bulk, &outcome.message, &outcome.result, status, 0)
                .await;
        }
        info!(
            sender_id = %job.sender_id,
            channel = job.channel.as_str(),
            total = run.report.total,
            delivered = run.report.success.len(),
            failed = run.report.failed.len(),
            "bulk job finished"
        );
        DispatchOutcome::Ack
    }

    async fn dispatch_scheduled(
        &self,
        scheduled: &ScheduledMessage,
        retries: u32,
    ) -> DispatchOutcome {
        let now = Utc::now();
        if scheduled.send_at > now {
            let wait = (scheduled.send_at - now).to_std().unwrap_or_default();
            return DispatchOutcome::Defer(wait);
        }

        if self
            .producer
            .enqueue(EnvelopePayload::Message(scheduled.message.clone()))
            .await
        {
            info!(
                recipient = %scheduled.message.recipient,
                channel = scheduled.message.channel.as_str(),
                "scheduled message released"
            );
            return DispatchOutcome::Ack;
        }

        let retry_count = retries + 1;
        match self.policy.decide(retry_count) {
            RetryDecision::Retry(delay) => DispatchOutcome::Requeue(delay),
            RetryDecision::Exhausted => {
                error!(
                    recipient = %scheduled.message.recipient,
                    retries,
                    "could not release scheduled message, dropping it"
                );
                let err = ChannelError::Transport("channel queue unavailable".into());
                self.record_failure(
                    EnvelopeType::Scheduled,
                    &scheduled.message,
                    ErrorClass::Transient,
                    &err,
                    DeliveryStatus::Failed,
                    retries,
                )
                .await;
                DispatchOutcome::DeadLetter
            }
        }
    }

    async fn record_failure(
        &self,
        envelope_type: EnvelopeType,
        message: &MessageDescriptor,
        class: ErrorClass,
        err: &ChannelError,
        status: DeliveryStatus,
        retry_count: u32,
    ) {
        let result = DeliveryResult::failed(&message.recipient, class, err.to_string());
        self.record(envelope_type, message, &result, status, retry_count)
            .await;
    }

    /// Record writes never change the acknowledgement decision.
    async fn record(
        &self,
        envelope_type: EnvelopeType,
        message: &MessageDescriptor,
        result: &DeliveryResult,
        status: DeliveryStatus,
        retry_count: u32,
    ) {
        let record = DeliveryRecord {
            id: Uuid::new_v4(),
            sender_id: message.sender_id.clone(),
            channel: message.channel,
            envelope_type,
            recipient: result.recipient.clone(),
            status,
            provider_message_id: result.provider_message_id.clone(),
            error_class: result.error_class,
            error_message: result.error_message.clone(),
            retry_count,
            correlation_id: message.correlation_id.clone(),
            lead_ref: message.lead_ref.clone(),
            attempted_at: Utc::now(),
        };
        if let Err(err) = self.records.insert(record).await {
            error!(
                recipient = %message.recipient,
                error = %err,
                "failed to persist delivery record"
            );
        }
    }
}
