use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::{BulkJob, EnvelopeType, MessageDescriptor, ScheduledMessage};

pub mod codec;

pub use codec::{CodecError, decode, encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Queued,
    Processing,
    Retrying,
    Delivered,
    DeadLettered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopePayload {
    Message(MessageDescriptor),
    Bulk(BulkJob),
    Scheduled(ScheduledMessage),
}

impl EnvelopePayload {
    pub fn envelope_type(&self) -> EnvelopeType {
        match self {
            EnvelopePayload::Message(message) => message.channel.into(),
            EnvelopePayload::Bulk(_) => EnvelopeType::Bulk,
            EnvelopePayload::Scheduled(_) => EnvelopeType::Scheduled,
        }
    }

    pub fn message_type(&self) -> &'static str {
        match self {
            EnvelopePayload::Message(message) => message.content.kind(),
            EnvelopePayload::Bulk(job) => job.content.kind(),
            EnvelopePayload::Scheduled(scheduled) => scheduled.message.content.kind(),
        }
    }

    pub fn sender_id(&self) -> &str {
        match self {
            EnvelopePayload::Message(message) => &message.sender_id,
            EnvelopePayload::Bulk(job) => &job.sender_id,
            EnvelopePayload::Scheduled(scheduled) => &scheduled.message.sender_id,
        }
    }

    /// Credits a payload costs at admission: one per recipient.
    pub fn units(&self) -> u64 {
        match self {
            EnvelopePayload::Bulk(job) => job.recipients.len() as u64,
            EnvelopePayload::Message(_) | EnvelopePayload::Scheduled(_) => 1,
        }
    }
}

/// What travels through a durable queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEnvelope {
    pub envelope_type: EnvelopeType,
    pub payload: EnvelopePayload,
    pub enqueued_at: DateTime<Utc>,
    pub retries: u32,
    pub status: EnvelopeStatus,
}

impl QueueEnvelope {
    pub fn new(payload: EnvelopePayload) -> Self {
        Self {
            envelope_type: payload.envelope_type(),
            payload,
            enqueued_at: Utc::now(),
            retries: 0,
            status: EnvelopeStatus::Queued,
        }
    }
}
