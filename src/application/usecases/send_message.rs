use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use crate::{
    application::{services::producer::Producer, usecases::admit::AdmissionGate},
    domain::{
        errors::{DomainError, LedgerError},
        events::EnvelopePayload,
        models::{BulkJob, EnvelopeType, MessageDescriptor, ScheduledMessage},
    },
};

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("Insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: u64, requested: u64 },
    #[error("Messaging service unavailable")]
    ServiceUnavailable,
    #[error(transparent)]
    Ledger(anyhow::Error),
}

impl From<LedgerError> for SendError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits { balance, requested } => {
                SendError::InsufficientCredits { balance, requested }
            }
            LedgerError::Other(err) => SendError::Ledger(err),
        }
    }
}

pub enum SendMessageRequest {
    Single(MessageDescriptor),
    Bulk(BulkJob),
    Scheduled(ScheduledMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendMessageResponse {
    pub queue: EnvelopeType,
    pub units: u64,
    pub balance: u64,
}

/// Validate, reserve credits, then enqueue.
pub struct SendMessageUseCase {
    gate: Arc<AdmissionGate>,
    producer: Producer,
}

impl SendMessageUseCase {
    pub fn new(gate: Arc<AdmissionGate>, producer: Producer) -> Self {
        Self { gate, producer }
    }

    pub async fn execute(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, SendError> {
        let payload = match request {
            SendMessageRequest::Single(message) => {
                message.validate()?;
                EnvelopePayload::Message(message)
            }
            SendMessageRequest::Bulk(job) => {
                job.validate()?;
                EnvelopePayload::Bulk(job)
            }
            SendMessageRequest::Scheduled(scheduled) => {
                scheduled.validate(Utc::now())?;
                EnvelopePayload::Scheduled(scheduled)
            }
        };

        let units = payload.units();
        let admission = self.gate.admit(payload.sender_id(), units).await?;
        let queue = payload.envelope_type();
        let sender_id = payload.sender_id().to_string();

        if !self.producer.enqueue(payload).await {
            // Reserved credits stay spent; there is no refund path.
            warn!(
                sender_id = %sender_id,
                units,
                queue = queue.queue_name(),
                "credits reserved but enqueue failed"
            );
            return Err(SendError::ServiceUnavailable);
        }

        Ok(SendMessageResponse {
            queue,
            units,
            balance: admission.balance,
        })
    }
}
