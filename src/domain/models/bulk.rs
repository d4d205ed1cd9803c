use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    channel::Channel,
    message::{MessageContent, MessageDescriptor, validate_recipient},
};
use crate::domain::errors::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRecipient {
    pub recipient: String,
    /// Positional overrides for the job's template parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_ref: Option<String>,
}

/// One request fanning out to many recipients on the same channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub channel: Channel,
    pub sender_id: String,
    #[serde(flatten)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub delay_ms: u64,
    pub recipients: Vec<BulkRecipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl BulkJob {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sender_id.trim().is_empty() {
            return Err(DomainError::Validation("sender id is empty".into()));
        }
        if self.recipients.is_empty() {
            return Err(DomainError::Validation("bulk job has no recipients".into()));
        }
        self.content.validate()?;
        for recipient in &self.recipients {
            validate_recipient(self.channel, &recipient.recipient)?;
        }
        Ok(())
    }

    /// Builds the single-recipient message for `recipient`, merging template parameters.
    pub fn descriptor_for(&self, recipient: &BulkRecipient) -> MessageDescriptor {
        let content = match &self.content {
            MessageContent::Template {
                template_ref,
                template_parameters,
                body,
            } => MessageContent::Template {
                template_ref: template_ref.clone(),
                template_parameters: merge_parameters(
                    template_parameters,
                    recipient.template_parameters.as_deref().unwrap_or_default(),
                ),
                body: body.clone(),
            },
            other => other.clone(),
        };

        MessageDescriptor {
            channel: self.channel,
            recipient: recipient.recipient.clone(),
            content,
            sender_id: self.sender_id.clone(),
            subject: self.subject.clone(),
            lead_ref: recipient.lead_ref.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

/// Overrides replace defaults by position; an empty override keeps the default.
pub fn merge_parameters(defaults: &[String], overrides: &[String]) -> Vec<String> {
    let len = defaults.len().max(overrides.len());
    (0..len)
        .map(|i| match overrides.get(i) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => defaults.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// A message held back until `send_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub send_at: DateTime<Utc>,
    pub message: MessageDescriptor,
}

impl ScheduledMessage {
    /// Scheduling horizon. Stays an hour inside the 24h queue TTL so a parked
    /// message is released before the stream expires it.
    pub const MAX_HORIZON_HOURS: i64 = 23;

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.send_at > now + Duration::hours(Self::MAX_HORIZON_HOURS) {
            return Err(DomainError::Validation(format!(
                "send time {} is more than {} hours ahead",
                self.send_at,
                Self::MAX_HORIZON_HOURS
            )));
        }
        self.message.validate()
    }
}
