use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::channel::{Channel, EnvelopeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Transient,
    Permanent,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "transient" => Some(ErrorClass::Transient),
            "permanent" => Some(ErrorClass::Permanent),
            _ => None,
        }
    }
}

/// Outcome of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub recipient: String,
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub error_message: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(recipient: impl Into<String>, provider_message_id: Option<String>) -> Self {
        Self {
            recipient: recipient.into(),
            success: true,
            provider_message_id,
            error_class: None,
            error_message: None,
        }
    }

    pub fn failed(recipient: impl Into<String>, class: ErrorClass, message: String) -> Self {
        Self {
            recipient: recipient.into(),
            success: false,
            provider_message_id: None,
            error_class: Some(class),
            error_message: Some(message),
        }
    }
}

/// Aggregate of a bulk fan-out, in recipient order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub success: Vec<DeliveryResult>,
    pub failed: Vec<DeliveryResult>,
    pub total: usize,
}

impl BulkReport {
    pub fn from_results(results: impl IntoIterator<Item = DeliveryResult>) -> Self {
        let mut report = BulkReport::default();
        for result in results {
            report.total += 1;
            if result.success {
                report.success.push(result);
            } else {
                report.failed.push(result);
            }
        }
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Retrying,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "delivered" => Some(DeliveryStatus::Delivered),
            "retrying" => Some(DeliveryStatus::Retrying),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub sender_id: String,
    pub channel: Channel,
    pub envelope_type: EnvelopeType,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub error_class: Option<ErrorClass>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub correlation_id: Option<String>,
    pub lead_ref: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub total: u64,
    pub delivered: u64,
    pub retrying: u64,
    pub failed: u64,
}
