use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EnvelopePayload, EnvelopeStatus, QueueEnvelope};
use crate::domain::models::EnvelopeType;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Envelope type {envelope_type} does not match a {channel} message")]
    ChannelMismatch {
        envelope_type: &'static str,
        channel: &'static str,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(rename = "type")]
    envelope_type: EnvelopeType,
    message_type: String,
    data: serde_json::Value,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    retries: u32,
    status: EnvelopeStatus,
}

pub fn encode(envelope: &QueueEnvelope) -> Result<Vec<u8>, CodecError> {
    let data = match &envelope.payload {
        EnvelopePayload::Message(message) => serde_json::to_value(message)?,
        EnvelopePayload::Bulk(job) => serde_json::to_value(job)?,
        EnvelopePayload::Scheduled(scheduled) => serde_json::to_value(scheduled)?,
    };
    let wire = WireEnvelope {
        envelope_type: envelope.envelope_type,
        message_type: envelope.payload.message_type().to_string(),
        data,
        timestamp: envelope.enqueued_at,
        retries: envelope.retries,
        status: envelope.status,
    };
    Ok(serde_json::to_vec(&wire)?)
}

pub fn decode(bytes: &[u8]) -> Result<QueueEnvelope, CodecError> {
    let wire: WireEnvelope = serde_json::from_slice(bytes)?;
    let payload = match wire.envelope_type {
        EnvelopeType::Whatsapp | EnvelopeType::Email => {
            let message: crate::domain::models::MessageDescriptor =
                serde_json::from_value(wire.data)?;
            if EnvelopeType::from(message.channel) != wire.envelope_type {
                return Err(CodecError::ChannelMismatch {
                    envelope_type: wire.envelope_type.as_str(),
                    channel: message.channel.as_str(),
                });
            }
            EnvelopePayload::Message(message)
        }
        EnvelopeType::Bulk => EnvelopePayload::Bulk(serde_json::from_value(wire.data)?),
        EnvelopeType::Scheduled => EnvelopePayload::Scheduled(serde_json::from_value(wire.data)?),
    };

    Ok(QueueEnvelope {
        envelope_type: wire.envelope_type,
        payload,
        enqueued_at: wire.timestamp,
        retries: wire.retries,
        status: wire.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        BulkJob, BulkRecipient, Channel, MediaRef, MediaType, MessageContent, MessageDescriptor,
    };

    fn media_message() -> MessageDescriptor {
        MessageDescriptor {
            channel: Channel::Whatsapp,
            recipient: "+5511999990000".into(),
            content: MessageContent::Media {
                media_ref: MediaRef {
                    url: "https://cdn.example.com/brochure.pdf".into(),
                    caption: Some("Course brochure".into()),
                    media_type: MediaType::Document,
                },
            },
            sender_id: "coach-2".into(),
            subject: None,
            lead_ref: Some("lead-9".into()),
            correlation_id: Some("req-77".into()),
        }
    }

    #[test]
    fn descriptor_survives_encode_and_decode() {
        let envelope = QueueEnvelope::new(EnvelopePayload::Message(media_message()));
        let decoded = decode(&encode(&envelope).unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn wire_format_uses_expected_field_names() {
        let job = BulkJob {
            channel: Channel::Email,
            sender_id: "admin".into(),
            content: MessageContent::Text {
                body: "Class moved to 6pm".into(),
            },
            subject: Some("Schedule change".into()),
            delay_ms: 250,
            recipients: vec![BulkRecipient {
                recipient: "a@example.com".into(),
                template_parameters: None,
                lead_ref: None,
            }],
            correlation_id: None,
        };
        let bytes = encode(&QueueEnvelope::new(EnvelopePayload::Bulk(job))).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["type"], "bulk");
        assert_eq!(json["messageType"], "text");
        assert_eq!(json["retries"], 0);
        assert_eq!(json["status"], "queued");
        assert_eq!(json["data"]["delayMs"], 250);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn mismatched_channel_is_rejected() {
        let envelope = QueueEnvelope::new(EnvelopePayload::Message(media_message()));
        let mut json: serde_json::Value = serde_json::from_slice(&encode(&envelope).unwrap()).unwrap();
        json["type"] = "email".into();
        let result = decode(&serde_json::to_vec(&json).unwrap());
        assert!(matches!(result, Err(CodecError::ChannelMismatch { .. })));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(decode(b"not json"), Err(CodecError::Malformed(_))));
        assert!(matches!(
            decode(br#"{"type":"whatsapp","messageType":"text","data":{},"timestamp":"2024-01-01T00:00:00Z","status":"queued"}"#),
            Err(CodecError::Malformed(_))
        ));
    }
}
