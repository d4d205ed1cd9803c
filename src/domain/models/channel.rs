use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Email => "email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "whatsapp" => Some(Channel::Whatsapp),
            "email" => Some(Channel::Email),
            _ => None,
        }
    }
}

/// Discriminant of a queue envelope. Each variant owns exactly one durable queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    Whatsapp,
    Email,
    Bulk,
    Scheduled,
}

impl EnvelopeType {
    pub const ALL: [EnvelopeType; 4] = [
        EnvelopeType::Whatsapp,
        EnvelopeType::Email,
        EnvelopeType::Bulk,
        EnvelopeType::Scheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeType::Whatsapp => "whatsapp",
            EnvelopeType::Email => "email",
            EnvelopeType::Bulk => "bulk",
            EnvelopeType::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "whatsapp" => Some(EnvelopeType::Whatsapp),
            "email" => Some(EnvelopeType::Email),
            "bulk" => Some(EnvelopeType::Bulk),
            "scheduled" => Some(EnvelopeType::Scheduled),
            _ => None,
        }
    }

    pub fn queue_name(&self) -> &'static str {
        match self {
            EnvelopeType::Whatsapp => "whatsapp_messages",
            EnvelopeType::Email => "email_messages",
            EnvelopeType::Bulk => "bulk_messages",
            EnvelopeType::Scheduled => "scheduled_messages",
        }
    }
}

impl From<Channel> for EnvelopeType {
    fn from(value: Channel) -> Self {
        match value {
            Channel::Whatsapp => EnvelopeType::Whatsapp,
            Channel::Email => EnvelopeType::Email,
        }
    }
}
