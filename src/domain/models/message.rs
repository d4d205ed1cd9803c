use serde::{Deserialize, Serialize};

use super::channel::Channel;
use crate::domain::errors::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRef {
    pub name: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Image,
    Document,
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Document => "document",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_type: MediaType,
}

/// Content of a message. The `kind` discriminant selects exactly one content mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MessageContent {
    Text {
        body: String,
    },
    Template {
        template_ref: TemplateRef,
        #[serde(default)]
        template_parameters: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Media {
        media_ref: MediaRef,
    },
}

impl MessageContent {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageContent::Text { .. } => "text",
            MessageContent::Template { .. } => "template",
            MessageContent::Media { .. } => "media",
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            MessageContent::Text { body } => {
                if body.trim().is_empty() {
                    return Err(DomainError::Validation("text body is empty".into()));
                }
            }
            MessageContent::Template { template_ref, .. } => {
                if template_ref.name.trim().is_empty() {
                    return Err(DomainError::Validation("template name is empty".into()));
                }
                if template_ref.language.trim().is_empty() {
                    return Err(DomainError::Validation("template language is empty".into()));
                }
            }
            MessageContent::Media { media_ref } => {
                if !(media_ref.url.starts_with("https://") || media_ref.url.starts_with("http://")) {
                    return Err(DomainError::Validation(format!(
                        "media url '{}' is not an http(s) url",
                        media_ref.url
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A single message a sender wants delivered to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDescriptor {
    pub channel: Channel,
    pub recipient: String,
    #[serde(flatten)]
    pub content: MessageContent,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl MessageDescriptor {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sender_id.trim().is_empty() {
            return Err(DomainError::Validation("sender id is empty".into()));
        }
        validate_recipient(self.channel, &self.recipient)?;
        self.content.validate()
    }
}

pub fn validate_recipient(channel: Channel, recipient: &str) -> Result<(), DomainError> {
    let valid = match channel {
        Channel::Whatsapp => is_phone_number(recipient),
        Channel::Email => is_email_address(recipient),
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::Validation(format!(
            "'{recipient}' is not a valid {} recipient",
            channel.as_str()
        )))
    }
}

fn is_phone_number(value: &str) -> bool {
    let value = value.trim();
    let digits = value.strip_prefix('+').unwrap_or(value);
    let mut count = 0;
    for c in digits.chars() {
        match c {
            '0'..='9' => count += 1,
            ' ' | '-' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&count)
}

fn is_email_address(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(channel: Channel, recipient: &str) -> MessageDescriptor {
        MessageDescriptor {
            channel,
            recipient: recipient.into(),
            content: MessageContent::Text {
                body: "hello".into(),
            },
            sender_id: "coach-1".into(),
            subject: None,
            lead_ref: None,
            correlation_id: None,
        }
    }

    #[test]
    fn accepts_phone_numbers_with_separators() {
        assert!(text(Channel::Whatsapp, "+49 151-2345 6789").validate().is_ok());
        assert!(text(Channel::Whatsapp, "12345").validate().is_err());
        assert!(text(Channel::Whatsapp, "+49abc1234567").validate().is_err());
    }

    #[test]
    fn accepts_plain_email_addresses() {
        assert!(text(Channel::Email, "lead@example.com").validate().is_ok());
        assert!(text(Channel::Email, "lead@localhost").validate().is_err());
        assert!(text(Channel::Email, "@example.com").validate().is_err());
    }

    #[test]
    fn rejects_empty_content() {
        let mut message = text(Channel::Email, "lead@example.com");
        message.content = MessageContent::Text { body: "  ".into() };
        assert!(matches!(message.validate(), Err(DomainError::Validation(_))));

        message.content = MessageContent::Media {
            media_ref: MediaRef {
                url: "ftp://files/x.png".into(),
                caption: None,
                media_type: MediaType::Image,
            },
        };
        assert!(message.validate().is_err());
    }

    #[test]
    fn content_serializes_with_kind_discriminant() {
        let message = MessageDescriptor {
            content: MessageContent::Template {
                template_ref: TemplateRef {
                    name: "welcome".into(),
                    language: "en_US".into(),
                },
                template_parameters: vec!["Ana".into()],
                body: None,
            },
            ..text(Channel::Whatsapp, "+4915123456789")
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["kind"], "template");
        assert_eq!(json["templateRef"]["name"], "welcome");
        assert_eq!(json["templateParameters"][0], "Ana");
        assert_eq!(json["senderId"], "coach-1");
    }
}
