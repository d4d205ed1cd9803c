use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    application::services::channel::{ChannelAdapter, ChannelError, SendReceipt},
    domain::models::{Channel, MessageContent, MessageDescriptor},
};

const DEFAULT_SUBJECT: &str = "New message";

#[derive(Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

/// Transactional e-mail over an HTTP relay.
pub struct EmailApiClient {
    http: Client,
    config: EmailConfig,
}

impl EmailApiClient {
    pub fn new(config: EmailConfig) -> anyhow::Result<Arc<dyn ChannelAdapter>> {
        let http = Client::builder()
            .user_agent("outbound-messaging/email")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Arc::new(Self { http, config }) as Arc<dyn ChannelAdapter>)
    }

    fn build_request<'a>(&'a self, message: &'a MessageDescriptor) -> RelayRequest<'a> {
        let mut request = RelayRequest {
            from: &self.config.from,
            to: message.recipient.trim(),
            subject: message.subject.as_deref().unwrap_or(DEFAULT_SUBJECT),
            text: None,
            template: None,
            attachments: Vec::new(),
        };
        match &message.content {
            MessageContent::Text { body } => request.text = Some(body.as_str()),
            MessageContent::Template {
                template_ref,
                template_parameters,
                body,
            } => {
                request.text = body.as_deref();
                request.template = Some(RelayTemplate {
                    id: &template_ref.name,
                    language: &template_ref.language,
                    variables: template_parameters,
                });
            }
            MessageContent::Media { media_ref } => {
                request.text = media_ref.caption.as_deref();
                request.attachments.push(RelayAttachment {
                    url: &media_ref.url,
                    kind: media_ref.media_type.as_str(),
                });
            }
        }
        request
    }
}

#[async_trait]
impl ChannelAdapter for EmailApiClient {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, message: &MessageDescriptor) -> Result<SendReceipt, ChannelError> {
        if message.channel != Channel::Email {
            return Err(ChannelError::InvalidMessage(format!(
                "{} message routed to email",
                message.channel.as_str()
            )));
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(message))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<RelayError>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| body.chars().take(512).collect());
            return Err(ChannelError::Provider {
                status: Some(status.as_u16()),
                code: None,
                subcode: None,
                error_type: None,
                message,
            });
        }

        Ok(accepted_receipt(&body))
    }
}

/// The relay answered 2xx, so the mail is out even without a readable id.
fn accepted_receipt(body: &str) -> SendReceipt {
    match serde_json::from_str::<RelayAccepted>(body) {
        Ok(accepted) => SendReceipt {
            provider_message_id: Some(accepted.id),
        },
        Err(err) => {
            warn!(error = %err, "relay accepted message without a readable id");
            SendReceipt {
                provider_message_id: None,
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<RelayTemplate<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<RelayAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct RelayTemplate<'a> {
    id: &'a str,
    language: &'a str,
    variables: &'a [String],
}

#[derive(Debug, Serialize)]
struct RelayAttachment<'a> {
    url: &'a str,
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayAccepted {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RelayError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TemplateRef;

    fn client() -> EmailApiClient {
        EmailApiClient {
            http: Client::new(),
            config: EmailConfig {
                api_url: "http://localhost/send".into(),
                api_key: "key".into(),
                from: "coach@academy.test".into(),
            },
        }
    }

    #[test]
    fn template_request_includes_variables_and_default_subject() {
        let message = MessageDescriptor {
            channel: Channel::Email,
            recipient: " lead@example.com ".into(),
            content: MessageContent::Template {
                template_ref: TemplateRef {
                    name: "welcome".into(),
                    language: "en".into(),
                },
                template_parameters: vec!["Ana".into()],
                body: None,
            },
            sender_id: "coach-1".into(),
            subject: None,
            lead_ref: None,
            correlation_id: None,
        };
        let client = client();
        let json = serde_json::to_value(client.build_request(&message)).unwrap();

        assert_eq!(json["to"], "lead@example.com");
        assert_eq!(json["subject"], DEFAULT_SUBJECT);
        assert_eq!(json["template"]["variables"][0], "Ana");
        assert!(json.get("text").is_none());
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn accepted_reply_without_readable_id_still_counts_as_sent() {
        assert_eq!(
            accepted_receipt(r#"{"id":"msg-81"}"#).provider_message_id.as_deref(),
            Some("msg-81")
        );
        assert_eq!(accepted_receipt("").provider_message_id, None);
    }
}
