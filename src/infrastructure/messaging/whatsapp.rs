use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    application::services::channel::{ChannelAdapter, ChannelError, SendReceipt},
    domain::models::{Channel, MessageContent, MessageDescriptor},
};

#[derive(Clone)]
pub struct WhatsAppConfig {
    pub base_url: String,
    pub phone_number_id: String,
    pub access_token: String,
}

/// WhatsApp Business messages through the Cloud (Graph) API.
pub struct WhatsAppCloudClient {
    http: Client,
    config: WhatsAppConfig,
}

impl WhatsAppCloudClient {
    pub fn new(config: WhatsAppConfig) -> anyhow::Result<Arc<dyn ChannelAdapter>> {
        let http = Client::builder()
            .user_agent("outbound-messaging/whatsapp")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Arc::new(Self { http, config }) as Arc<dyn ChannelAdapter>)
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.base_url.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }

    fn build_payload(message: &MessageDescriptor) -> Value {
        let to = normalize_phone(&message.recipient);
        match &message.content {
            MessageContent::Text { body } => json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "text",
                "text": { "preview_url": false, "body": body },
            }),
            MessageContent::Template {
                template_ref,
                template_parameters,
                ..
            } => {
                let mut template = json!({
                    "name": template_ref.name,
                    "language": { "code": template_ref.language },
                });
                if !template_parameters.is_empty() {
                    let parameters: Vec<Value> = template_parameters
                        .iter()
                        .map(|text| json!({ "type": "text", "text": text }))
                        .collect();
                    template["components"] = json!([{ "type": "body", "parameters": parameters }]);
                }
                json!({
                    "messaging_product": "whatsapp",
                    "recipient_type": "individual",
                    "to": to,
                    "type": "template",
                    "template": template,
                })
            }
            MessageContent::Media { media_ref } => {
                let kind = media_ref.media_type.as_str();
                let mut media = json!({ "link": media_ref.url });
                // WhatsApp rejects captions on audio.
                if let Some(caption) = &media_ref.caption {
                    if kind != "audio" {
                        media["caption"] = json!(caption);
                    }
                }
                let mut payload = json!({
                    "messaging_product": "whatsapp",
                    "recipient_type": "individual",
                    "to": to,
                    "type": kind,
                });
                payload[kind] = media;
                payload
            }
        }
    }
}

fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl ChannelAdapter for WhatsAppCloudClient {
    fn channel(&self) -> Channel {
        Channel::Whatsapp
    }

    async fn send(&self, message: &MessageDescriptor) -> Result<SendReceipt, ChannelError> {
        if message.channel != Channel::Whatsapp {
            return Err(ChannelError::InvalidMessage(format!(
                "{} message routed to whatsapp",
                message.channel.as_str()
            )));
        }

        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&Self::build_payload(message))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(parse_graph_error(status.as_u16(), &body));
        }

        Ok(accepted_receipt(&body))
    }
}

/// A 2xx reply means the message was accepted, even if the body is unreadable.
/// Retrying would send it twice.
fn accepted_receipt(body: &str) -> SendReceipt {
    let provider_message_id = serde_json::from_str::<GraphSendResponse>(body)
        .ok()
        .and_then(|payload| payload.messages.into_iter().next())
        .map(|m| m.id);
    if provider_message_id.is_none() {
        let body: String = body.chars().take(256).collect();
        warn!(%body, "whatsapp accepted message without a readable id");
    }
    SendReceipt { provider_message_id }
}

fn parse_graph_error(status: u16, body: &str) -> ChannelError {
    match serde_json::from_str::<GraphErrorResponse>(body) {
        Ok(GraphErrorResponse { error }) => ChannelError::Provider {
            status: Some(status),
            code: error.code,
            subcode: error.error_subcode,
            error_type: error.error_type,
            message: error
                .error_data
                .and_then(|data| data.details)
                .map(|details| format!("{}: {details}", error.message))
                .unwrap_or(error.message),
        },
        Err(_) => ChannelError::Provider {
            status: Some(status),
            code: None,
            subcode: None,
            error_type: None,
            message: body.chars().take(512).collect(),
        },
    }
}

#[derive(Debug, Deserialize)]
struct GraphSendResponse {
    #[serde(default)]
    messages: Vec<GraphMessageId>,
}

#[derive(Debug, Deserialize)]
struct GraphMessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorResponse {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<i64>,
    error_subcode: Option<i64>,
    error_data: Option<GraphErrorData>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorData {
    details: Option<String>,
}
