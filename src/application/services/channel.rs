use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::{Channel, MessageDescriptor};

/// Error reported by a channel provider or the transport in front of it.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("provider rejected message (status {status:?}, code {code:?}, subcode {subcode:?}): {message}")]
    Provider {
        status: Option<u16>,
        code: Option<i64>,
        subcode: Option<i64>,
        error_type: Option<String>,
        message: String,
    },
    #[error("provider request timed out: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChannelError::Timeout(err.to_string())
        } else {
            ChannelError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// `None` when the provider accepted the message but its reply was unreadable.
    pub provider_message_id: Option<String>,
}

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;
    async fn send(&self, message: &MessageDescriptor) -> Result<SendReceipt, ChannelError>;
}

#[derive(Clone, Default)]
pub struct ChannelGateway {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelGateway {
    pub fn new(adapters: Vec<Arc<dyn ChannelAdapter>>) -> Self {
        let mut map = HashMap::new();
        for adapter in adapters {
            map.insert(adapter.channel(), adapter);
        }
        Self { adapters: map }
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    /// Sends through the adapter registered for the message's channel.
    pub async fn send(&self, message: &MessageDescriptor) -> Result<SendReceipt, ChannelError> {
        let adapter = self.get(message.channel).ok_or_else(|| {
            ChannelError::InvalidMessage(format!(
                "no adapter registered for channel {}",
                message.channel.as_str()
            ))
        })?;
        adapter.send(message).await
    }
}
