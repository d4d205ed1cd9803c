use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

use crate::infrastructure::messaging::{
    email::EmailConfig, jetstream::JetstreamConfig, whatsapp::WhatsAppConfig,
};

const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v19.0";
const DEFAULT_ACK_WAIT_SECONDS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} env param")]
    Missing(&'static str),
    #[error("Invalid {0} env param: {1}")]
    Invalid(&'static str, String),
}

pub struct Config {
    pub port: u16,
    pub scheme: String,
    pub host: String,
    pub database_url: String,
    pub jetstream: JetstreamConfig,
    pub whatsapp: Option<WhatsAppConfig>,
    pub email: Option<EmailConfig>,
}

impl Config {
    pub fn try_parse() -> Result<Config, ConfigError> {
        let _ = dotenv();

        let mut jetstream = JetstreamConfig::new(required("NATS_URL")?);
        jetstream.ack_wait =
            Duration::from_secs(parsed("ACK_WAIT_SECONDS", DEFAULT_ACK_WAIT_SECONDS)?);

        let whatsapp = match (
            optional("WHATSAPP_PHONE_NUMBER_ID"),
            optional("WHATSAPP_ACCESS_TOKEN"),
        ) {
            (Some(phone_number_id), Some(access_token)) => Some(WhatsAppConfig {
                base_url: optional("WHATSAPP_API_BASE")
                    .unwrap_or_else(|| DEFAULT_WHATSAPP_API_BASE.to_string()),
                phone_number_id,
                access_token,
            }),
            _ => None,
        };

        let email = match (
            optional("EMAIL_API_URL"),
            optional("EMAIL_API_KEY"),
            optional("EMAIL_FROM"),
        ) {
            (Some(api_url), Some(api_key), Some(from)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            port: parsed("PORT", 8080)?,
            scheme: optional("SCHEME").unwrap_or_else(|| "http".to_string()),
            host: optional("HOST").unwrap_or_else(|| "localhost".to_string()),
            database_url: required("DATABASE_URL")?,
            jetstream,
            whatsapp,
            email,
        })
    }
}

fn optional(name: &'static str) -> Option<String> {
    var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| ConfigError::Invalid(name, err.to_string())),
        None => Ok(default),
    }
}
