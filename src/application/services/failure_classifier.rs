//! Splits channel errors into permanent failures, which are dropped on first
//! sight, and transient failures, which go through the retry policy.

use crate::{application::services::channel::ChannelError, domain::models::ErrorClass};

/// Graph API: invalid or expired OAuth access token.
const CODE_INVALID_TOKEN: i64 = 190;
const CODE_API_SESSION: i64 = 102;
const CODE_PERMISSION_DENIED: i64 = 10;
const PERMISSION_CODES: std::ops::RangeInclusive<i64> = 200..=299;

const OAUTH_PERMANENT_SUBCODES: [i64; 7] = [458, 459, 460, 463, 464, 467, 492];

const TEMPLATE_CODES: [i64; 7] = [132000, 132001, 132005, 132007, 132012, 132015, 132016];
const MALFORMED_PARAMETER_CODES: [i64; 2] = [131008, 131009];

const CREDENTIAL_PHRASES: [&str; 4] = [
    "access token",
    "session has expired",
    "invalid oauth",
    "error validating access token",
];
const TEMPLATE_PROBLEMS: [&str; 6] = [
    "does not exist",
    "not found",
    "not approved",
    "rejected",
    "paused",
    "disabled",
];

pub fn classify(error: &ChannelError) -> ErrorClass {
    match error {
        ChannelError::InvalidMessage(_) => ErrorClass::Permanent,
        ChannelError::Timeout(_) | ChannelError::Transport(_) => ErrorClass::Transient,
        ChannelError::Provider {
            status,
            code,
            subcode,
            error_type,
            message,
        } => {
            if matches!(status, Some(401 | 403))
                || code.is_some_and(is_permanent_code)
                || is_oauth_credential_problem(error_type.as_deref(), *subcode)
                || is_permanent_message(message)
            {
                ErrorClass::Permanent
            } else {
                ErrorClass::Transient
            }
        }
    }
}

fn is_permanent_code(code: i64) -> bool {
    code == CODE_INVALID_TOKEN
        || code == CODE_API_SESSION
        || code == CODE_PERMISSION_DENIED
        || PERMISSION_CODES.contains(&code)
        || TEMPLATE_CODES.contains(&code)
        || MALFORMED_PARAMETER_CODES.contains(&code)
}

fn is_oauth_credential_problem(error_type: Option<&str>, subcode: Option<i64>) -> bool {
    error_type == Some("OAuthException")
        && subcode.is_some_and(|subcode| OAUTH_PERMANENT_SUBCODES.contains(&subcode))
}

fn is_permanent_message(message: &str) -> bool {
    let message = message.to_lowercase();
    if CREDENTIAL_PHRASES.iter().any(|phrase| message.contains(phrase)) {
        return true;
    }
    message.contains("template") && TEMPLATE_PROBLEMS.iter().any(|p| message.contains(p))
}
