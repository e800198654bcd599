//! Error types decoded at the gateway boundary.
//!
//! Every failure coming back from the backend (or the bank-link widget) is
//! turned into a single [`GatewayError`] so that the domain layer never has to
//! inspect raw response bodies.

use serde_json::Value;
use shared::LinkError;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

const GENERIC_MESSAGE: &str = "An error occurred";
const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";
const GENERIC_LINK_ERROR: &str = "An unexpected error occurred.";
const SUPERSEDED_MESSAGE: &str = "Sign-in was cancelled by a newer request";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// Backend unreachable, timed out, answered with a 5xx, or sent a body we could not decode
    #[error("{message}")]
    Network { message: String },

    /// 4xx with a structured error body
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        code: Option<String>,
        details: Vec<String>,
        field: Option<String>,
    },

    /// 401 from the backend
    #[error("{message}")]
    Auth { message: String },

    /// Error code reported by the bank-link widget
    #[error("{}", link_error_message(.0))]
    ExternalWidget(LinkError),

    /// A sign-in answered after a newer sign-in or sign-out had started
    #[error("{message}")]
    Superseded { message: String },
}

impl GatewayError {
    pub fn network(message: impl Into<String>) -> Self {
        GatewayError::Network { message: message.into() }
    }

    pub fn validation(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Validation {
            status,
            message: message.into(),
            code: None,
            details: Vec::new(),
            field: None,
        }
    }

    pub fn superseded() -> Self {
        GatewayError::Superseded {
            message: SUPERSEDED_MESSAGE.to_string(),
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Network { .. })
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth { .. })
    }

    /// Decode a non-success HTTP response into the matching variant
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let extracted = parsed.as_ref().and_then(extract_message);

        match status {
            401 => GatewayError::Auth {
                message: extracted.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            },
            500..=599 => GatewayError::Network {
                message: extracted.unwrap_or_else(|| format!("Server error ({})", status)),
            },
            _ => {
                let details = parsed.as_ref().map(extract_details).unwrap_or_default();
                GatewayError::Validation {
                    status,
                    message: extracted.unwrap_or_else(|| GENERIC_MESSAGE.to_string()),
                    code: parsed.as_ref().and_then(|v| string_field(v, "code")),
                    details,
                    field: parsed.as_ref().and_then(|v| string_field(v, "field")),
                }
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GatewayError::network("The request timed out")
        } else if error.is_decode() {
            GatewayError::network(format!("Failed to parse response: {}", error))
        } else if error.is_connect() {
            GatewayError::network("Unable to reach the server")
        } else {
            let message = error.to_string();
            if message.is_empty() {
                GatewayError::network(GENERIC_MESSAGE)
            } else {
                GatewayError::network(message)
            }
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn extract_message(value: &Value) -> Option<String> {
    if let Some(message) = string_field(value, "error").or_else(|| string_field(value, "message")) {
        if !message.is_empty() {
            return Some(message);
        }
    }
    // Rails validation errors: {"errors": ["Name can't be blank", ...]}
    value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn extract_details(value: &Value) -> Vec<String> {
    let list = value.get("details").or_else(|| value.get("errors"));
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// User-facing message for an error reported by the bank-link widget
pub fn link_error_message(error: &LinkError) -> String {
    let known = match error.error_code.as_str() {
        "ITEM_LOGIN_REQUIRED" => Some("Please reconnect your bank account. Your login credentials may have changed."),
        "INVALID_CREDENTIALS" => Some("Invalid bank credentials. Please check your login information."),
        "INVALID_MFA" => Some("Invalid verification code. Please try again."),
        "ITEM_LOCKED" => Some("Your account is temporarily locked. Please contact your bank."),
        "ITEM_NOT_SUPPORTED" => Some("This bank is not currently supported."),
        "INSUFFICIENT_CREDENTIALS" => Some("Additional information required. Please complete the connection process."),
        "INVALID_SEND_METHOD" => Some("Invalid verification method selected."),
        "RATE_LIMIT_EXCEEDED" => Some("Too many requests. Please wait a moment and try again."),
        "INSTITUTION_DOWN" => Some("Your bank is temporarily unavailable. Please try again later."),
        "INSTITUTION_NOT_RESPONDING" => Some("Your bank is not responding. Please try again later."),
        _ => None,
    };

    match known {
        Some(message) => message.to_string(),
        None => error
            .display_message
            .as_deref()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(GENERIC_LINK_ERROR)
            .to_string(),
    }
}
