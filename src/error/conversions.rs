//! Conversions from third-party error types

use super::types::ChatError;

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ChatError::TimeoutError(format!("Request timed out: {e}"));
        }
        if e.is_connect() {
            return ChatError::ConnectionError(format!("Connection error: {e}"));
        }
        if let Some(status) = e.status() {
            return ChatError::api_error(status.as_u16(), e.to_string());
        }
        if e.is_decode() {
            return ChatError::ParseError(format!("Failed to decode response: {e}"));
        }
        ChatError::HttpError(e.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::JsonError(e.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for ChatError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        ChatError::ConfigurationError(format!("Invalid header value: {e}"))
    }
}
