//! Core error types

use thiserror::Error;

/// Coarse classification used for presentation and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport failed before or while receiving the stream
    Network,
    /// Server answered with a 4xx status
    Client,
    /// Server answered with a 5xx status
    Server,
    /// A payload or response body could not be understood
    Parsing,
    /// Caller-side configuration or input problem
    Configuration,
}

/// Errors produced by chatstream
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Generic HTTP failure while sending a request or reading a response
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Request timed out
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Server answered with a non-2xx status
    #[error("API error {code}: {message}")]
    ApiError { code: u16, message: String },

    /// The event stream failed mid-flight
    #[error("Stream error: {0}")]
    StreamError(String),

    /// A payload could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON (de)serialization failed outside the event stream
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ChatError {
    /// Build an `ApiError` from a status code and body text.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
        }
    }

    /// HTTP status code, when the error came from a server response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_)
            | Self::ConnectionError(_)
            | Self::TimeoutError(_)
            | Self::StreamError(_) => ErrorCategory::Network,
            Self::ApiError { code, .. } if *code >= 500 => ErrorCategory::Server,
            Self::ApiError { .. } => ErrorCategory::Client,
            Self::ParseError(_) | Self::JsonError(_) => ErrorCategory::Parsing,
            Self::ConfigurationError(_) | Self::InvalidInput(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether re-invoking `start_connection` is likely to help.
    ///
    /// Connections never retry on their own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::TimeoutError(_) | Self::StreamError(_) => true,
            Self::HttpError(_) => true,
            Self::ApiError { code, .. } => *code == 408 || *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Short message suitable for showing in place of a failed reply.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Server => {
                "Sorry, the reply was interrupted. Please try again."
            }
            ErrorCategory::Client if self.status_code() == Some(401) => {
                "Your session has expired. Please sign in again and retry."
            }
            ErrorCategory::Client => "The request was rejected. Please check it and try again.",
            ErrorCategory::Parsing => "The reply could not be read. Please try again.",
            ErrorCategory::Configuration => {
                "The chat client is misconfigured. Please contact support."
            }
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ChatError>;
