//! Error Handling Module
//!
//! - Core error type (`ChatError`) and its coarse `ErrorCategory`
//! - Conversions from reqwest / serde_json errors
//!
//! # Example
//!
//! ```rust,ignore
//! use chatstream::error::{ChatError, ErrorCategory};
//!
//! let error = ChatError::api_error(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert!(!error.is_retryable());
//! ```

mod conversions;
pub mod types;

pub use types::*;
