//! # chatstream
//!
//! Client side of a streamed chat turn: open an event-stream request against
//! a workflow chat backend, pull text deltas out of each SSE payload, and
//! hand them to a UI either as they arrive or paced as a typewriter.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatstream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChatConfig::builder()
//!         .base_url("https://chat.example.com/api")
//!         .api_token("your-token")
//!         .build()?;
//!     let client = ChatClient::new(config)?;
//!
//!     let session = client.create_session(Some("support-bot")).await?;
//!     let (connection, mut events) = client.queued_stream_connection();
//!     connection.start_connection(&session.target(), "Hello!").await?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             StreamEvent::Chunk(delta) => print!("{delta}"),
//!             StreamEvent::Complete(_) => break,
//!             StreamEvent::Error(e) => {
//!                 eprintln!("{}", e.user_message());
//!                 break;
//!             }
//!             StreamEvent::Status(_) => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod streaming;
pub mod telemetry;
pub mod types;

pub use client::ChatClient;
pub use config::{ChatConfig, ChatConfigBuilder, TypewriterConfig};
pub use error::{ChatError, ErrorCategory, Result};

/// Common imports
pub mod prelude {
    pub use crate::client::ChatClient;
    pub use crate::config::{ChatConfig, TypewriterConfig};
    pub use crate::error::ChatError;
    pub use crate::streaming::{
        ConnectionStatus, EventReceiver, QueuedStreamConnection, StreamConnection, StreamEvent,
        StreamObserver,
    };
    pub use crate::types::{ChatTarget, HistoryMessage, SessionInfo};
}
