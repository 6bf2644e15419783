//! Streaming Module
//!
//! Everything between an HTTP event stream and a consumer:
//! - SSE framing over reqwest byte streams
//! - Payload extraction (sentinel, OpenAI delta, flat message, wrapped records)
//! - Immediate and typewriter-paced connections with generation fencing
//! - The event channel consumers read from

mod cancel;
mod connection;
mod events;
pub mod parser;
mod queued;
pub mod sse;
mod transport;
mod turn;
pub mod wrapper;

pub use cancel::CancelHandle;
pub use connection::StreamConnection;
pub use events::{ConnectionStatus, EventReceiver, StreamEvent, StreamObserver};
pub use parser::{DONE_SENTINEL, DefaultPayloadParser, Payload, PayloadParser, parse_payload};
pub use queued::{PendingChunk, QueuedStreamConnection, Typewriter, split_batches};
pub use sse::{SseStream, SseStreamExt};
pub use transport::{EventTransport, HttpTransport, RawEventStream, StreamRequest};
pub use wrapper::{FieldValue, WorkflowEventMessage, WrapperError, WrapperRecord};
