//! Immediate-delivery stream connection

use super::events::EventReceiver;
use super::parser::{DefaultPayloadParser, Payload, PayloadParser};
use super::transport::{EventTransport, RawEventStream, StreamRequest};
use super::turn::{Shared, Turn};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::types::ChatTarget;
use futures_util::StreamExt;
use std::sync::Arc;

/// Streams one chat turn at a time and forwards each chunk as soon as it is
/// extracted.
///
/// Events are read from the [`EventReceiver`] returned by [`StreamConnection::new`]:
/// every non-blank chunk arrives as `Chunk`, followed by exactly one
/// `Complete` (with the full text) or `Error`.
pub struct StreamConnection {
    shared: Arc<Shared>,
    transport: Arc<dyn EventTransport>,
    parser: Arc<dyn PayloadParser>,
    config: ChatConfig,
}

impl StreamConnection {
    pub fn new(config: ChatConfig, transport: Arc<dyn EventTransport>) -> (Self, EventReceiver) {
        let (shared, events) = Shared::new(false);
        let connection = Self {
            shared,
            transport,
            parser: Arc::new(DefaultPayloadParser),
            config,
        };
        (connection, events)
    }

    /// Use a custom payload format.
    pub fn with_parser(mut self, parser: Arc<dyn PayloadParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Start a new turn, aborting any turn still in flight.
    ///
    /// Resolves once the transport is open (or failed to open, which is
    /// reported as an `Error` event). Only request-building problems are
    /// returned as `Err`.
    pub async fn start_connection(
        &self,
        target: &ChatTarget,
        message: &str,
    ) -> Result<(), ChatError> {
        let turn = self.shared.begin_turn();
        let request = match StreamRequest::new(&self.config, target, message) {
            Ok(request) => request,
            Err(e) => {
                turn.abandon();
                return Err(e);
            }
        };

        tracing::debug!(
            turn_id = %turn.id(),
            generation = turn.generation(),
            session_id = %target.session_id,
            "Starting stream turn"
        );

        if let Some(events) = turn.open(self.transport.as_ref(), request).await {
            tokio::spawn(consume(turn, events, self.parser.clone()));
        }
        Ok(())
    }

    /// Abort the live turn, if any. Idempotent.
    pub fn close_connection(&self) {
        if self.shared.close() {
            tracing::debug!("Stream turn closed by caller");
        }
    }

    /// Text assembled so far in the current turn.
    pub fn current_content(&self) -> String {
        self.shared.current_content()
    }

    /// Whether a turn is open (started and not yet completed, failed or closed).
    pub fn is_active(&self) -> bool {
        self.shared.is_open()
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.shared.close();
    }
}

async fn consume(turn: Turn, mut events: RawEventStream, parser: Arc<dyn PayloadParser>) {
    loop {
        let next = tokio::select! {
            biased;
            _ = turn.cancel.cancelled() => return,
            next = events.next() => next,
        };

        match next {
            Some(Ok(data)) => match parser.parse(&data) {
                Payload::Chunk(text) => {
                    if !turn.deliver(&text) {
                        return;
                    }
                }
                Payload::Done => {
                    turn.complete();
                    return;
                }
                Payload::Skip => {}
            },
            Some(Err(error)) => {
                turn.fail(error);
                return;
            }
            None => {
                turn.complete();
                return;
            }
        }
    }
}
