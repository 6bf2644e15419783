//! Typewriter-paced stream connection
//!
//! Chunks extracted from the transport are queued and revealed a few
//! characters per tick, independent of how bursty the network is. When the
//! producer finishes, whatever is still queued is flushed at once so the
//! final text is never short. An explicit [`close_connection`] drops it.
//!
//! [`close_connection`]: QueuedStreamConnection::close_connection

use super::events::{ConnectionStatus, EventReceiver};
use super::parser::{DefaultPayloadParser, Payload, PayloadParser};
use super::transport::{EventTransport, RawEventStream, StreamRequest};
use super::turn::{Shared, Turn};
use crate::config::{ChatConfig, TypewriterConfig};
use crate::error::ChatError;
use crate::types::ChatTarget;
use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// A chunk waiting for the typewriter
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub text: String,
    pub arrived_at: Instant,
}

/// Split `text` into pieces of at most `batch_chars` characters.
pub fn split_batches(text: &str, batch_chars: usize) -> VecDeque<String> {
    let batch_chars = batch_chars.max(1);
    let mut batches = VecDeque::new();
    let mut current = String::new();
    let mut count = 0;
    for c in text.chars() {
        current.push(c);
        count += 1;
        if count == batch_chars {
            batches.push_back(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        batches.push_back(current);
    }
    batches
}

/// FIFO queue metered out batch by batch
#[derive(Debug)]
pub struct Typewriter {
    pending: VecDeque<PendingChunk>,
    /// Remaining batches of the chunk being revealed
    current: VecDeque<String>,
    draining: bool,
    batch_chars: usize,
}

impl Typewriter {
    pub fn new(batch_chars: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            current: VecDeque::new(),
            draining: false,
            batch_chars: batch_chars.max(1),
        }
    }

    /// Queue a chunk. Returns `true` when this push started a drain loop.
    pub fn push(&mut self, text: String) -> bool {
        self.pending.push_back(PendingChunk {
            text,
            arrived_at: Instant::now(),
        });
        let started = !self.draining;
        self.draining = true;
        started
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Next batch for one tick. The loop stops once everything is revealed.
    pub fn next_batch(&mut self) -> Option<String> {
        if self.current.is_empty() {
            let chunk = self.pending.pop_front()?;
            tracing::trace!(
                queued_ms = chunk.arrived_at.elapsed().as_millis() as u64,
                chars = chunk.text.chars().count(),
                "Typewriter picked up chunk"
            );
            self.current = split_batches(&chunk.text, self.batch_chars);
        }
        let batch = self.current.pop_front();
        self.draining = !(self.current.is_empty() && self.pending.is_empty());
        batch
    }

    /// Everything not yet revealed, in order, bypassing the timer.
    pub fn flush(&mut self) -> Vec<String> {
        let mut out = Vec::with_capacity(1 + self.pending.len());
        if !self.current.is_empty() {
            out.push(self.current.drain(..).collect::<String>());
        }
        out.extend(self.pending.drain(..).map(|chunk| chunk.text));
        self.draining = false;
        out
    }

    /// Drop everything without revealing it.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current.clear();
        self.draining = false;
    }
}

/// Streams one chat turn at a time and reveals it through a [`Typewriter`].
///
/// Publishes `Status` events besides `Chunk` / `Complete` / `Error`.
pub struct QueuedStreamConnection {
    shared: Arc<Shared>,
    transport: Arc<dyn EventTransport>,
    parser: Arc<dyn PayloadParser>,
    config: ChatConfig,
}

impl QueuedStreamConnection {
    pub fn new(config: ChatConfig, transport: Arc<dyn EventTransport>) -> (Self, EventReceiver) {
        let (shared, events) = Shared::new(true);
        let connection = Self {
            shared,
            transport,
            parser: Arc::new(DefaultPayloadParser),
            config,
        };
        (connection, events)
    }

    pub fn with_parser(mut self, parser: Arc<dyn PayloadParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Start a new turn, aborting any turn still in flight and discarding
    /// its queue.
    pub async fn start_connection(
        &self,
        target: &ChatTarget,
        message: &str,
    ) -> Result<(), ChatError> {
        let turn = self.shared.begin_turn();
        let request = match StreamRequest::new(&self.config, target, message) {
            Ok(request) => request,
            Err(e) => {
                turn.status(ConnectionStatus::Error);
                turn.abandon();
                return Err(e);
            }
        };

        tracing::debug!(
            turn_id = %turn.id(),
            generation = turn.generation(),
            session_id = %target.session_id,
            tick_ms = self.config.typewriter.tick.as_millis() as u64,
            batch_chars = self.config.typewriter.batch_chars,
            "Starting queued stream turn"
        );

        if let Some(events) = turn.open(self.transport.as_ref(), request).await {
            tokio::spawn(consume(
                turn,
                events,
                self.parser.clone(),
                self.config.typewriter,
            ));
        }
        Ok(())
    }

    /// Stop the live turn and drop any text still queued. Idempotent.
    pub fn close_connection(&self) {
        if self.shared.close() {
            tracing::debug!("Queued stream turn closed by caller");
        }
    }

    /// Text revealed so far in the current turn.
    pub fn current_content(&self) -> String {
        self.shared.current_content()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_open()
    }
}

impl Drop for QueuedStreamConnection {
    fn drop(&mut self) {
        self.shared.close();
    }
}

async fn consume(
    turn: Turn,
    mut events: RawEventStream,
    parser: Arc<dyn PayloadParser>,
    pacing: TypewriterConfig,
) {
    let mut typewriter = Typewriter::new(pacing.batch_chars);
    // `interval` panics on a zero period.
    let mut ticker = tokio::time::interval(pacing.tick.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = turn.cancel.cancelled() => {
                typewriter.clear();
                return;
            }
            next = events.next() => match next {
                Some(Ok(data)) => match parser.parse(&data) {
                    Payload::Chunk(text) => {
                        if !turn.is_current() {
                            return;
                        }
                        if typewriter.push(text) {
                            ticker.reset();
                        }
                    }
                    Payload::Done => {
                        finish(&turn, &mut typewriter);
                        return;
                    }
                    Payload::Skip => {}
                },
                Some(Err(error)) => {
                    typewriter.clear();
                    turn.fail(error);
                    return;
                }
                None => {
                    finish(&turn, &mut typewriter);
                    return;
                }
            },
            _ = ticker.tick(), if typewriter.is_draining() => {
                if let Some(batch) = typewriter.next_batch()
                    && !turn.deliver(&batch)
                {
                    return;
                }
            }
        }
    }
}

/// Natural termination: reveal the rest immediately, then complete.
fn finish(turn: &Turn, typewriter: &mut Typewriter) {
    for piece in typewriter.flush() {
        if !turn.deliver(&piece) {
            return;
        }
    }
    turn.complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn batches_count_characters_not_bytes() {
        assert_eq!(split_batches("你好ab", 1), ["你", "好", "a", "b"]);
        assert_eq!(split_batches("abcdefg", 3), ["abc", "def", "g"]);
        assert!(split_batches("", 2).is_empty());
    }

    #[tokio::test]
    async fn drains_fifo_and_stops_when_empty() {
        let mut tw = Typewriter::new(2);
        assert!(tw.push("abc".to_string()));
        assert!(!tw.push("de".to_string()));

        let mut seen = Vec::new();
        while tw.is_draining() {
            seen.push(tw.next_batch().unwrap());
        }
        assert_eq!(seen, ["ab", "c", "de"]);
        assert_eq!(tw.next_batch(), None);

        // A later push restarts the loop.
        assert!(tw.push("f".to_string()));
    }

    #[tokio::test]
    async fn flush_keeps_order_and_partial_chunk() {
        let mut tw = Typewriter::new(1);
        tw.push("hello".to_string());
        tw.push("world".to_string());
        assert_eq!(tw.next_batch().as_deref(), Some("h"));

        assert_eq!(tw.flush(), ["ello", "world"]);
        assert!(!tw.is_draining());
        assert!(tw.flush().is_empty());
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let mut tw = Typewriter::new(1);
        tw.push("abc".to_string());
        tw.next_batch();
        tw.clear();
        assert!(!tw.is_draining());
        assert!(tw.flush().is_empty());
    }

    proptest! {
        #[test]
        fn batches_reassemble_to_input(text in "\\PC{0,64}", n in 1usize..8) {
            let batches = split_batches(&text, n);
            prop_assert_eq!(batches.iter().map(String::as_str).collect::<String>(), text);
            for b in &batches {
                prop_assert!(b.chars().count() <= n && !b.is_empty());
            }
        }
    }
}
