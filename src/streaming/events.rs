//! Turn events and their delivery channel
//!
//! Connections publish [`StreamEvent`]s into an unbounded channel. Each event
//! travels in an envelope tagged with the generation of the turn that
//! produced it. When a turn is cancelled while still open, its generation is
//! recorded in the connection's fence and [`EventReceiver`] drops its
//! envelopes, including ones already queued. Turns that ended on their own
//! are never fenced, so their events stay readable.

use crate::error::ChatError;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Transport status, reported by the queued connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Event produced by a turn
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text
    Chunk(String),
    /// The turn finished; carries the full assembled text
    Complete(String),
    /// The turn failed; the connection is already closed
    Error(ChatError),
    Status(ConnectionStatus),
}

impl StreamEvent {
    /// `Complete` and `Error` end a turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete(_) | StreamEvent::Error(_))
    }
}

#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) generation: u64,
    pub(crate) event: StreamEvent,
}

/// Generations of turns cancelled while open
///
/// A turn emits nothing once it is cancelled and generations only grow, so
/// after the receiver has seen generation `g` no envelope older than `g` can
/// still arrive; entries below it are pruned.
#[derive(Debug, Default)]
pub(crate) struct Fence {
    cancelled: Mutex<BTreeSet<u64>>,
}

impl Fence {
    pub(crate) fn cancel(&self, generation: u64) {
        self.cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(generation);
    }

    fn admits(&self, generation: u64) -> bool {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        *cancelled = cancelled.split_off(&generation);
        !cancelled.contains(&generation)
    }
}

pub(crate) fn channel(fence: Arc<Fence>) -> (mpsc::UnboundedSender<Envelope>, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, EventReceiver { rx, fence })
}

/// Consumer end of a connection's events
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
    fence: Arc<Fence>,
}

impl EventReceiver {
    /// Wait for the next live event.
    ///
    /// Returns `None` once the connection has been dropped and every pending
    /// event was consumed.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        while let Some(envelope) = self.rx.recv().await {
            if let Some(event) = self.admit(envelope) {
                return Some(event);
            }
        }
        None
    }

    /// Next live event if one is already queued.
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        while let Ok(envelope) = self.rx.try_recv() {
            if let Some(event) = self.admit(envelope) {
                return Some(event);
            }
        }
        None
    }

    /// Receive events up to and including the next `Complete` or `Error`.
    pub async fn collect_turn(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    /// Drive `observer` with every live event until the connection is dropped.
    pub async fn dispatch<O: StreamObserver>(mut self, observer: &mut O) {
        while let Some(event) = self.recv().await {
            observer.handle(event);
        }
    }

    fn admit(&self, envelope: Envelope) -> Option<StreamEvent> {
        if self.fence.admits(envelope.generation) {
            Some(envelope.event)
        } else {
            tracing::trace!(
                generation = envelope.generation,
                "Dropping event from cancelled turn"
            );
            None
        }
    }
}

/// Callback-style consumer, driven by [`EventReceiver::dispatch`]
pub trait StreamObserver: Send {
    fn on_message(&mut self, _delta: &str) {}
    fn on_complete(&mut self, _full_text: &str) {}
    fn on_error(&mut self, _error: &ChatError) {}
    fn on_status_change(&mut self, _status: ConnectionStatus) {}

    fn handle(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Chunk(delta) => self.on_message(&delta),
            StreamEvent::Complete(text) => self.on_complete(&text),
            StreamEvent::Error(error) => self.on_error(&error),
            StreamEvent::Status(status) => self.on_status_change(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        text: String,
        completed: Option<String>,
        statuses: Vec<ConnectionStatus>,
    }

    impl StreamObserver for Recorder {
        fn on_message(&mut self, delta: &str) {
            self.text.push_str(delta);
        }
        fn on_complete(&mut self, full_text: &str) {
            self.completed = Some(full_text.to_string());
        }
        fn on_status_change(&mut self, status: ConnectionStatus) {
            self.statuses.push(status);
        }
    }

    fn send(tx: &mpsc::UnboundedSender<Envelope>, generation: u64, event: StreamEvent) {
        tx.send(Envelope { generation, event }).unwrap();
    }

    #[tokio::test]
    async fn cancelled_turns_are_filtered_even_when_queued() {
        let fence = Arc::new(Fence::default());
        let (tx, mut rx) = channel(fence.clone());

        send(&tx, 1, StreamEvent::Chunk("old".into()));
        fence.cancel(1);
        send(&tx, 2, StreamEvent::Chunk("new".into()));

        assert_eq!(rx.try_recv(), Some(StreamEvent::Chunk("new".into())));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn finished_turns_survive_a_later_cancellation() {
        let fence = Arc::new(Fence::default());
        let (tx, mut rx) = channel(fence.clone());

        send(&tx, 1, StreamEvent::Chunk("one".into()));
        send(&tx, 1, StreamEvent::Complete("one".into()));
        send(&tx, 2, StreamEvent::Chunk("two".into()));
        fence.cancel(2);
        send(&tx, 3, StreamEvent::Chunk("three".into()));

        assert_eq!(rx.try_recv(), Some(StreamEvent::Chunk("one".into())));
        assert_eq!(rx.try_recv(), Some(StreamEvent::Complete("one".into())));
        assert_eq!(rx.try_recv(), Some(StreamEvent::Chunk("three".into())));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn fence_prunes_generations_the_receiver_has_passed() {
        let fence = Fence::default();
        fence.cancel(1);
        fence.cancel(3);
        assert!(!fence.admits(1));
        assert!(fence.admits(2));
        assert!(!fence.admits(3));
        assert!(fence.admits(4));
        assert!(fence.cancelled.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatch_feeds_observer_until_sender_drops() {
        let (tx, rx) = channel(Arc::default());

        send(&tx, 7, StreamEvent::Status(ConnectionStatus::Connected));
        send(&tx, 7, StreamEvent::Chunk("he".into()));
        send(&tx, 7, StreamEvent::Chunk("y".into()));
        send(&tx, 7, StreamEvent::Complete("hey".into()));
        drop(tx);

        let mut recorder = Recorder::default();
        rx.dispatch(&mut recorder).await;

        assert_eq!(recorder.text, "hey");
        assert_eq!(recorder.completed.as_deref(), Some("hey"));
        assert_eq!(recorder.statuses, vec![ConnectionStatus::Connected]);
    }

    #[tokio::test]
    async fn collect_turn_stops_at_terminal_event() {
        let (tx, mut rx) = channel(Arc::default());

        send(&tx, 0, StreamEvent::Chunk("a".into()));
        send(&tx, 0, StreamEvent::Error(ChatError::StreamError("reset".into())));
        send(&tx, 0, StreamEvent::Chunk("next turn".into()));

        let events = rx.collect_turn().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
        assert_eq!(rx.try_recv(), Some(StreamEvent::Chunk("next turn".into())));
    }
}
