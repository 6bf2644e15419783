//! Per-connection state shared by both connection kinds
//!
//! A connection owns one [`Shared`]: its generation counter, the assembled
//! text of the live turn, the live turn's cancel handle, the event sender and
//! the receiver's fence. Every mutation happens under the state lock after
//! checking that the caller's generation is still live; the generation
//! itself only changes under that lock. Cancelling an open turn also fences
//! its generation so events it already queued are never read.

use super::cancel::CancelHandle;
use super::events::{self, ConnectionStatus, Envelope, EventReceiver, Fence, StreamEvent};
use super::transport::{EventTransport, RawEventStream, StreamRequest};
use crate::error::ChatError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Default)]
struct TurnState {
    accumulated: String,
    /// Present while a turn is open
    cancel: Option<CancelHandle>,
}

pub(crate) struct Shared {
    generation: AtomicU64,
    fence: Arc<Fence>,
    state: Mutex<TurnState>,
    tx: mpsc::UnboundedSender<Envelope>,
    /// Whether `Status` events are published
    reports_status: bool,
}

impl Shared {
    pub(crate) fn new(reports_status: bool) -> (Arc<Self>, EventReceiver) {
        let fence = Arc::new(Fence::default());
        let (tx, rx) = events::channel(fence.clone());
        let shared = Arc::new(Self {
            generation: AtomicU64::new(0),
            fence,
            state: Mutex::new(TurnState::default()),
            tx,
            reports_status,
        });
        (shared, rx)
    }

    fn lock(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, generation: u64, event: StreamEvent) {
        // The receiver may be gone; nothing left to tell.
        let _ = self.tx.send(Envelope { generation, event });
    }

    /// Invalidate any previous turn and open a fresh one.
    pub(crate) fn begin_turn(self: &Arc<Self>) -> Turn {
        let mut state = self.lock();
        let previous_generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let generation = previous_generation + 1;
        if let Some(previous) = state.cancel.take() {
            previous.cancel();
            self.fence.cancel(previous_generation);
            tracing::debug!(generation, "Aborted previous turn");
        }
        state.accumulated.clear();

        let cancel = CancelHandle::new();
        state.cancel = Some(cancel.clone());
        if self.reports_status {
            self.emit(generation, StreamEvent::Status(ConnectionStatus::Connecting));
        }
        drop(state);

        Turn {
            shared: self.clone(),
            id: Uuid::new_v4(),
            generation,
            cancel,
        }
    }

    /// Explicit stop. Returns whether a turn was open; a no-op otherwise.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        let Some(cancel) = state.cancel.take() else {
            return false;
        };
        let closed = self.generation.fetch_add(1, Ordering::SeqCst);
        let generation = closed + 1;
        cancel.cancel();
        self.fence.cancel(closed);
        if self.reports_status {
            self.emit(generation, StreamEvent::Status(ConnectionStatus::Disconnected));
        }
        true
    }

    pub(crate) fn current_content(&self) -> String {
        self.lock().accumulated.clone()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.lock().cancel.is_some()
    }
}

/// Capability to act on behalf of one generation
pub(crate) struct Turn {
    shared: Arc<Shared>,
    /// Log correlation only
    id: Uuid,
    generation: u64,
    pub(crate) cancel: CancelHandle,
}

impl Turn {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn is_current(&self) -> bool {
        self.shared.generation.load(Ordering::SeqCst) == self.generation
    }

    /// Run `f` under the state lock if this turn is still live.
    fn with_live_state(&self, f: impl FnOnce(&mut TurnState)) -> bool {
        let mut state = self.shared.lock();
        if !self.is_current() {
            return false;
        }
        f(&mut state);
        true
    }

    /// Append `text` and publish it.
    pub(crate) fn deliver(&self, text: &str) -> bool {
        self.with_live_state(|state| {
            state.accumulated.push_str(text);
            self.shared
                .emit(self.generation, StreamEvent::Chunk(text.to_string()));
        })
    }

    /// Publish `Complete` with everything delivered so far and end the turn.
    pub(crate) fn complete(&self) -> bool {
        self.with_live_state(|state| {
            state.cancel = None;
            self.shared.emit(
                self.generation,
                StreamEvent::Complete(state.accumulated.clone()),
            );
            if self.shared.reports_status {
                self.shared.emit(
                    self.generation,
                    StreamEvent::Status(ConnectionStatus::Disconnected),
                );
            }
        })
    }

    /// Publish `Error` and force-close the turn.
    pub(crate) fn fail(&self, error: ChatError) -> bool {
        tracing::warn!(
            turn_id = %self.id,
            generation = self.generation,
            error = %error,
            "Turn failed"
        );
        self.with_live_state(|state| {
            if let Some(cancel) = state.cancel.take() {
                cancel.cancel();
            }
            self.shared.emit(self.generation, StreamEvent::Error(error));
            if self.shared.reports_status {
                self.shared
                    .emit(self.generation, StreamEvent::Status(ConnectionStatus::Error));
            }
        })
    }

    pub(crate) fn status(&self, status: ConnectionStatus) -> bool {
        self.shared.reports_status
            && self.with_live_state(|_| self.shared.emit(self.generation, StreamEvent::Status(status)))
    }

    /// End the turn without publishing anything.
    pub(crate) fn abandon(&self) {
        self.with_live_state(|state| state.cancel = None);
    }

    /// Open the transport, racing the turn's cancel handle.
    ///
    /// Returns `None` when the turn was cancelled, superseded, or the open
    /// failed (already published as `Error`).
    pub(crate) async fn open(
        &self,
        transport: &dyn EventTransport,
        request: StreamRequest,
    ) -> Option<RawEventStream> {
        let opened = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            opened = transport.open(request) => opened,
        };

        match opened {
            Ok(stream) if self.is_current() => {
                tracing::debug!(turn_id = %self.id, "Event stream open");
                self.status(ConnectionStatus::Connected);
                Some(stream)
            }
            Ok(_) => None,
            Err(error) => {
                self.fail(error);
                None
            }
        }
    }
}
