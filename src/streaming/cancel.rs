//! Cancellation handles for in-flight turns

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation of one turn.
///
/// Cancelling stops the turn's transport and typewriter timer at their next
/// suspension point; dropping the transport stream closes the HTTP
/// connection so the server stops producing tokens.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
