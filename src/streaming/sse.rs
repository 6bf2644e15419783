//! Byte stream to SSE event adapter
//!
//! Thin extension over `eventsource-stream`, which handles UTF-8 boundaries,
//! line buffering and `data:` field joining.

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;

pub use eventsource_stream::Event;

/// SSE event stream over a byte stream `S`
pub type SseStream<S> = EventStream<S>;

/// Turn any `Stream<Item = Result<bytes, E>>` into a stream of SSE events.
pub trait SseStreamExt: Sized {
    fn into_sse_stream(self) -> SseStream<Self>;
}

impl<S, B, E> SseStreamExt for S
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    fn into_sse_stream(self) -> SseStream<Self> {
        self.eventsource()
    }
}
