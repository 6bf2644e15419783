#![allow(dead_code)]

pub mod scripted_transport;

use chatstream::ChatConfig;
use chatstream::streaming::{EventReceiver, StreamEvent};
use std::time::Duration;

pub use scripted_transport::{Feed, ScriptedTransport};

pub fn config() -> ChatConfig {
    ChatConfig::builder()
        .base_url("http://chat.test/api")
        .api_token("test-token")
        .build()
        .expect("valid config")
}

pub fn paced_config(tick: Duration, batch_chars: usize) -> ChatConfig {
    ChatConfig::builder()
        .base_url("http://chat.test/api")
        .typewriter_tick(tick)
        .typewriter_batch_chars(batch_chars)
        .build()
        .expect("valid config")
}

/// Assert nothing else shows up within `wait`.
pub async fn assert_quiet(events: &mut EventReceiver, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, events.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}

pub fn chunks_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Chunk(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
