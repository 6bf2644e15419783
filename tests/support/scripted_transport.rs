//! In-memory transport: each `open` hands out the next scripted stream

use async_trait::async_trait;
use chatstream::ChatError;
use chatstream::streaming::{EventTransport, RawEventStream, StreamRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

enum Script {
    Stream(mpsc::UnboundedReceiver<Result<String, ChatError>>),
    Fail(ChatError),
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<StreamRequest>>>,
}

/// Producer side of one scripted stream. Dropping it closes the stream.
pub struct Feed {
    tx: mpsc::UnboundedSender<Result<String, ChatError>>,
}

impl Feed {
    pub fn send(&self, data: &str) {
        let _ = self.tx.send(Ok(data.to_string()));
    }

    pub fn chunk(&self, text: &str) {
        self.send(&serde_json::json!({ "type": "content", "message": text }).to_string());
    }

    pub fn done(&self) {
        self.send("[DONE]");
    }

    pub fn fail(&self, error: ChatError) {
        let _ = self.tx.send(Err(error));
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `open` to succeed; returns the feed for its stream.
    pub fn push_stream(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Stream(rx));
        Feed { tx }
    }

    /// Script the next `open` to fail.
    pub fn push_failure(&self, error: ChatError) {
        self.scripts.lock().unwrap().push_back(Script::Fail(error));
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn open(&self, request: StreamRequest) -> Result<RawEventStream, ChatError> {
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Stream(mut rx)) => Ok(Box::pin(async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            })),
            Some(Script::Fail(error)) => Err(error),
            None => Err(ChatError::ConnectionError("no scripted stream".to_string())),
        }
    }
}
