//! Chat backend client
//!
//! Owns one `reqwest::Client` and hands it to every connection it creates.
//! Besides streamed turns it covers the two REST collaborators a chat view
//! needs before streaming: session creation and history retrieval.

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::streaming::{
    EventReceiver, EventTransport, HttpTransport, QueuedStreamConnection, StreamConnection,
};
use crate::types::{ChatTarget, HistoryMessage, SessionInfo};
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ChatClient {
    config: ChatConfig,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let http = config.http_client()?;
        Ok(Self { config, http })
    }

    /// Use a caller-supplied HTTP client (proxies, custom TLS, ...).
    pub fn with_http_client(config: ChatConfig, http: reqwest::Client) -> Result<Self, ChatError> {
        config.validate()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn transport(&self) -> Arc<dyn EventTransport> {
        Arc::new(HttpTransport::new(self.http.clone()))
    }

    /// Connection that forwards chunks as they arrive.
    pub fn stream_connection(&self) -> (StreamConnection, EventReceiver) {
        StreamConnection::new(self.config.clone(), self.transport())
    }

    /// Connection that paces chunks through the typewriter queue.
    pub fn queued_stream_connection(&self) -> (QueuedStreamConnection, EventReceiver) {
        QueuedStreamConnection::new(self.config.clone(), self.transport())
    }

    /// `POST {base_url}/sessions`
    pub async fn create_session(&self, workflow_id: Option<&str>) -> Result<SessionInfo, ChatError> {
        let url = self.config.url_for(&["sessions"]);
        let body = match workflow_id {
            Some(id) => serde_json::json!({ "workflowId": id }),
            None => serde_json::json!({}),
        };

        tracing::debug!(url = %url, workflow_id = ?workflow_id, "Creating chat session");
        let response = self.request(self.http.post(&url).json(&body)).send().await?;
        let mut session: SessionInfo = read_json(response, &["data"]).await?;
        if session.workflow_id.is_none() {
            session.workflow_id = workflow_id.map(str::to_string);
        }
        Ok(session)
    }

    /// `GET {base_url}/sessions/{session_id}/messages`
    pub async fn history(&self, target: &ChatTarget) -> Result<Vec<HistoryMessage>, ChatError> {
        if target.session_id.trim().is_empty() {
            return Err(ChatError::InvalidInput("session id must not be empty".to_string()));
        }
        let url = self
            .config
            .url_for(&["sessions", &target.session_id, "messages"]);

        tracing::debug!(url = %url, "Fetching chat history");
        let response = self.request(self.http.get(&url)).send().await?;
        read_json(response, &["data", "messages"]).await
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(token) = self.config.bearer_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

/// Check the status and decode the body, peeling envelope keys
/// (`{ "data": ... }`) for as long as one matches, so `{ "data": { "messages": [...] } }`
/// unwraps to the array.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    envelope_keys: &[&str],
) -> Result<T, ChatError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ChatError::api_error(status.as_u16(), text));
    }

    let mut value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| ChatError::ParseError(format!("Invalid JSON response: {e}")))?;
    while let Some(obj) = value.as_object_mut()
        && let Some(inner) = envelope_keys.iter().find_map(|k| obj.remove(*k))
    {
        value = inner;
    }

    serde_json::from_value(value)
        .map_err(|e| ChatError::ParseError(format!("Unexpected response shape: {e}")))
}
