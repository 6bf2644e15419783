//! Event-stream transport
//!
//! A transport opens one streamed request and yields the raw `data` text of
//! every SSE event until the body ends. Connections only see this trait, so
//! tests and alternative backends can supply their own stream.

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::streaming::sse::SseStreamExt;
use crate::telemetry::mask_token;
use crate::types::{ChatTarget, ChatTurnBody};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::pin::Pin;

/// Raw SSE `data` payloads; ends when the server closes the stream
pub type RawEventStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// A fully prepared streamed chat request
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl StreamRequest {
    /// Build the `POST {base_url}/sessions/{session_id}/chat` request for one turn.
    pub fn new(config: &ChatConfig, target: &ChatTarget, message: &str) -> Result<Self, ChatError> {
        if target.session_id.trim().is_empty() {
            return Err(ChatError::InvalidInput("session id must not be empty".to_string()));
        }

        let url = config.url_for(&["sessions", &target.session_id, "chat"]);
        reqwest::Url::parse(&url)
            .map_err(|e| ChatError::ConfigurationError(format!("Invalid stream URL '{url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = config.bearer_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let body = serde_json::to_value(ChatTurnBody::new(target, message))?;

        Ok(Self { url, headers, body })
    }
}

/// Opens event streams
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Send the request and validate the response status.
    ///
    /// Any failure here (network error, non-2xx status) is fatal for the turn.
    async fn open(&self, request: StreamRequest) -> Result<RawEventStream, ChatError>;
}

/// reqwest + eventsource-stream transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        Ok(Self::new(config.http_client()?))
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn open(&self, request: StreamRequest) -> Result<RawEventStream, ChatError> {
        let StreamRequest { url, headers, body } = request;

        tracing::debug!(
            url = %url,
            authorization = ?headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(mask_token),
            "Opening event stream"
        );

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(ChatError::from)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(ChatError::api_error(status.as_u16(), text));
        }

        let byte_stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::StreamError(format!("Stream error: {e}"))));

        let events = byte_stream.into_sse_stream().map(|item| match item {
            Ok(event) => Ok(event.data),
            Err(e) => Err(ChatError::StreamError(format!("SSE parsing error: {e}"))),
        });

        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_stream_headers_and_body() {
        let config = ChatConfig::builder()
            .base_url("http://localhost:3000/api")
            .api_token("tok-123")
            .build()
            .unwrap();
        let target = ChatTarget::new("s 1").with_workflow("wf");

        let req = StreamRequest::new(&config, &target, "hi").unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/sessions/s%201/chat");
        assert_eq!(req.headers[ACCEPT], "text/event-stream");
        assert_eq!(req.headers[CACHE_CONTROL], "no-cache");
        assert_eq!(req.headers[AUTHORIZATION], "Bearer tok-123");
        assert!(!format!("{:?}", req.headers).contains("tok-123"));
        assert_eq!(
            req.body,
            serde_json::json!({"sessionId": "s 1", "workflowId": "wf", "message": "hi"})
        );
    }

    #[test]
    fn no_token_means_no_authorization_header() {
        let config = ChatConfig::new("http://localhost:3000").unwrap();
        let req = StreamRequest::new(&config, &ChatTarget::new("s"), "hi").unwrap();
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn empty_session_is_rejected() {
        let config = ChatConfig::new("http://localhost:3000").unwrap();
        let err = StreamRequest::new(&config, &ChatTarget::new("  "), "hi").unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }
}
