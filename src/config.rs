//! Client configuration
//!
//! `ChatConfig` carries everything a connection or REST call needs: the
//! backend base URL, the optional bearer token, HTTP timeouts and the
//! typewriter pacing used by [`QueuedStreamConnection`](crate::streaming::QueuedStreamConnection).

use crate::error::ChatError;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Default delay between two typewriter ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Default number of characters revealed per typewriter tick.
pub const DEFAULT_BATCH_CHARS: usize = 1;

/// Environment variable names read by [`ChatConfig::from_env`].
pub mod env {
    pub const BASE_URL: &str = "CHATSTREAM_BASE_URL";
    pub const API_TOKEN: &str = "CHATSTREAM_API_TOKEN";
    pub const TICK_MS: &str = "CHATSTREAM_TYPEWRITER_TICK_MS";
    pub const BATCH: &str = "CHATSTREAM_TYPEWRITER_BATCH";
}

/// Pacing of the typewriter queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypewriterConfig {
    /// Delay between two deliveries
    pub tick: Duration,
    /// Characters (Unicode scalar values) delivered per tick
    pub batch_chars: usize,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            batch_chars: DEFAULT_BATCH_CHARS,
        }
    }
}

impl TypewriterConfig {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.tick.is_zero() {
            return Err(ChatError::ConfigurationError(
                "typewriter tick must be greater than zero".to_string(),
            ));
        }
        if self.batch_chars == 0 {
            return Err(ChatError::ConfigurationError(
                "typewriter batch size must be at least one character".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chat backend configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the chat backend, without trailing slash
    pub base_url: String,
    /// Bearer token sent as `Authorization` when present
    pub api_token: Option<SecretString>,
    /// Overall timeout for REST calls. Never applied to streaming bodies.
    pub timeout: Option<Duration>,
    /// Connect timeout for every request
    pub connect_timeout: Option<Duration>,
    pub user_agent: String,
    pub typewriter: TypewriterConfig,
}

impl ChatConfig {
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Shorthand for a config with only a base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChatError> {
        Self::builder().base_url(base_url).build()
    }

    /// Build a configuration from `CHATSTREAM_*` environment variables.
    pub fn from_env() -> Result<Self, ChatError> {
        let base_url = std::env::var(env::BASE_URL).map_err(|_| {
            ChatError::ConfigurationError(format!("{} is not set", env::BASE_URL))
        })?;

        let mut builder = Self::builder().base_url(base_url);

        if let Ok(token) = std::env::var(env::API_TOKEN)
            && !token.trim().is_empty()
        {
            builder = builder.api_token(token);
        }

        if let Ok(raw) = std::env::var(env::TICK_MS) {
            let ms: u64 = raw.trim().parse().map_err(|e| {
                ChatError::ConfigurationError(format!("Invalid {}: {e}", env::TICK_MS))
            })?;
            builder = builder.typewriter_tick(Duration::from_millis(ms));
        }

        if let Ok(raw) = std::env::var(env::BATCH) {
            let n: usize = raw.trim().parse().map_err(|e| {
                ChatError::ConfigurationError(format!("Invalid {}: {e}", env::BATCH))
            })?;
            builder = builder.typewriter_batch_chars(n);
        }

        builder.build()
    }

    pub fn validate(&self) -> Result<(), ChatError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ChatError::ConfigurationError(format!("Invalid base URL '{}': {e}", self.base_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ChatError::ConfigurationError(format!(
                "Base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        self.typewriter.validate()
    }

    /// Token value, if one is configured and non-empty.
    pub(crate) fn bearer_token(&self) -> Option<&str> {
        self.api_token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.is_empty())
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub(crate) fn url_for(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    /// Build the shared HTTP client used by transports and REST calls.
    pub fn http_client(&self) -> Result<reqwest::Client, ChatError> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(t) = self.connect_timeout {
            builder = builder.connect_timeout(t);
        }
        builder
            .build()
            .map_err(|e| ChatError::ConfigurationError(format!("Failed to build HTTP client: {e}")))
    }
}

/// Builder for [`ChatConfig`]
#[derive(Debug, Default, Clone)]
pub struct ChatConfigBuilder {
    base_url: Option<String>,
    api_token: Option<SecretString>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    typewriter: TypewriterConfig,
}

impl ChatConfigBuilder {
    /// Set the backend base URL
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the bearer token
    pub fn api_token<S: Into<String>>(mut self, token: S) -> Self {
        self.api_token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the REST request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the delay between typewriter ticks
    pub fn typewriter_tick(mut self, tick: Duration) -> Self {
        self.typewriter.tick = tick;
        self
    }

    /// Set how many characters each typewriter tick reveals
    pub fn typewriter_batch_chars(mut self, n: usize) -> Self {
        self.typewriter.batch_chars = n;
        self
    }

    pub fn build(self) -> Result<ChatConfig, ChatError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ChatError::ConfigurationError("base URL is required".to_string()))?;

        let config = ChatConfig {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_token: self.api_token,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("chatstream/{}", env!("CARGO_PKG_VERSION"))),
            typewriter: self.typewriter,
        };
        config.validate()?;
        Ok(config)
    }
}
