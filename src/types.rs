//! Shared request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the conversation a turn belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTarget {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

impl ChatTarget {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            workflow_id: None,
        }
    }

    pub fn with_workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }
}

/// JSON body of a streamed chat turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnBody<'a> {
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<&'a str>,
    pub message: &'a str,
}

impl<'a> ChatTurnBody<'a> {
    pub fn new(target: &'a ChatTarget, message: &'a str) -> Self {
        Self {
            session_id: &target.session_id,
            workflow_id: target.workflow_id.as_deref(),
            message,
        }
    }
}

/// Session returned by the session-creation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(alias = "sessionId", alias = "id")]
    pub session_id: String,
    #[serde(default, alias = "workflowId")]
    pub workflow_id: Option<String>,
}

impl SessionInfo {
    pub fn target(&self) -> ChatTarget {
        ChatTarget {
            session_id: self.session_id.clone(),
            workflow_id: self.workflow_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    #[serde(other)]
    Other,
}

/// A prior turn returned by the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}
