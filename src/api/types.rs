//! Wire types for the research-assistant service

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A server-tracked conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub model_name: String,
    pub temperature: f64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Approximate: bumped locally on send, authoritative after a re-list
    #[serde(default)]
    pub message_count: u32,
}

/// Parameters for creating a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub model_name: String,
    pub temperature: f64,
    pub system_prompt: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// One entry of a session's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Raw text; user text is in backend mention syntax
    pub content: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Tools the backend invoked for this turn, in call order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            tools_used: None,
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        tools_used: Option<Vec<String>>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            tools_used,
        }
    }

    /// Tools used, or an empty slice
    pub fn tools(&self) -> &[String] {
        self.tools_used.as_deref().unwrap_or_default()
    }
}

/// Body of `POST /chat/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Map<String, Value>>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
        }
    }
}

/// Assistant reply to a chat request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    #[serde(rename = "message")]
    pub content: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A tool as advertised by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// The history endpoint answers either with a bare array or wrapped
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum HistoryResponse {
    List(Vec<Message>),
    Wrapped { history: Vec<Message> },
}

impl HistoryResponse {
    pub(crate) fn into_messages(self) -> Vec<Message> {
        match self {
            HistoryResponse::List(messages) | HistoryResponse::Wrapped { history: messages } => {
                messages
            }
        }
    }
}

/// Kind of an incremental streaming chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Text,
    ToolStart,
    ToolEnd,
    Thinking,
    Error,
    Done,
}

/// One server-sent chunk of a streamed reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl StreamChunk {
    pub fn new(kind: ChunkKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            tool_name: None,
            tool_args: None,
            timestamp: None,
        }
    }

    pub fn tool_start(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::new(ChunkKind::ToolStart, "")
        }
    }
}

/// Server timestamps: RFC 3339, or naive ISO-8601 taken as UTC
pub mod timestamp {
    use super::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}
