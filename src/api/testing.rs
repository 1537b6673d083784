//! In-memory research API for tests
//!
//! Behaves like a small server (sessions and histories are stored), with
//! queued chat replies and per-operation failure injection.

use super::types::{
    ChatReply, ChatRequest, HealthStatus, Message, Session, SessionConfig, StreamChunk, ToolInfo,
};
use super::{ApiError, ChunkStream, ResearchApi};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Health,
    ListSessions,
    GetSession,
    CreateSession,
    DeleteSession,
    GetHistory,
    ClearHistory,
    SendChat,
    StreamChat,
    ListTools,
}

/// Mock API with recorded calls
pub struct MockApi {
    sessions: Mutex<Vec<Session>>,
    histories: Mutex<HashMap<String, Vec<Message>>>,
    replies: Mutex<VecDeque<Result<ChatReply, ApiError>>>,
    streams: Mutex<VecDeque<Vec<Result<StreamChunk, ApiError>>>>,
    tools: Mutex<Vec<ToolInfo>>,
    failing: Mutex<HashSet<MockOp>>,
    chat_delay: Mutex<Option<Duration>>,
    next_id: Mutex<u32>,
    /// Every call, in order
    calls: Mutex<Vec<MockOp>>,
    /// (session id, message) of every chat request
    sent: Mutex<Vec<(String, String)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            histories: Mutex::new(HashMap::new()),
            replies: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            tools: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            chat_delay: Mutex::new(None),
            next_id: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Seed sessions, given newest first
    pub fn with_sessions(self, ids: &[&str]) -> Self {
        {
            let mut sessions = self.sessions.lock().unwrap();
            let count = ids.len();
            for (index, id) in ids.iter().enumerate() {
                let age = i64::try_from(count - index).unwrap();
                sessions.push(test_session(id, age));
            }
        }
        self
    }

    pub fn with_history(self, session_id: &str, messages: Vec<Message>) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(session_id.to_string(), messages);
        self
    }

    pub fn with_tools(self, names: &[&str]) -> Self {
        *self.tools.lock().unwrap() = names
            .iter()
            .map(|name| ToolInfo {
                name: (*name).to_string(),
                description: String::new(),
                parameters: serde_json::Value::Null,
                category: String::new(),
                examples: Vec::new(),
            })
            .collect();
        self
    }

    /// Delay every chat request (for overlap tests)
    pub fn with_chat_delay(self, delay: Duration) -> Self {
        *self.chat_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, content: &str, tools_used: &[&str]) {
        self.replies.lock().unwrap().push_back(Ok(ChatReply {
            content: content.to_string(),
            tools_used: tools_used.iter().map(|t| (*t).to_string()).collect(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        }));
    }

    pub fn queue_error(&self, error: ApiError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Queue the chunks of one streamed reply
    pub fn queue_stream(&self, chunks: Vec<Result<StreamChunk, ApiError>>) {
        self.streams.lock().unwrap().push_back(chunks);
    }

    /// Make every later `op` call fail
    pub fn fail(&self, op: MockOp) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.session_id.clone())
            .collect()
    }

    pub fn recorded_calls(&self) -> Vec<MockOp> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, op: MockOp) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn enter(&self, op: MockOp) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ApiError::network(format!("mock failure: {op:?}")));
        }
        Ok(())
    }

    fn find_session(&self, session_id: &str) -> Result<Session, ApiError> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned()
            .ok_or_else(|| ApiError::status(404, "Session not found"))
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

/// A session created `age` minutes before a fixed instant
pub fn test_session(id: &str, age: i64) -> Session {
    Session {
        session_id: id.to_string(),
        model_name: "test-model".to_string(),
        temperature: 0.2,
        created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() - ChronoDuration::minutes(age),
        message_count: 0,
    }
}

#[async_trait]
impl ResearchApi for MockApi {
    async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        self.enter(MockOp::Health)?;
        Ok(HealthStatus {
            status: "ok".to_string(),
            timestamp: None,
            version: Some("test".to_string()),
        })
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.enter(MockOp::ListSessions)?;
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        self.enter(MockOp::GetSession)?;
        self.find_session(session_id)
    }

    async fn create_session(&self, config: &SessionConfig) -> Result<Session, ApiError> {
        self.enter(MockOp::CreateSession)?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("new-{}", *next)
        };
        let session = Session {
            session_id: id,
            model_name: config.model_name.clone(),
            temperature: config.temperature,
            created_at: Utc::now(),
            message_count: 0,
        };
        self.sessions.lock().unwrap().insert(0, session.clone());
        Ok(session)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.enter(MockOp::DeleteSession)?;
        self.find_session(session_id)?;
        self.sessions
            .lock()
            .unwrap()
            .retain(|s| s.session_id != session_id);
        self.histories.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        self.enter(MockOp::GetHistory)?;
        self.find_session(session_id)?;
        let history = self
            .histories
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        let skip = history.len().saturating_sub(limit);
        Ok(history.into_iter().skip(skip).collect())
    }

    async fn clear_history(&self, session_id: &str) -> Result<(), ApiError> {
        self.enter(MockOp::ClearHistory)?;
        self.find_session(session_id)?;
        self.histories.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        self.sent
            .lock()
            .unwrap()
            .push((session_id.to_string(), request.message.clone()));
        let delay = *self.chat_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.enter(MockOp::SendChat)?;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::network("No mock reply queued")))
    }

    async fn stream_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChunkStream, ApiError> {
        self.sent
            .lock()
            .unwrap()
            .push((session_id.to_string(), request.message.clone()));
        self.enter(MockOp::StreamChat)?;
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ApiError::network("No mock stream queued"))?;
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ApiError> {
        self.enter(MockOp::ListTools)?;
        Ok(self.tools.lock().unwrap().clone())
    }
}
