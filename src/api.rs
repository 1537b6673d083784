//! Remote research-assistant service
//!
//! The controller only ever talks to [`ResearchApi`]; the HTTP client and the
//! test mock are interchangeable behind it.

mod error;
mod http;
mod sse;
mod types;

#[cfg(test)]
pub mod testing;

pub use error::{ApiError, ApiErrorKind};
pub use http::HttpApi;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Incremental chunks of a streamed reply
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ApiError>>;

/// Operations the client consumes from the backend
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// Liveness probe
    async fn health_check(&self) -> Result<HealthStatus, ApiError>;

    /// All sessions, newest first
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;

    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError>;

    async fn create_session(&self, config: &SessionConfig) -> Result<Session, ApiError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError>;

    /// Most recent `limit` messages, oldest first
    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError>;

    async fn clear_history(&self, session_id: &str) -> Result<(), ApiError>;

    /// Single request/response chat turn
    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChatReply, ApiError>;

    /// Chat turn delivered as a stream of chunks
    async fn stream_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChunkStream, ApiError>;

    /// Tools the backend advertises
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ApiError>;
}

#[async_trait]
impl<T: ResearchApi + ?Sized> ResearchApi for Arc<T> {
    async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        (**self).health_check().await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        (**self).list_sessions().await
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        (**self).get_session(session_id).await
    }

    async fn create_session(&self, config: &SessionConfig) -> Result<Session, ApiError> {
        (**self).create_session(config).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        (**self).delete_session(session_id).await
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        (**self).get_history(session_id, limit).await
    }

    async fn clear_history(&self, session_id: &str) -> Result<(), ApiError> {
        (**self).clear_history(session_id).await
    }

    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        (**self).send_chat(session_id, request).await
    }

    async fn stream_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChunkStream, ApiError> {
        (**self).stream_chat(session_id, request).await
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ApiError> {
        (**self).list_tools().await
    }
}

/// Logging wrapper for any [`ResearchApi`]
pub struct LoggingApi<A> {
    inner: A,
}

impl<A: ResearchApi> LoggingApi<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

async fn observe<T>(
    operation: &'static str,
    session_id: Option<&str>,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    let start = Instant::now();
    let result = call.await;
    let duration = start.elapsed();
    let session_id = session_id.unwrap_or("-");

    match &result {
        Ok(_) => {
            tracing::debug!(
                operation,
                session_id,
                duration_ms = %duration.as_millis(),
                "API call completed"
            );
        }
        Err(e) => {
            tracing::warn!(
                operation,
                session_id,
                duration_ms = %duration.as_millis(),
                kind = ?e.kind,
                transient = e.kind.is_transient(),
                error = %e,
                "API call failed"
            );
        }
    }

    result
}

#[async_trait]
impl<A: ResearchApi> ResearchApi for LoggingApi<A> {
    async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        observe("health_check", None, self.inner.health_check()).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        observe("list_sessions", None, self.inner.list_sessions()).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        observe("get_session", Some(session_id), self.inner.get_session(session_id)).await
    }

    async fn create_session(&self, config: &SessionConfig) -> Result<Session, ApiError> {
        let result = observe("create_session", None, self.inner.create_session(config)).await;
        if let Ok(session) = &result {
            tracing::info!(
                session_id = %session.session_id,
                model = %session.model_name,
                "Session created"
            );
        }
        result
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        observe("delete_session", Some(session_id), self.inner.delete_session(session_id)).await
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        observe(
            "get_history",
            Some(session_id),
            self.inner.get_history(session_id, limit),
        )
        .await
    }

    async fn clear_history(&self, session_id: &str) -> Result<(), ApiError> {
        observe("clear_history", Some(session_id), self.inner.clear_history(session_id)).await
    }

    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let result = observe(
            "send_chat",
            Some(session_id),
            self.inner.send_chat(session_id, request),
        )
        .await;
        if let Ok(reply) = &result {
            tracing::info!(
                session_id,
                tools_used = ?reply.tools_used,
                reply_chars = reply.content.chars().count(),
                "Chat reply received"
            );
        }
        result
    }

    async fn stream_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChunkStream, ApiError> {
        observe(
            "stream_chat",
            Some(session_id),
            self.inner.stream_chat(session_id, request),
        )
        .await
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ApiError> {
        observe("list_tools", None, self.inner.list_tools()).await
    }
}
