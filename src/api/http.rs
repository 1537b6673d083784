//! reqwest-backed implementation of the research API

use super::sse::data_payloads;
use super::types::{
    ChatReply, ChatRequest, ChunkKind, HealthStatus, HistoryResponse, Message, Session,
    SessionConfig, StreamChunk, ToolInfo,
};
use super::{ApiError, ChunkStream, ResearchApi};
use async_trait::async_trait;
use futures::{future, Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest error body echoed into an [`ApiError`]
const MAX_ERROR_BODY_CHARS: usize = 300;

/// HTTP client for the research-assistant service
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send with a fresh request id and map non-2xx statuses to errors
    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let request = builder.header("X-Request-Id", &request_id).build()?;
        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            url = %request.url(),
            "Sending request"
        );

        let response = self.client.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        tracing::debug!(request_id = %request_id, status = status.as_u16(), body = %detail, "Request rejected");
        Err(ApiError::status(
            status.as_u16(),
            if detail.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {detail}")
            },
        ))
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.dispatch(builder).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ResearchApi for HttpApi {
    async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        self.fetch(self.client.get(self.url("/health"))).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        self.fetch(self.client.get(self.url("/sessions"))).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        self.fetch(self.client.get(self.url(&format!("/sessions/{session_id}"))))
            .await
    }

    async fn create_session(&self, config: &SessionConfig) -> Result<Session, ApiError> {
        self.fetch(self.client.post(self.url("/sessions")).json(config))
            .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        self.dispatch(self.client.delete(self.url(&format!("/sessions/{session_id}"))))
            .await?;
        Ok(())
    }

    async fn get_history(&self, session_id: &str, limit: usize) -> Result<Vec<Message>, ApiError> {
        let history: HistoryResponse = self
            .fetch(
                self.client
                    .get(self.url(&format!("/sessions/{session_id}/history")))
                    .query(&[("limit", limit)]),
            )
            .await?;
        Ok(history.into_messages())
    }

    async fn clear_history(&self, session_id: &str) -> Result<(), ApiError> {
        self.dispatch(
            self.client
                .delete(self.url(&format!("/sessions/{session_id}/history"))),
        )
        .await?;
        Ok(())
    }

    async fn send_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        self.fetch(
            self.client
                .post(self.url(&format!("/chat/{session_id}")))
                .json(request),
        )
        .await
    }

    async fn stream_chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChunkStream, ApiError> {
        // The stream endpoint is GET-only, so the message travels in the query
        let response = self
            .dispatch(
                self.client
                    .get(self.url(&format!("/chat/{session_id}/stream")))
                    .query(&[("message", request.message.as_str())])
                    .header("Accept", "text/event-stream"),
            )
            .await?;
        Ok(chunk_stream(response.bytes_stream()).boxed())
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, ApiError> {
        self.fetch(self.client.get(self.url("/tools"))).await
    }
}

enum Frame {
    Chunk(StreamChunk),
    /// Explicit end-of-stream sentinel
    End,
    Skip,
}

fn parse_frame(data: &str) -> Result<Frame, ApiError> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Frame::Skip);
    }
    if data == "[DONE]" {
        return Ok(Frame::End);
    }
    Ok(Frame::Chunk(serde_json::from_str(data)?))
}

/// Decode an SSE byte stream into chunks. Ends after a `done` chunk, a
/// `[DONE]` sentinel, the first error, or the end of the body.
fn chunk_stream<S, B>(bytes: S) -> impl Stream<Item = Result<StreamChunk, ApiError>>
where
    S: Stream<Item = Result<B, reqwest::Error>>,
    B: AsRef<[u8]>,
{
    data_payloads(bytes)
        .map(|payload| payload.and_then(|data| parse_frame(&data)))
        .scan(false, |finished, frame| {
            let item = if *finished {
                None
            } else {
                match frame {
                    Ok(Frame::End) => None,
                    Ok(Frame::Skip) => Some(None),
                    Ok(Frame::Chunk(chunk)) => {
                        *finished = chunk.kind == ChunkKind::Done;
                        Some(Some(Ok(chunk)))
                    }
                    Err(e) => {
                        *finished = true;
                        Some(Some(Err(e)))
                    }
                }
            };
            future::ready(item)
        })
        .filter_map(future::ready)
}
