//! Session/conversation controller
//!
//! Owns the session list, the active conversation and the draft composer.
//! Every mutation goes through one of the operations below; sends are a
//! two-phase append (optimistic user message, then reply or apology) that
//! never retracts the first entry.

mod state;

pub use state::{AppState, ControllerPhase};

use crate::api::{
    timestamp, ApiError, ChatReply, ChatRequest, ChunkKind, Message, ResearchApi, Role, Session,
    SessionConfig,
};
use crate::mention::{Composer, ComposerError, ToolMode};
use crate::tools::ToolRegistry;
use chrono::Utc;
use futures::StreamExt;
use std::borrow::Cow;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use thiserror::Error;

/// Assistant message shown when a send fails
pub const APOLOGY: &str =
    "Sorry, I encountered an error while processing your message. Please try again.";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("No active session")]
    NoActiveSession,
    #[error("A message is already being sent")]
    Busy,
    #[error("Unknown session: {0}")]
    UnknownSession(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// How a send that was accepted ended
#[derive(Debug)]
pub enum SendOutcome {
    /// Reply appended
    Delivered,
    /// Apology appended; the error has already been logged
    Failed(ApiError),
    /// Blank input, nothing appended
    Skipped,
}

/// Intermediate states of a send, reported while it is in flight
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SendProgress<'a> {
    /// The optimistic user message was appended
    Started(&'a Message),
    /// Reply text streamed so far
    Partial(&'a str),
}

/// Settings the controller needs from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Parameters for every session this client creates
    pub session: SessionConfig,
    /// Messages fetched when a session is loaded
    pub history_limit: usize,
    /// Use the streaming endpoint for drafts
    pub stream_replies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Single,
    Stream,
}

/// Holds the `Sending` phase for its lifetime, including when the send
/// future is dropped mid-flight.
struct SendingGuard<'a> {
    state: &'a mut AppState,
    previous: ControllerPhase,
}

impl<'a> SendingGuard<'a> {
    fn enter(state: &'a mut AppState) -> Self {
        let previous = std::mem::replace(&mut state.phase, ControllerPhase::Sending);
        Self { state, previous }
    }
}

impl Deref for SendingGuard<'_> {
    type Target = AppState;

    fn deref(&self) -> &AppState {
        self.state
    }
}

impl DerefMut for SendingGuard<'_> {
    fn deref_mut(&mut self) -> &mut AppState {
        self.state
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.state.phase = self.previous;
    }
}

pub struct ChatController<A> {
    api: A,
    registry: Arc<ToolRegistry>,
    settings: ControllerSettings,
    state: AppState,
    composer: Composer,
}

impl<A: ResearchApi> ChatController<A> {
    pub fn new(api: A, registry: Arc<ToolRegistry>, settings: ControllerSettings) -> Self {
        Self {
            api,
            composer: Composer::new(Arc::clone(&registry)),
            registry,
            settings,
            state: AppState::default(),
        }
    }

    // ---- views ----

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn sessions(&self) -> &[Session] {
        &self.state.sessions
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.state.active_session_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn phase(&self) -> ControllerPhase {
        self.state.phase
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.is_initializing()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Text to show for a message: user text in display mention syntax,
    /// everything else verbatim.
    pub fn display_content<'a>(&self, message: &'a Message) -> Cow<'a, str> {
        match message.role {
            Role::User => Cow::Owned(self.composer.transformer().to_display(&message.content)),
            _ => Cow::Borrowed(&message.content),
        }
    }

    /// Display names of the tools a turn used
    pub fn tool_badges<'a>(&'a self, message: &'a Message) -> Vec<&'a str> {
        message
            .tools()
            .iter()
            .map(|identifier| self.registry.display_name_for(identifier))
            .collect()
    }

    // ---- startup ----

    /// Health check, session discovery and first history load.
    ///
    /// Transport failures degrade to an empty state; the controller is
    /// always `Idle` afterwards.
    pub async fn initialize(&mut self) {
        tracing::info!(
            model = %self.settings.session.model_name,
            "Initializing chat controller"
        );

        match self.api.health_check().await {
            Ok(health) => {
                tracing::info!(
                    status = %health.status,
                    version = health.version.as_deref().unwrap_or("unknown"),
                    "Research service reachable"
                );
                self.check_tools().await;
                self.discover_sessions().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Research service unavailable, starting without sessions");
            }
        }

        self.state.phase = ControllerPhase::Idle;
        tracing::info!(
            sessions = self.state.sessions.len(),
            active_session = self.active_session_id().unwrap_or("-"),
            "Chat controller ready"
        );
    }

    async fn discover_sessions(&mut self) {
        match self.api.list_sessions().await {
            Ok(sessions) => {
                self.state.sessions = sessions;
                if let Err(e) = self.activate_first_or_create().await {
                    tracing::error!(error = %e, "Failed to open an initial session");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list sessions");
            }
        }
    }

    /// Warn about configured tools the backend does not advertise
    async fn check_tools(&self) {
        let advertised = match self.api.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::debug!(error = %e, "Tool list unavailable, skipping tool check");
                return;
            }
        };
        let names: HashSet<&str> = advertised.iter().map(|t| t.name.as_str()).collect();
        for tool in self.registry.descriptors() {
            if !names.contains(tool.identifier.as_str()) {
                tracing::warn!(tool = %tool.identifier, "Configured tool is not advertised by the service");
            }
        }
    }

    // ---- sessions ----

    /// Create a session and make it active with an empty history
    pub async fn create_session(&mut self) -> Result<Session, ControllerError> {
        self.ensure_idle()?;
        self.create_and_activate().await
    }

    async fn create_and_activate(&mut self) -> Result<Session, ControllerError> {
        let session = self.api.create_session(&self.settings.session).await?;
        tracing::info!(session_id = %session.session_id, "Switched to new session");
        self.state.activate_new(session.clone());
        Ok(session)
    }

    /// Make `session_id` active, load its history and refresh its details.
    ///
    /// A failed history fetch leaves the session active with an empty
    /// conversation.
    pub async fn select_session(&mut self, session_id: &str) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        if self.state.session(session_id).is_none() {
            return Err(ControllerError::UnknownSession(session_id.to_string()));
        }
        self.state.active_session_id = Some(session_id.to_string());
        self.load_history(session_id).await;
        self.sync_session(session_id).await;
        Ok(())
    }

    /// Replace the listed copy of a session with the service's view of it,
    /// which corrects the approximate message count. Best effort.
    async fn sync_session(&mut self, session_id: &str) {
        match self.api.get_session(session_id).await {
            Ok(fresh) => {
                if let Some(session) = self.state.session_mut(session_id) {
                    *session = fresh;
                }
            }
            Err(e) => {
                tracing::debug!(session_id, error = %e, "Failed to refresh session details");
            }
        }
    }

    /// Delete a session. The list is only changed once the service confirms.
    ///
    /// Deleting the active session activates the first remaining one, or a
    /// newly created session when none remain.
    pub async fn delete_session(&mut self, session_id: &str) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        if self.state.session(session_id).is_none() {
            return Err(ControllerError::UnknownSession(session_id.to_string()));
        }

        self.api.delete_session(session_id).await?;
        let was_active = self.state.is_active(session_id);
        self.state.remove_session(session_id);
        tracing::info!(session_id, was_active, "Session deleted");

        if was_active {
            self.state.active_session_id = None;
            self.state.messages.clear();
            self.activate_first_or_create().await?;
        }
        Ok(())
    }

    /// Re-list sessions from the service, which also resyncs the local
    /// message counts.
    pub async fn refresh_sessions(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        let sessions = self.api.list_sessions().await?;
        self.state.sessions = sessions;

        let still_present = self
            .state
            .active_session_id
            .as_deref()
            .is_some_and(|id| self.state.session(id).is_some());
        if !still_present {
            tracing::info!("Active session no longer listed, switching");
            self.state.active_session_id = None;
            self.state.messages.clear();
            self.activate_first_or_create().await?;
        }
        Ok(())
    }

    /// Remove every message of the active session
    pub async fn clear_history(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        let session_id = self
            .state
            .active_session_id
            .clone()
            .ok_or(ControllerError::NoActiveSession)?;

        self.api.clear_history(&session_id).await?;
        self.state.messages.clear();
        if let Some(session) = self.state.session_mut(&session_id) {
            session.message_count = 0;
        }
        Ok(())
    }

    async fn activate_first_or_create(&mut self) -> Result<(), ControllerError> {
        match self.state.sessions.first().map(|s| s.session_id.clone()) {
            Some(first) => {
                self.state.active_session_id = Some(first.clone());
                self.load_history(&first).await;
                Ok(())
            }
            None => self.create_and_activate().await.map(|_| ()),
        }
    }

    async fn load_history(&mut self, session_id: &str) {
        match self
            .api
            .get_history(session_id, self.settings.history_limit)
            .await
        {
            Ok(messages) => {
                tracing::debug!(session_id, count = messages.len(), "History loaded");
                self.state.messages = messages;
            }
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Failed to load history, showing empty conversation");
                self.state.messages.clear();
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), ControllerError> {
        if self.state.is_loading() {
            return Err(ControllerError::Busy);
        }
        Ok(())
    }

    // ---- sending ----

    /// Send already-encoded text with a single request/response call
    pub async fn send_message(
        &mut self,
        text: &str,
        progress: &mut (dyn FnMut(SendProgress<'_>) + Send),
    ) -> Result<SendOutcome, ControllerError> {
        self.send(text, Transport::Single, progress).await
    }

    /// Send already-encoded text over the streaming endpoint. The reply is
    /// appended once, when the stream completes.
    pub async fn send_message_streaming(
        &mut self,
        text: &str,
        progress: &mut (dyn FnMut(SendProgress<'_>) + Send),
    ) -> Result<SendOutcome, ControllerError> {
        self.send(text, Transport::Stream, progress).await
    }

    /// Encode the draft for its mode and send it. The draft is reset once
    /// the send was accepted, whatever the remote outcome.
    pub async fn submit_draft(
        &mut self,
        progress: &mut (dyn FnMut(SendProgress<'_>) + Send),
    ) -> Result<SendOutcome, ControllerError> {
        let Some(submission) = self.composer.prepare_submission() else {
            return Ok(SendOutcome::Skipped);
        };
        tracing::debug!(
            mode = %submission.mode,
            tools = ?submission.tools,
            "Submitting draft"
        );

        let transport = if self.settings.stream_replies {
            Transport::Stream
        } else {
            Transport::Single
        };
        let outcome = self.send(&submission.text, transport, progress).await?;
        self.composer.reset();
        Ok(outcome)
    }

    async fn send(
        &mut self,
        text: &str,
        transport: Transport,
        progress: &mut (dyn FnMut(SendProgress<'_>) + Send),
    ) -> Result<SendOutcome, ControllerError> {
        self.ensure_idle()?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Skipped);
        }
        let session_id = self
            .state
            .active_session_id
            .clone()
            .ok_or(ControllerError::NoActiveSession)?;

        let api = &self.api;
        let mut state = SendingGuard::enter(&mut self.state);

        state.messages.push(Message::user(text));
        if let Some(message) = state.messages.last() {
            progress(SendProgress::Started(message));
        }
        tracing::info!(session_id = %session_id, ?transport, "Sending message");

        let request = ChatRequest::new(text);
        let result = match transport {
            Transport::Single => api.send_chat(&session_id, &request).await,
            Transport::Stream => collect_stream(api, &session_id, &request, progress).await,
        };

        match result {
            Ok(reply) => {
                state.messages.push(Message::assistant(
                    reply.content,
                    reply.timestamp,
                    Some(reply.tools_used),
                ));
                if let Some(session) = state.session_mut(&session_id) {
                    session.message_count += 2;
                }
                Ok(SendOutcome::Delivered)
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    kind = ?e.kind,
                    error = %e,
                    "Failed to send message"
                );
                state
                    .messages
                    .push(Message::assistant(APOLOGY, Utc::now(), None));
                Ok(SendOutcome::Failed(e))
            }
        }
    }

    // ---- composer ----

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.composer.set_text(text);
    }

    pub fn append_draft(&mut self, text: &str) {
        self.composer.push_str(text);
    }

    pub fn select_tool(&mut self, identifier: &str) -> Result<(), ComposerError> {
        self.composer.apply_tool_selection(identifier)
    }

    pub fn remove_tool(&mut self, identifier: &str) -> Result<(), ComposerError> {
        self.composer.remove_tool(identifier)
    }

    pub fn toggle_tool(&mut self, identifier: &str) -> Result<(), ComposerError> {
        self.composer.toggle_tool(identifier)
    }

    pub fn apply_group(&mut self, label: &str) -> Result<(), ComposerError> {
        self.composer.apply_group(label)
    }

    pub fn set_mode(&mut self, mode: ToolMode) {
        self.composer.set_mode(mode);
    }
}

/// Drain a streamed reply into a single [`ChatReply`]
async fn collect_stream<A: ResearchApi>(
    api: &A,
    session_id: &str,
    request: &ChatRequest,
    progress: &mut (dyn FnMut(SendProgress<'_>) + Send),
) -> Result<ChatReply, ApiError> {
    let mut stream = api.stream_chat(session_id, request).await?;
    let mut content = String::new();
    let mut tools_used: Vec<String> = Vec::new();
    let mut finished_at = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        match chunk.kind {
            ChunkKind::Text => {
                content.push_str(&chunk.content);
                progress(SendProgress::Partial(&content));
            }
            ChunkKind::ToolStart => {
                if let Some(name) = chunk.tool_name {
                    tracing::debug!(session_id, tool = %name, "Tool started");
                    if !tools_used.contains(&name) {
                        tools_used.push(name);
                    }
                }
            }
            ChunkKind::ToolEnd | ChunkKind::Thinking => {
                tracing::trace!(session_id, kind = ?chunk.kind, "Ignoring chunk");
            }
            ChunkKind::Error => return Err(ApiError::remote(chunk.content)),
            ChunkKind::Done => {
                finished_at = chunk.timestamp.as_deref().and_then(timestamp::parse);
                break;
            }
        }
    }

    if content.is_empty() {
        return Err(ApiError::decode("Stream ended without reply text"));
    }
    Ok(ChatReply {
        content,
        tools_used,
        timestamp: finished_at.unwrap_or_else(Utc::now),
    })
}
