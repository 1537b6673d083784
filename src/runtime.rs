//! Runtime that owns the controller
//!
//! The controller lives inside one tokio task. Callers talk to it through a
//! [`RuntimeHandle`]; commands are processed strictly in arrival order, so two
//! overlapping sends are queued instead of interleaved. State changes are
//! broadcast to subscribers as [`ViewUpdate`]s.

use crate::api::{Message, ResearchApi, Role, Session};
use crate::controller::{
    ChatController, ControllerError, ControllerPhase, SendOutcome, SendProgress,
};
use crate::mention::{ComposerError, ComposerState, MentionTransformer, ToolMode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Chat runtime has stopped")]
    Stopped,
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Composer(#[from] ComposerError),
}

/// A message as presented: display mention syntax and tool badges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub tool_badges: Vec<String>,
}

/// Everything a front end needs to render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub sessions: Vec<Session>,
    pub active_session_id: Option<String>,
    pub messages: Vec<MessageView>,
    pub phase: ControllerPhase,
    pub composer: ComposerState,
}

impl ViewSnapshot {
    fn capture<A: ResearchApi>(controller: &ChatController<A>) -> Self {
        let state = controller.state();
        Self {
            sessions: state.sessions.clone(),
            active_session_id: state.active_session_id.clone(),
            messages: state
                .messages
                .iter()
                .map(|m| MessageView {
                    role: m.role,
                    content: controller.display_content(m).into_owned(),
                    timestamp: m.timestamp,
                    tool_badges: controller
                        .tool_badges(m)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
            phase: state.phase,
            composer: controller.composer().state().clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ControllerPhase::Sending
    }
}

/// Broadcast to subscribers
#[derive(Debug, Clone)]
pub enum ViewUpdate {
    /// Full state after a command completed
    Snapshot(Arc<ViewSnapshot>),
    /// Optimistic user message of a send that is now in flight
    Sending { message: MessageView },
    /// Streamed reply text so far
    Partial { text: String },
}

/// Draft edits
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEdit {
    SetText(String),
    Append(String),
    SelectTool(String),
    RemoveTool(String),
    ToggleTool(String),
    ApplyGroup(String),
    SetMode(ToolMode),
}

type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

enum Command {
    Initialize {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Arc<ViewSnapshot>>,
    },
    CreateSession {
        reply: Reply<Session>,
    },
    SelectSession {
        session_id: String,
        reply: Reply<()>,
    },
    DeleteSession {
        session_id: String,
        reply: Reply<()>,
    },
    RefreshSessions {
        reply: Reply<()>,
    },
    ClearHistory {
        reply: Reply<()>,
    },
    SendMessage {
        text: String,
        reply: Reply<SendOutcome>,
    },
    SubmitDraft {
        reply: Reply<SendOutcome>,
    },
    EditDraft {
        edit: DraftEdit,
        reply: oneshot::Sender<Result<(), ComposerError>>,
    },
}

pub struct ChatRuntime<A> {
    controller: ChatController<A>,
    commands: mpsc::Receiver<Command>,
    updates: broadcast::Sender<ViewUpdate>,
}

impl<A: ResearchApi + 'static> ChatRuntime<A> {
    /// Move the controller into a background task
    pub fn spawn(controller: ChatController<A>) -> RuntimeHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (update_tx, _) = broadcast::channel(128);

        let runtime = Self {
            controller,
            commands: command_rx,
            updates: update_tx.clone(),
        };
        tokio::spawn(runtime.run());

        RuntimeHandle {
            commands: command_tx,
            updates: update_tx,
        }
    }

    async fn run(mut self) {
        tracing::info!("Starting chat runtime");
        while let Some(command) = self.commands.recv().await {
            self.handle(command).await;
        }
        tracing::info!("Chat runtime stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize { reply } => {
                self.controller.initialize().await;
                self.publish();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::CreateSession { reply } => {
                let result = self.controller.create_session().await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::SelectSession { session_id, reply } => {
                let result = self.controller.select_session(&session_id).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::DeleteSession { session_id, reply } => {
                let result = self.controller.delete_session(&session_id).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::RefreshSessions { reply } => {
                let result = self.controller.refresh_sessions().await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::ClearHistory { reply } => {
                let result = self.controller.clear_history().await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::SendMessage { text, reply } => {
                let mut progress = self.progress_reporter();
                let result = if self.controller.settings().stream_replies {
                    self.controller
                        .send_message_streaming(&text, &mut progress)
                        .await
                } else {
                    self.controller.send_message(&text, &mut progress).await
                };
                self.publish();
                let _ = reply.send(result);
            }
            Command::SubmitDraft { reply } => {
                let mut progress = self.progress_reporter();
                let result = self.controller.submit_draft(&mut progress).await;
                self.publish();
                let _ = reply.send(result);
            }
            Command::EditDraft { edit, reply } => {
                let result = self.apply_edit(edit);
                self.publish();
                let _ = reply.send(result);
            }
        }
    }

    fn apply_edit(&mut self, edit: DraftEdit) -> Result<(), ComposerError> {
        match edit {
            DraftEdit::SetText(text) => {
                self.controller.set_draft(text);
                Ok(())
            }
            DraftEdit::Append(text) => {
                self.controller.append_draft(&text);
                Ok(())
            }
            DraftEdit::SelectTool(identifier) => self.controller.select_tool(&identifier),
            DraftEdit::RemoveTool(identifier) => self.controller.remove_tool(&identifier),
            DraftEdit::ToggleTool(identifier) => self.controller.toggle_tool(&identifier),
            DraftEdit::ApplyGroup(label) => self.controller.apply_group(&label),
            DraftEdit::SetMode(mode) => {
                self.controller.set_mode(mode);
                Ok(())
            }
        }
    }

    /// Forwards send progress to subscribers
    fn progress_reporter(&self) -> impl FnMut(SendProgress<'_>) + Send + 'static {
        let updates = self.updates.clone();
        let transformer: MentionTransformer = self.controller.composer().transformer().clone();
        move |progress: SendProgress<'_>| {
            let update = match progress {
                SendProgress::Started(message) => ViewUpdate::Sending {
                    message: pending_view(&transformer, message),
                },
                SendProgress::Partial(text) => ViewUpdate::Partial {
                    text: text.to_string(),
                },
            };
            let _ = updates.send(update);
        }
    }

    fn snapshot(&self) -> Arc<ViewSnapshot> {
        Arc::new(ViewSnapshot::capture(&self.controller))
    }

    fn publish(&self) {
        let _ = self.updates.send(ViewUpdate::Snapshot(self.snapshot()));
    }
}

fn pending_view(transformer: &MentionTransformer, message: &Message) -> MessageView {
    MessageView {
        role: message.role,
        content: transformer.to_display(&message.content),
        timestamp: message.timestamp,
        tool_badges: Vec::new(),
    }
}

/// Cloneable access to a running [`ChatRuntime`]
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<ViewUpdate>,
}

impl RuntimeHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ViewUpdate> {
        self.updates.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Run the startup sequence
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Initialize { reply }).await
    }

    pub async fn snapshot(&self) -> Result<Arc<ViewSnapshot>, RuntimeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn create_session(&self) -> Result<Session, RuntimeError> {
        Ok(self
            .request(|reply| Command::CreateSession { reply })
            .await??)
    }

    pub async fn select_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let session_id = session_id.to_string();
        Ok(self
            .request(|reply| Command::SelectSession { session_id, reply })
            .await??)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), RuntimeError> {
        let session_id = session_id.to_string();
        Ok(self
            .request(|reply| Command::DeleteSession { session_id, reply })
            .await??)
    }

    pub async fn refresh_sessions(&self) -> Result<(), RuntimeError> {
        Ok(self
            .request(|reply| Command::RefreshSessions { reply })
            .await??)
    }

    pub async fn clear_history(&self) -> Result<(), RuntimeError> {
        Ok(self
            .request(|reply| Command::ClearHistory { reply })
            .await??)
    }

    /// Send already-encoded text
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, RuntimeError> {
        let text = text.to_string();
        Ok(self
            .request(|reply| Command::SendMessage { text, reply })
            .await??)
    }

    /// Encode and send the current draft
    pub async fn submit_draft(&self) -> Result<SendOutcome, RuntimeError> {
        Ok(self
            .request(|reply| Command::SubmitDraft { reply })
            .await??)
    }

    pub async fn edit_draft(&self, edit: DraftEdit) -> Result<(), RuntimeError> {
        Ok(self
            .request(|reply| Command::EditDraft { edit, reply })
            .await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{MockApi, MockOp};
    use crate::api::{ChunkKind, SessionConfig, StreamChunk};
    use crate::controller::ControllerSettings;
    use crate::tools::ToolRegistry;
    use std::time::Duration;

    fn settings(stream_replies: bool) -> ControllerSettings {
        ControllerSettings {
            session: SessionConfig {
                model_name: "test-model".to_string(),
                temperature: 0.2,
                system_prompt: String::new(),
            },
            history_limit: 20,
            stream_replies,
        }
    }

    async fn start(api: &Arc<MockApi>, stream_replies: bool) -> RuntimeHandle {
        let registry = Arc::new(ToolRegistry::builtin().unwrap());
        let controller = ChatController::new(Arc::clone(api), registry, settings(stream_replies));
        let handle = ChatRuntime::spawn(controller);
        handle.initialize().await.unwrap();
        handle
    }

    fn drain(rx: &mut broadcast::Receiver<ViewUpdate>) -> Vec<ViewUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_initialize_publishes_ready_snapshot() {
        let api = Arc::new(MockApi::new().with_sessions(&["a", "b"]));
        let handle = start(&api, false).await;

        let snapshot = handle.snapshot().await.unwrap();

        assert_eq!(snapshot.phase, ControllerPhase::Idle);
        assert_eq!(snapshot.active_session_id.as_deref(), Some("a"));
        assert_eq!(snapshot.sessions.len(), 2);
        assert!(!snapshot.is_loading());
    }

    #[tokio::test]
    async fn test_overlapping_sends_are_serialized() {
        let api = Arc::new(
            MockApi::new()
                .with_sessions(&["a"])
                .with_chat_delay(Duration::from_millis(30)),
        );
        api.queue_reply("first reply", &[]);
        api.queue_reply("second reply", &[]);
        let handle = start(&api, false).await;
        let other = handle.clone();

        let (first, second) = tokio::join!(
            handle.send_message("first"),
            other.send_message("second")
        );

        assert!(matches!(first.unwrap(), SendOutcome::Delivered));
        assert!(matches!(second.unwrap(), SendOutcome::Delivered));
        let snapshot = handle.snapshot().await.unwrap();
        let contents: Vec<&str> = snapshot.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "first reply", "second", "second reply"]);
    }

    #[tokio::test]
    async fn test_submit_broadcasts_pending_message_then_snapshot() {
        let api = Arc::new(MockApi::new().with_sessions(&["a"]));
        api.queue_reply("ok", &["news_search"]);
        let handle = start(&api, false).await;
        handle
            .edit_draft(DraftEdit::SelectTool("news_search".to_string()))
            .await
            .unwrap();
        handle
            .edit_draft(DraftEdit::SetText("@News today".to_string()))
            .await
            .unwrap();
        let mut rx = handle.subscribe();

        handle.submit_draft().await.unwrap();

        let updates = drain(&mut rx);
        assert!(matches!(
            &updates[0],
            ViewUpdate::Sending { message } if message.content == "@News today"
        ));
        let Some(ViewUpdate::Snapshot(snapshot)) = updates.last() else {
            panic!("expected a final snapshot, got {updates:?}");
        };
        assert_eq!(snapshot.messages[0].content, "@News today");
        assert_eq!(snapshot.messages[1].tool_badges, ["News"]);
        assert!(snapshot.composer.text.is_empty());
        assert_eq!(
            api.sent_messages(),
            [("a".to_string(), "@news_search today".to_string())]
        );
    }

    #[tokio::test]
    async fn test_plain_send_broadcasts_pending_message() {
        let api = Arc::new(MockApi::new().with_sessions(&["a"]));
        api.queue_reply("pong", &[]);
        let handle = start(&api, false).await;
        let mut rx = handle.subscribe();

        handle.send_message("ping").await.unwrap();

        let updates = drain(&mut rx);
        assert!(matches!(
            &updates[0],
            ViewUpdate::Sending { message } if message.content == "ping"
        ));
        let Some(ViewUpdate::Snapshot(snapshot)) = updates.last() else {
            panic!("expected a final snapshot, got {updates:?}");
        };
        assert_eq!(snapshot.messages.len(), 2);
        assert_eq!(api.count(MockOp::SendChat), 1);
    }

    #[tokio::test]
    async fn test_streamed_partials_are_broadcast() {
        let api = Arc::new(MockApi::new().with_sessions(&["a"]));
        api.queue_stream(vec![
            Ok(StreamChunk::new(ChunkKind::Text, "one ")),
            Ok(StreamChunk::new(ChunkKind::Text, "two")),
            Ok(StreamChunk::new(ChunkKind::Done, "")),
        ]);
        let handle = start(&api, true).await;
        let mut rx = handle.subscribe();

        handle.send_message("count").await.unwrap();

        let partials: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|u| match u {
                ViewUpdate::Partial { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(partials, ["one ", "one two"]);
        assert_eq!(api.count(MockOp::StreamChat), 1);
    }

    #[tokio::test]
    async fn test_draft_errors_are_returned() {
        let api = Arc::new(MockApi::new().with_sessions(&["a"]));
        let handle = start(&api, false).await;

        let err = handle
            .edit_draft(DraftEdit::ApplyGroup("No Such Group".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::Composer(ComposerError::UnknownGroup(_))));
    }

    #[tokio::test]
    async fn test_controller_errors_are_returned() {
        let api = Arc::new(MockApi::new().with_sessions(&["a"]));
        let handle = start(&api, false).await;

        let err = handle.select_session("missing").await.unwrap_err();

        assert!(matches!(
            err,
            RuntimeError::Controller(ControllerError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_session_operations_round_trip() {
        let api = Arc::new(MockApi::new().with_sessions(&["a", "b"]));
        let handle = start(&api, false).await;

        let created = handle.create_session().await.unwrap();
        handle.delete_session(&created.session_id).await.unwrap();
        handle.refresh_sessions().await.unwrap();
        handle.clear_history().await.unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.active_session_id.as_deref(), Some("a"));
        assert_eq!(api.session_ids(), ["a", "b"]);
    }
}
