//! Application state owned by the controller

use crate::api::{Message, Session};
use serde::Serialize;

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Startup sequence has not finished
    #[default]
    Initializing,
    /// Ready, no send in flight
    Idle,
    /// Ready, a send is in flight
    Sending,
}

/// Sessions, the active conversation, and lifecycle flags
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    /// Newest first
    pub sessions: Vec<Session>,
    /// `None` only while initializing, or after startup failed
    pub active_session_id: Option<String>,
    /// History of the active session, append-only between loads
    pub messages: Vec<Message>,
    pub phase: ControllerPhase,
}

impl AppState {
    pub fn is_loading(&self) -> bool {
        self.phase == ControllerPhase::Sending
    }

    pub fn is_initializing(&self) -> bool {
        self.phase == ControllerPhase::Initializing
    }

    pub fn active_session(&self) -> Option<&Session> {
        let id = self.active_session_id.as_deref()?;
        self.session(id)
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    pub(crate) fn session_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.session_id == session_id)
    }

    /// Make a freshly created session the active one with an empty history
    pub(crate) fn activate_new(&mut self, session: Session) {
        self.active_session_id = Some(session.session_id.clone());
        self.sessions.insert(0, session);
        self.messages.clear();
    }

    /// Drop a session from the list; returns whether it was present
    pub(crate) fn remove_session(&mut self, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.session_id != session_id);
        self.sessions.len() != before
    }

    pub(crate) fn is_active(&self, session_id: &str) -> bool {
        self.active_session_id.as_deref() == Some(session_id)
    }
}
