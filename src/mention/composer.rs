//! Draft message state and submission encoding

use super::{strip_mentions, MentionTransformer, ToolMode};
use crate::tools::ToolRegistry;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Prefix telling the backend not to call any tools
pub const NO_TOOLS_MARKER: &str = "[NO_TOOLS]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposerError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown tool group: {0}")]
    UnknownGroup(String),
}

/// Snapshot of an in-progress draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposerState {
    pub text: String,
    pub mode: ToolMode,
    /// Identifiers in order of first mention; always empty outside manual mode
    pub active_tools: Vec<String>,
}

/// Encoded draft ready to hand to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Text to transmit, already encoded for `mode`
    pub text: String,
    pub mode: ToolMode,
    /// Tools requested explicitly (manual mode only)
    pub tools: Vec<String>,
}

/// Owns the draft and keeps `active_tools` consistent with it
#[derive(Debug, Clone)]
pub struct Composer {
    transformer: MentionTransformer,
    state: ComposerState,
}

impl Composer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            transformer: MentionTransformer::new(registry),
            state: ComposerState::default(),
        }
    }

    pub fn state(&self) -> &ComposerState {
        &self.state
    }

    pub fn text(&self) -> &str {
        &self.state.text
    }

    pub fn mode(&self) -> ToolMode {
        self.state.mode
    }

    pub fn active_tools(&self) -> &[String] {
        &self.state.active_tools
    }

    pub fn transformer(&self) -> &MentionTransformer {
        &self.transformer
    }

    /// Replace the draft text (the user typed)
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.state.text = text.into();
        self.reconcile();
    }

    pub fn push_str(&mut self, text: &str) {
        self.state.text.push_str(text);
        self.reconcile();
    }

    /// Append a mention for `identifier` and switch to manual mode.
    pub fn apply_tool_selection(&mut self, identifier: &str) -> Result<(), ComposerError> {
        let display = self
            .transformer
            .registry()
            .lookup(identifier)
            .map(|t| t.display_name.clone())
            .ok_or_else(|| ComposerError::UnknownTool(identifier.to_string()))?;

        self.state.mode = ToolMode::Manual;
        let text = &mut self.state.text;
        if !text.is_empty() && !text.ends_with(char::is_whitespace) {
            text.push(' ');
        }
        text.push('@');
        text.push_str(&display);
        text.push(' ');

        if !self.state.active_tools.iter().any(|t| t == identifier) {
            self.state.active_tools.push(identifier.to_string());
        }
        self.reconcile();
        Ok(())
    }

    /// Strip every mention of `identifier` from the draft
    pub fn remove_tool(&mut self, identifier: &str) -> Result<(), ComposerError> {
        let display = self
            .transformer
            .registry()
            .lookup(identifier)
            .map(|t| t.display_name.clone())
            .ok_or_else(|| ComposerError::UnknownTool(identifier.to_string()))?;

        self.state.text = strip_mentions(&self.state.text, |name| name == display);
        self.state.active_tools.retain(|t| t != identifier);
        self.reconcile();
        Ok(())
    }

    /// Select the tool if inactive, remove it otherwise
    pub fn toggle_tool(&mut self, identifier: &str) -> Result<(), ComposerError> {
        if self.state.active_tools.iter().any(|t| t == identifier) {
            self.remove_tool(identifier)
        } else {
            self.apply_tool_selection(identifier)
        }
    }

    /// Activate every member of a group that is not already active
    pub fn apply_group(&mut self, label: &str) -> Result<(), ComposerError> {
        let members = self
            .transformer
            .registry()
            .group(label)
            .map(|g| g.tools.clone())
            .ok_or_else(|| ComposerError::UnknownGroup(label.to_string()))?;

        for identifier in members {
            if !self.state.active_tools.contains(&identifier) {
                self.apply_tool_selection(&identifier)?;
            }
        }
        self.state.mode = ToolMode::Manual;
        Ok(())
    }

    /// Entering auto or none strips every mention; entering manual leaves the
    /// text alone.
    pub fn set_mode(&mut self, mode: ToolMode) {
        self.state.mode = mode;
        if mode == ToolMode::Manual {
            self.reconcile();
        } else {
            self.state.text = strip_mentions(&self.state.text, |_| true);
            self.state.active_tools.clear();
        }
    }

    /// Encode the trimmed draft for sending. Returns `None` for a blank draft.
    ///
    /// The live draft is not modified beyond reconciling `active_tools`.
    pub fn prepare_submission(&mut self) -> Option<Submission> {
        self.reconcile();
        let trimmed = self.state.text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let text = match self.state.mode {
            ToolMode::Auto => trimmed.to_string(),
            ToolMode::None => {
                if trimmed.starts_with(NO_TOOLS_MARKER) {
                    trimmed.to_string()
                } else {
                    format!("{NO_TOOLS_MARKER} {trimmed}")
                }
            }
            ToolMode::Manual => self.transformer.to_backend(trimmed),
        };

        Some(Submission {
            text,
            mode: self.state.mode,
            tools: self.state.active_tools.clone(),
        })
    }

    /// Empty the draft after a successful submission. The mode is kept.
    pub fn reset(&mut self) {
        self.state.text.clear();
        self.state.active_tools.clear();
    }

    /// In manual mode the mentions in the text are the source of truth.
    fn reconcile(&mut self) {
        if self.state.mode == ToolMode::Manual {
            self.state.active_tools = self.transformer.extract_mentions(&self.state.text);
        }
    }
}
