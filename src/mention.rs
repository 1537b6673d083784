//! Tool mentions in message text
//!
//! Users refer to tools by display name (`@Search`); the backend expects
//! identifiers (`@google_search`). This module rewrites between the two and
//! keeps the composer's active tool set in step with the draft.

mod composer;
mod tokenizer;

#[cfg(test)]
mod proptests;

pub use composer::{Composer, ComposerError, ComposerState};
pub use tokenizer::{is_mention_name, strip_mentions, tokenize};

use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Tool-invocation policy for the message being composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    /// Server decides which tools to use
    #[default]
    Auto,
    /// No tools at all
    None,
    /// Exactly the tools mentioned in the draft
    Manual,
}

impl ToolMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolMode::Auto => "auto",
            ToolMode::None => "none",
            ToolMode::Manual => "manual",
        }
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ToolMode::Auto),
            "none" => Ok(ToolMode::None),
            "manual" => Ok(ToolMode::Manual),
            other => Err(format!("unknown tool mode: {other}")),
        }
    }
}

/// Rewrites mentions between display and backend syntax
#[derive(Debug, Clone)]
pub struct MentionTransformer {
    registry: Arc<ToolRegistry>,
}

impl MentionTransformer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// `@google_search` -> `@Search`. Only for replaying user-authored text.
    pub fn to_display(&self, text: &str) -> String {
        rewrite(text, |name| {
            self.registry
                .lookup(name)
                .map(|t| t.display_name.as_str())
        })
    }

    /// `@Search` -> `@google_search`; unknown `@word` tokens are left alone.
    pub fn to_backend(&self, text: &str) -> String {
        rewrite(text, |name| self.registry.identifier_for(name))
    }

    /// Identifiers of the known display mentions in `text`, deduplicated in
    /// order of first occurrence.
    pub fn extract_mentions(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for token in tokenize(text) {
            if let Some(identifier) = self.registry.identifier_for(token.name) {
                if !found.iter().any(|f| f == identifier) {
                    found.push(identifier.to_string());
                }
            }
        }
        found
    }
}

/// Rebuild `text`, replacing each mention name for which `replace` returns
/// `Some`. Tokens are located once up front so a replacement can never be
/// matched again.
fn rewrite<'r>(text: &str, replace: impl Fn(&str) -> Option<&'r str>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in tokenize(text) {
        if let Some(replacement) = replace(token.name) {
            out.push_str(text.get(cursor..token.name_start()).unwrap_or_default());
            out.push_str(replacement);
            cursor = token.end;
        }
    }
    out.push_str(text.get(cursor..).unwrap_or_default());
    out
}
