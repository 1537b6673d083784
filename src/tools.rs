//! Research tool catalog
//!
//! Static configuration mapping backend tool identifiers to the mention
//! names users type in the composer.

mod catalog;
mod registry;

pub use catalog::{builtin_groups, builtin_tools};
pub use registry::ToolRegistry;

use serde::{Deserialize, Serialize};

/// A tool the backend can invoke on the user's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Backend name, e.g. `google_search`
    pub identifier: String,
    /// Mention token shown to the user, e.g. `Search`
    pub display_name: String,
    pub category: String,
    pub description: String,
    /// Icon name for pickers
    pub icon: String,
}

impl ToolDescriptor {
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            category: category.into(),
            description: description.into(),
            icon: String::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Named bundle of tools activated together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolGroup {
    pub label: String,
    /// Member identifiers, in activation order
    pub tools: Vec<String>,
    pub description: String,
    pub icon: String,
}

impl ToolGroup {
    pub fn new<I, S>(label: impl Into<String>, tools: I, description: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            tools: tools.into_iter().map(Into::into).collect(),
            description: description.into(),
            icon: String::new(),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}
