//! Bidirectional tool lookup
//!
//! Built once at startup and never mutated, so it can be shared freely
//! behind an `Arc`.

use super::{builtin_groups, builtin_tools, ToolDescriptor, ToolGroup};
use crate::mention::is_mention_name;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Configuration errors detected while building the registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool identifier: {0}")]
    DuplicateIdentifier(String),
    #[error("Duplicate tool display name: {0}")]
    DuplicateDisplayName(String),
    #[error("Invalid tool identifier {0:?}: must be one or more word characters")]
    InvalidIdentifier(String),
    #[error("Invalid display name {0:?}: must be one or more word characters")]
    InvalidDisplayName(String),
    #[error("Duplicate tool group label: {0}")]
    DuplicateGroup(String),
    #[error("Tool group {group:?} references unknown tool {tool:?}")]
    UnknownGroupMember { group: String, tool: String },
}

/// Registry of research tools keyed both ways
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    groups: Vec<ToolGroup>,
    /// identifier -> index into `tools`
    by_identifier: HashMap<String, usize>,
    /// display name -> index into `tools`
    by_display: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry with no groups
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        Self::with_groups(tools, Vec::new())
    }

    /// Build a registry, rejecting any identifier or display-name collision
    pub fn with_groups(
        tools: Vec<ToolDescriptor>,
        groups: Vec<ToolGroup>,
    ) -> Result<Self, RegistryError> {
        let mut by_identifier = HashMap::with_capacity(tools.len());
        let mut by_display = HashMap::with_capacity(tools.len());

        for (index, tool) in tools.iter().enumerate() {
            if !is_mention_name(&tool.identifier) {
                return Err(RegistryError::InvalidIdentifier(tool.identifier.clone()));
            }
            if !is_mention_name(&tool.display_name) {
                return Err(RegistryError::InvalidDisplayName(tool.display_name.clone()));
            }
            if by_identifier.insert(tool.identifier.clone(), index).is_some() {
                return Err(RegistryError::DuplicateIdentifier(tool.identifier.clone()));
            }
            if by_display.insert(tool.display_name.clone(), index).is_some() {
                return Err(RegistryError::DuplicateDisplayName(tool.display_name.clone()));
            }
        }

        // `group` matches labels case-insensitively
        let mut labels = HashSet::new();
        for group in &groups {
            if !labels.insert(group.label.to_ascii_lowercase()) {
                return Err(RegistryError::DuplicateGroup(group.label.clone()));
            }
            if let Some(missing) = group.tools.iter().find(|t| !by_identifier.contains_key(*t)) {
                return Err(RegistryError::UnknownGroupMember {
                    group: group.label.clone(),
                    tool: missing.clone(),
                });
            }
        }

        Ok(Self {
            tools,
            groups,
            by_identifier,
            by_display,
        })
    }

    /// The catalog shipped with the client
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::with_groups(builtin_tools(), builtin_groups())
    }

    /// Look up a tool by backend identifier
    pub fn lookup(&self, identifier: &str) -> Option<&ToolDescriptor> {
        self.by_identifier.get(identifier).map(|&i| &self.tools[i])
    }

    /// Look up a tool by its mention name
    pub fn lookup_display(&self, display_name: &str) -> Option<&ToolDescriptor> {
        self.by_display.get(display_name).map(|&i| &self.tools[i])
    }

    pub fn identifier_for(&self, display_name: &str) -> Option<&str> {
        self.lookup_display(display_name)
            .map(|t| t.identifier.as_str())
    }

    /// Display name for an identifier, falling back to the identifier itself
    /// for tools this client does not know about.
    pub fn display_name_for<'a>(&'a self, identifier: &'a str) -> &'a str {
        self.lookup(identifier)
            .map_or(identifier, |t| t.display_name.as_str())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.by_identifier.contains_key(identifier)
    }

    /// All tools in catalog order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn groups(&self) -> &[ToolGroup] {
        &self.groups
    }

    /// Find a group by label, ignoring ASCII case
    pub fn group(&self, label: &str) -> Option<&ToolGroup> {
        self.groups
            .iter()
            .find(|g| g.label.eq_ignore_ascii_case(label))
    }

    /// identifier -> display name pairs
    pub fn identifier_to_display(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tools
            .iter()
            .map(|t| (t.identifier.as_str(), t.display_name.as_str()))
    }

    /// display name -> identifier pairs
    pub fn display_to_identifier(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tools
            .iter()
            .map(|t| (t.display_name.as_str(), t.identifier.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(identifier: &str, display: &str) -> ToolDescriptor {
        ToolDescriptor::new(identifier, display, "test", "test tool")
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = ToolRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 13);
        assert_eq!(registry.groups().len(), 7);
        assert_eq!(registry.identifier_for("Search"), Some("google_search"));
        assert_eq!(registry.display_name_for("news_search"), "News");
    }

    #[test]
    fn test_lookup_both_directions() {
        let registry =
            ToolRegistry::new(vec![tool("google_search", "Search"), tool("news_search", "News")])
                .unwrap();

        let by_id = registry.lookup("news_search").unwrap();
        assert_eq!(by_id.display_name, "News");
        let by_display = registry.lookup_display("Search").unwrap();
        assert_eq!(by_display.identifier, "google_search");
        assert!(registry.lookup("Search").is_none());
        assert!(registry.lookup_display("google_search").is_none());
    }

    #[test]
    fn test_mapping_tables_are_inverse() {
        let registry = ToolRegistry::builtin().unwrap();
        assert!(!registry.is_empty());

        let forward: HashMap<&str, &str> = registry.identifier_to_display().collect();
        let backward: HashMap<&str, &str> = registry.display_to_identifier().collect();
        assert_eq!(forward.len(), registry.len());
        assert_eq!(backward.len(), registry.len());
        for (identifier, display) in forward {
            assert!(registry.contains(identifier));
            assert_eq!(backward[display], identifier);
        }
    }

    #[test]
    fn test_duplicate_display_name_rejected() {
        let err = ToolRegistry::new(vec![tool("google_search", "Search"), tool("bing", "Search")])
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateDisplayName("Search".to_string()));
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let err = ToolRegistry::new(vec![tool("google_search", "Search"), tool("google_search", "Web")])
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateIdentifier("google_search".to_string())
        );
    }

    #[test]
    fn test_display_name_must_be_mention_word() {
        let err = ToolRegistry::new(vec![tool("web", "Web Pages")]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDisplayName(_)));
    }

    #[test]
    fn test_display_name_outside_word_class_rejected() {
        // '½' is alphanumeric but not a word character
        let err = ToolRegistry::new(vec![tool("half", "Half½")]).unwrap_err();
        assert_eq!(err, RegistryError::InvalidDisplayName("Half½".to_string()));
    }

    #[test]
    fn test_identifier_must_be_mention_word() {
        let err = ToolRegistry::new(vec![tool("web-skim", "Skim")]).unwrap_err();
        assert_eq!(err, RegistryError::InvalidIdentifier("web-skim".to_string()));
    }

    #[test]
    fn test_group_labels_unique_ignoring_case() {
        let err = ToolRegistry::with_groups(
            vec![tool("google_search", "Search")],
            vec![
                ToolGroup::new("Research", ["google_search"], ""),
                ToolGroup::new("research", ["google_search"], ""),
            ],
        )
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateGroup("research".to_string()));
    }

    #[test]
    fn test_group_with_unknown_member_rejected() {
        let err = ToolRegistry::with_groups(
            vec![tool("google_search", "Search")],
            vec![ToolGroup::new("Research", ["google_search", "pubmed_search"], "")],
        )
        .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownGroupMember {
                group: "Research".to_string(),
                tool: "pubmed_search".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_identifier_displays_as_itself() {
        let registry = ToolRegistry::builtin().unwrap();
        assert_eq!(registry.display_name_for("calculator"), "calculator");
    }

    #[test]
    fn test_group_lookup_ignores_case() {
        let registry = ToolRegistry::builtin().unwrap();
        let group = registry.group("market data").unwrap();
        assert_eq!(group.tools, vec!["stock_price", "news_search"]);
    }
}
