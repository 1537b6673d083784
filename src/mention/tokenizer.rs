//! Single-pass mention tokenizer

use regex::Regex;
use std::sync::LazyLock;

/// `@` followed by one or more word characters
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("mention pattern is valid"));

/// The same word class as [`MENTION`], anchored at both ends
static MENTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\w+\z").expect("mention name pattern is valid"));

/// A mention located in a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionToken<'a> {
    /// Byte offset of the `@`
    pub start: usize,
    /// Byte offset one past the last word character
    pub end: usize,
    /// The word after `@`
    pub name: &'a str,
}

impl MentionToken<'_> {
    /// Byte offset of the first character after `@`
    pub fn name_start(&self) -> usize {
        self.start + 1
    }
}

/// Whether `@name` would be matched in full by the tokenizer
pub fn is_mention_name(name: &str) -> bool {
    MENTION_NAME.is_match(name)
}

/// Locate every mention in `text`, left to right
pub fn tokenize(text: &str) -> Vec<MentionToken<'_>> {
    MENTION
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some(MentionToken {
                start: whole.start(),
                end: whole.end(),
                name: name.as_str(),
            })
        })
        .collect()
}

/// Remove every mention accepted by `matches`, together with the whitespace
/// that follows it.
pub fn strip_mentions(text: &str, matches: impl Fn(&str) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in tokenize(text) {
        if !matches(token.name) {
            continue;
        }
        out.push_str(text.get(cursor..token.start).unwrap_or_default());
        let rest = text.get(token.end..).unwrap_or_default();
        cursor = token.end + (rest.len() - rest.trim_start().len());
    }
    out.push_str(text.get(cursor..).unwrap_or_default());
    out
}
