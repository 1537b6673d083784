//! Property-based tests for mention rewriting
//!
//! - Display and backend syntax round-trip for known mentions
//! - Mention extraction is idempotent and duplicate-free
//! - Leaving manual mode never leaves a mention behind

use super::*;
use crate::tools::ToolRegistry;
use proptest::prelude::*;
use std::sync::Arc;

fn registry() -> Arc<ToolRegistry> {
    Arc::new(ToolRegistry::builtin().unwrap())
}

fn arb_identifier() -> impl Strategy<Value = String> {
    let ids: Vec<String> = registry()
        .descriptors()
        .iter()
        .map(|t| t.identifier.clone())
        .collect();
    proptest::sample::select(ids)
}

/// Plain words that can never form a mention
fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Text made of plain words and backend mentions, separated by spaces
fn arb_backend_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            arb_word(),
            arb_identifier().prop_map(|id| format!("@{id}")),
        ],
        0..12,
    )
    .prop_map(|parts| parts.join(" "))
}

fn arb_display_text() -> impl Strategy<Value = String> {
    arb_backend_text().prop_map(|text| MentionTransformer::new(registry()).to_display(&text))
}

proptest! {
    #[test]
    fn prop_backend_display_round_trip(text in arb_backend_text()) {
        let t = MentionTransformer::new(registry());
        prop_assert_eq!(t.to_backend(&t.to_display(&text)), text);
    }

    #[test]
    fn prop_display_backend_round_trip(text in arb_display_text()) {
        let t = MentionTransformer::new(registry());
        prop_assert_eq!(t.to_display(&t.to_backend(&text)), text);
    }

    #[test]
    fn prop_extract_mentions_idempotent(text in arb_display_text()) {
        let t = MentionTransformer::new(registry());
        let first = t.extract_mentions(&text);
        let second = t.extract_mentions(&text);
        prop_assert_eq!(&first, &second);

        let mut deduped = first.clone();
        deduped.sort();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), first.len());
    }

    #[test]
    fn prop_manual_active_tools_match_text(text in arb_display_text()) {
        let mut composer = Composer::new(registry());
        composer.set_mode(ToolMode::Manual);
        composer.set_text(text.clone());
        let expected = composer.transformer().extract_mentions(&text);
        prop_assert_eq!(composer.active_tools(), expected.as_slice());
    }

    #[test]
    fn prop_leaving_manual_strips_mentions(
        text in arb_display_text(),
        mode in prop_oneof![Just(ToolMode::Auto), Just(ToolMode::None)],
    ) {
        let mut composer = Composer::new(registry());
        composer.set_mode(ToolMode::Manual);
        composer.set_text(text);
        composer.set_mode(mode);
        prop_assert!(tokenize(composer.text()).is_empty());
        prop_assert!(composer.active_tools().is_empty());
    }
}
