//! Event sequences a fill replays around each mutation, so page scripts see
//! roughly what a typing user would produce.

use std::sync::OnceLock;

use regex::Regex;

use crate::dom::{Document, EventKind, NodeId};
use crate::error::Result;
use crate::indexer::is_visible;

/// Values that check a checkbox or select a radio.
const TRUTHY_TOKENS: &[&str] = &["true", "y", "1", "yes", "✓"];

/// Input types that get the fill highlight.
const ANIMATED_TYPES: &[&str] = &["email", "text", "password", "number", "tel", "url"];

pub fn is_truthy(value: &str) -> bool {
    let lowered = value.to_lowercase();
    TRUTHY_TOKENS.contains(&lowered.as_str())
}

/// Dispatched before a value changes: click, focus, then one key cycle.
pub fn before_change(doc: &mut Document, node: NodeId) {
    doc.click(node);
    doc.focus(node);
    key_cycle(doc, node);
}

/// Dispatched after a value changes.
pub fn after_change(doc: &mut Document, node: NodeId) {
    key_cycle(doc, node);
    doc.dispatch(node, EventKind::Input);
    doc.dispatch(node, EventKind::Change);
    doc.blur(node);
}

fn key_cycle(doc: &mut Document, node: NodeId) {
    doc.dispatch(node, EventKind::KeyDown);
    doc.dispatch(node, EventKind::KeyUp);
    doc.dispatch(node, EventKind::KeyPress);
}

pub fn should_animate(doc: &Document, node: NodeId) -> bool {
    is_visible(doc, node)
        && doc
            .control_type(node)
            .is_some_and(|t| ANIMATED_TYPES.contains(&t.as_str()))
}

fn secret_keywords() -> &'static Regex {
    static KEYWORDS: OnceLock<Regex> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        Regex::new(
            r"(?i)(pin|password|passwort|kennwort|passe|contraseña|senha|密码|adgangskode|hasło|wachtwoord)",
        )
        .expect("secret keyword pattern is valid")
    })
}

/// Text inputs whose current value looks like a secret placeholder
/// ("Password", "PIN", ...) get clicked so the page swaps in its real field.
pub fn touch_all_fields(doc: &mut Document) -> Result<usize> {
    let targets: Vec<NodeId> = doc
        .query_selector_all("input[type='text']")?
        .into_iter()
        .filter(|node| {
            doc.value(*node)
                .is_some_and(|value| secret_keywords().is_match(&value))
        })
        .collect();

    for node in &targets {
        before_change(doc, *node);
        doc.click(*node);
        after_change(doc, *node);
    }
    Ok(targets.len())
}

/// First submit control owned by `form`, in document order.
pub fn submit_control(doc: &Document, form: NodeId) -> Option<NodeId> {
    doc.elements().into_iter().find(|node| {
        let is_submit = match doc.tag_name(*node) {
            Some("input") => matches!(doc.control_type(*node).as_deref(), Some("submit" | "image")),
            Some("button") => doc.control_type(*node).as_deref() == Some("submit"),
            _ => false,
        };
        is_submit && doc.form_owner(*node) == Some(form)
    })
}
