//! Label inference. Each heuristic stands alone and yields `None` rather
//! than failing.

use crate::dom::{escape_attribute_value, Document, NodeId};

const STRIPPED_PUNCTUATION: &[char] = &[
    '~', '`', '!', '@', '$', '%', '^', '&', '*', '(', ')', '-', '_', '+', '=', ':', ';', '\'',
    '"', '[', ']', '|', '\\', ',', '<', '.', '>', '/', '?',
];

/// Elements that end a sibling walk.
const WALK_BOUNDARIES: &[&str] = &["select", "option", "input", "form", "textarea", "iframe", "button"];

/// Lowercase, drop whitespace and common punctuation. Empty results are `None`.
pub fn normalize_label(raw: &str) -> Option<String> {
    let normalized: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace() && !STRIPPED_PUNCTUATION.contains(c))
        .collect();
    (!normalized.is_empty()).then_some(normalized)
}

/// The `<label for=…>` pointing at the field by id, then by name.
pub(crate) fn label_for(doc: &Document, field: NodeId) -> Option<NodeId> {
    ["id", "name"].iter().find_map(|attr| {
        let key = doc.attribute(field, attr).filter(|v| !v.is_empty())?;
        let selector = format!("label[for='{}']", escape_attribute_value(key));
        doc.query_selector(&selector).ok().flatten()
    })
}

pub(super) fn label_tag(doc: &Document, field: NodeId) -> Option<String> {
    if let Some(label) = label_for(doc, field) {
        return normalize_label(&doc.inner_text(label));
    }
    let mut cursor = Some(field);
    while let Some(current) = cursor.filter(|node| *node != doc.root()) {
        if doc.is_tag(current, "label") {
            return normalize_label(&doc.inner_text(current));
        }
        cursor = doc.parent(current);
    }
    None
}

/// Text of the cell directly above the field's table cell.
pub(super) fn label_top(doc: &Document, field: NodeId) -> Option<String> {
    let cell = doc.parent(field).and_then(|parent| doc.closest(parent, "td"))?;
    let row = doc.parent_element(cell).filter(|row| doc.is_tag(*row, "tr"))?;
    let previous_row = doc
        .previous_element_sibling(row)
        .filter(|row| doc.is_tag(*row, "tr"))?;
    let column = cells(doc, row).iter().position(|c| *c == cell)?;
    let above = *cells(doc, previous_row).get(column)?;
    normalize_label(&doc.inner_text(above))
}

fn cells(doc: &Document, row: NodeId) -> Vec<NodeId> {
    doc.element_children(row)
        .into_iter()
        .filter(|c| doc.is_tag(*c, "td") || doc.is_tag(*c, "th"))
        .collect()
}

pub(super) fn label_right(doc: &Document, field: NodeId) -> Option<String> {
    let mut parts = Vec::new();
    let mut cursor = field;
    while let Some(next) = doc.next_sibling(cursor) {
        if is_boundary(doc, Some(next)) {
            break;
        }
        push_text(doc, next, &mut parts);
        cursor = next;
    }
    normalize_label(&parts.concat())
}

pub(super) fn label_left(doc: &Document, field: NodeId, max_depth: usize) -> Option<String> {
    let mut parts = Vec::new();
    walk_back(doc, field, &mut parts, 0, max_depth);
    parts.reverse();
    normalize_label(&parts.concat())
}

/// Collect text walking backwards from `start`. When the siblings yield
/// nothing, climb to the closest ancestor with a preceding sibling and retry
/// from that sibling's deepest last child, at most `max_depth` times.
fn walk_back(doc: &Document, start: NodeId, parts: &mut Vec<String>, depth: usize, max_depth: usize) {
    let mut cursor = start;
    while let Some(previous) = doc.previous_sibling(cursor) {
        if is_boundary(doc, Some(previous)) {
            return;
        }
        push_text(doc, previous, parts);
        cursor = previous;
    }
    if !parts.is_empty() || depth >= max_depth {
        return;
    }

    let mut climb = cursor;
    let target = loop {
        let Some(parent) = doc.parent(climb) else {
            return;
        };
        climb = parent;
        let mut candidate = doc.previous_sibling(climb);
        while let Some(node) = candidate {
            if is_boundary(doc, Some(node)) {
                break;
            }
            match doc.last_child(node) {
                Some(last) => candidate = Some(last),
                None => break,
            }
        }
        if let Some(found) = candidate {
            break found;
        }
    };

    if is_boundary(doc, Some(target)) {
        return;
    }
    push_text(doc, target, parts);
    if parts.is_empty() {
        walk_back(doc, target, parts, depth + 1, max_depth);
    }
}

fn is_boundary(doc: &Document, node: Option<NodeId>) -> bool {
    match node {
        None => true,
        Some(node) => doc
            .tag_name(node)
            .is_some_and(|tag| WALK_BOUNDARIES.contains(&tag)),
    }
}

fn push_text(doc: &Document, node: NodeId, parts: &mut Vec<String>) {
    let text = match doc.text_data(node) {
        Some(text) => text.to_string(),
        None => doc.inner_text(node),
    };
    if let Some(text) = normalize_label(&text) {
        parts.push(text);
    }
}
