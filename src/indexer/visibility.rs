use crate::dom::{Document, NodeId};

use super::label::label_for;

/// The element and all of its ancestors are displayed and not hidden.
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    if !doc.is_connected(node) {
        return false;
    }
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if doc
            .style(current)
            .is_some_and(|style| style.is_display_none() || style.is_hidden())
        {
            return false;
        }
        cursor = doc.parent_element(current);
    }
    true
}

/// Visible and, when inside the viewport, not covered by another element at
/// `offset` pixels in from its top-left corner.
pub fn is_viewable(doc: &Document, node: NodeId, offset: f64) -> bool {
    if !is_visible(doc, node) {
        return false;
    }

    let rect = doc.rect(node).unwrap_or_default();
    let viewport = doc.viewport();
    let (client_left, client_top) = doc.client_offset();
    let left = rect.x - client_left;
    let top = rect.y - client_top;
    if left < 0.0 || left > viewport.width || top < 0.0 || top > viewport.height {
        // Scrolled out of view: nothing to hit-test against.
        return true;
    }

    let Some(hit) = doc.element_from_point(left + offset, top + offset) else {
        return false;
    };
    if hit == node {
        return true;
    }
    if doc.is_tag(hit, "label") {
        return label_for(doc, node) == Some(hit);
    }
    doc.tag_name(hit) == doc.tag_name(node)
}
