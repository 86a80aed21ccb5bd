//! Serializable DOM snapshots, as produced by a live page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ComputedStyle, Document, Element, NodeId, NodeKind, Rect};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    /// `document.baseURI`
    pub url: String,
    #[serde(default)]
    pub client_left: f64,
    #[serde(default)]
    pub client_top: f64,
    pub root: ElementSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "lowercase")]
pub enum NodeSnapshot {
    Element(ElementSnapshot),
    Text { text: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Live `value` property; falls back to the `value` attribute.
    pub value: Option<String>,
    pub checked: bool,
    pub selected: bool,
    pub style: ComputedStyle,
    pub rect: Option<Rect>,
    /// Page-side identity used to replay mutations onto the live element.
    pub key: Option<u64>,
    pub fingerprint: Option<String>,
    pub filled: bool,
    pub children: Vec<NodeSnapshot>,
}

impl Document {
    pub fn from_snapshot(snapshot: &DocumentSnapshot) -> Self {
        let mut doc = Document::bare(snapshot.url.clone());
        doc.client_left = snapshot.client_left;
        doc.client_top = snapshot.client_top;

        let root = doc.root;
        let html = doc.insert_snapshot(root, &snapshot.root);
        doc.document_element = html;
        doc.body = doc
            .element_children(html)
            .into_iter()
            .find(|child| doc.is_tag(*child, "body"))
            .unwrap_or(html);
        doc
    }

    fn insert_snapshot(&mut self, parent: NodeId, snapshot: &ElementSnapshot) -> NodeId {
        let attrs = snapshot
            .attributes
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        let mut element = Element::new(&snapshot.tag, attrs);
        if let Some(value) = &snapshot.value {
            element.value = value.clone();
        }
        element.checked = snapshot.checked;
        element.selected = snapshot.selected;
        element.style = snapshot.style.clone();
        element.rect = snapshot.rect;
        element.live_key = snapshot.key;
        element.fingerprint = snapshot.fingerprint.clone();
        element.filled = snapshot.filled;

        let node = self.create_node(Some(parent), NodeKind::Element(Box::new(element)));
        for child in &snapshot.children {
            match child {
                NodeSnapshot::Element(child) => {
                    self.insert_snapshot(node, child);
                }
                NodeSnapshot::Text { text } => {
                    self.append_text(node, text);
                }
            }
        }
        // A live single select only reports no selected option after a
        // script assigned a value none of its options carry.
        if self.is_tag(node, "select") && self.attribute(node, "multiple").is_none() {
            let options = self.options(node);
            let none_selected = !options
                .iter()
                .any(|o| self.element(*o).is_some_and(|e| e.selected));
            if !options.is_empty() && none_selected {
                if let Some(element) = self.element_mut(node) {
                    element.selection_cleared = true;
                }
            }
        }
        node
    }
}
