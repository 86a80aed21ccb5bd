//! In-memory document model the indexer and executor run against.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Removing a node
//! only detaches it, so ids held by callers never dangle; detached nodes are
//! simply no longer reachable from the document root. Every state change the
//! fill engine makes goes through [`Document`] and is recorded in its
//! [`Mutation`] journal so a host can replay it on a live page.

mod selector;
mod snapshot;

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::indexer::FormDescriptor;

pub use selector::{escape_attribute_value, Selector};
pub use snapshot::{DocumentSnapshot, ElementSnapshot, NodeSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Bounding client rect, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// The subset of computed style the engine looks at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub z_index: i32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            z_index: 0,
        }
    }
}

impl ComputedStyle {
    pub fn is_display_none(&self) -> bool {
        self.display.eq_ignore_ascii_case("none")
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility.eq_ignore_ascii_case("hidden")
    }
}

/// Synthetic events the fill engine dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Click,
    Focus,
    Blur,
    KeyDown,
    KeyUp,
    KeyPress,
    Input,
    Change,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::KeyPress => "keypress",
            EventKind::Input => "input",
            EventKind::Change => "change",
        }
    }
}

/// One recorded change to the document.
///
/// Side effects of a click's activation behaviour (a checkbox toggling, a
/// radio group switching) are not journaled: replaying the `Click` event on
/// a live page performs them natively.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Fingerprint { node: NodeId, fingerprint: String },
    Value { node: NodeId, value: String },
    Checked { node: NodeId, checked: bool },
    ClassAdded { node: NodeId, class: String },
    ClassRemoved { node: NodeId, class: String },
    FormFilled { form: NodeId },
    Submitted { form: NodeId },
    Event { node: NodeId, kind: EventKind },
}

impl Mutation {
    pub fn node(&self) -> NodeId {
        match self {
            Mutation::Fingerprint { node, .. }
            | Mutation::Value { node, .. }
            | Mutation::Checked { node, .. }
            | Mutation::ClassAdded { node, .. }
            | Mutation::ClassRemoved { node, .. }
            | Mutation::Event { node, .. } => *node,
            Mutation::FormFilled { form } | Mutation::Submitted { form } => *form,
        }
    }
}

/// Form descriptor memoized on a form element, keyed by the pass salt.
#[derive(Debug, Clone)]
pub(crate) struct FormMemo {
    pub salt: String,
    pub descriptor: Rc<FormDescriptor>,
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    value: String,
    checked: bool,
    selected: bool,
    /// Set on a select once a value matching no option was assigned.
    selection_cleared: bool,
    style: ComputedStyle,
    rect: Option<Rect>,
    live_key: Option<u64>,
    fingerprint: Option<String>,
    form_memo: Option<FormMemo>,
    filled: bool,
    submitted: bool,
}

impl Element {
    fn new(tag: &str, attrs: BTreeMap<String, String>) -> Self {
        let value = attrs.get("value").cloned().unwrap_or_default();
        let checked = attrs.contains_key("checked");
        let selected = attrs.contains_key("selected");
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs,
            value,
            checked,
            selected,
            selection_cleared: false,
            style: ComputedStyle::default(),
            rect: None,
            live_key: None,
            fingerprint: None,
            form_memo: None,
            filled: false,
            submitted: false,
        }
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Box<Element>),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

const INPUT_TYPES: &[&str] = &[
    "button", "checkbox", "color", "date", "datetime-local", "email", "file", "hidden", "image",
    "month", "number", "password", "radio", "range", "reset", "search", "submit", "tel", "text",
    "time", "url", "week",
];

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    document_element: NodeId,
    body: NodeId,
    url: String,
    client_left: f64,
    client_top: f64,
    active_element: Option<NodeId>,
    journal: Vec<Mutation>,
}

impl Document {
    /// Create an empty `<html><body></body></html>` document loaded from `url`.
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self::bare(url.into());
        let root = doc.root;
        let html = Element::new("html", BTreeMap::new());
        let html = doc.create_node(Some(root), NodeKind::Element(Box::new(html)));
        doc.document_element = html;
        doc.body = doc.append_element(html, "body", &[]);
        doc
    }

    fn bare(url: String) -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            document_element: NodeId(0),
            body: NodeId(0),
            url,
            client_left: 0.0,
            client_top: 0.0,
            active_element: None,
            journal: Vec::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(element) => Some(&**element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node.0)?.kind {
            NodeKind::Element(element) => Some(&mut **element),
            _ => None,
        }
    }

    // ── Building ────────────────────────────────────────────────────

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        let element = Element::new(tag, attrs);
        self.create_node(Some(parent), NodeKind::Element(Box::new(element)))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.create_node(Some(parent), NodeKind::Text(text.to_string()))
    }

    /// Detach `node` (and its subtree) from the document.
    pub fn remove(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);
        self.nodes[node.0].parent = None;
        if self
            .active_element
            .is_some_and(|active| active == node || self.is_inclusive_descendant(active, node))
        {
            self.active_element = None;
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn set_display(&mut self, node: NodeId, display: &str) {
        if let Some(element) = self.element_mut(node) {
            element.style.display = display.to_string();
        }
    }

    pub fn set_visibility(&mut self, node: NodeId, visibility: &str) {
        if let Some(element) = self.element_mut(node) {
            element.style.visibility = visibility.to_string();
        }
    }

    pub fn set_z_index(&mut self, node: NodeId, z_index: i32) {
        if let Some(element) = self.element_mut(node) {
            element.style.z_index = z_index;
        }
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(element) = self.element_mut(node) {
            element.rect = Some(rect);
        }
    }

    /// Size the viewport, which is the document element's box.
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        let html = self.document_element;
        self.set_rect(html, Rect::new(0.0, 0.0, width, height));
    }

    // ── Tree navigation ─────────────────────────────────────────────

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn document_element(&self) -> NodeId {
        self.document_element
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    /// Parent, unless it is the document node itself.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|parent| self.is_element(*parent))
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node.0).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).last().copied()
    }

    fn sibling_index(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let index = self.children(parent).iter().position(|c| *c == node)?;
        Some((parent, index))
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_index(node)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.sibling_index(node)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let mut cursor = self.previous_sibling(node);
        while let Some(sibling) = cursor {
            if self.is_element(sibling) {
                return Some(sibling);
            }
            cursor = self.previous_sibling(sibling);
        }
        None
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root || self.is_inclusive_descendant(node, self.root)
    }

    fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Nearest inclusive ancestor with the given tag.
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.is_tag(current, tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Connected elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(self.root, &mut out);
        out
    }

    fn collect_elements(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(node) {
            if self.is_element(*child) {
                out.push(*child);
                self.collect_elements(*child, out);
            }
        }
    }

    // ── Element data ────────────────────────────────────────────────

    /// Lowercase tag name, `None` for text and document nodes.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    pub fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag_name(node).is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn text_data(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Rendered text, approximating `innerText`: skips `display: none`
    /// subtrees and script/style content.
    pub fn inner_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.push_text(node, &mut out);
        out
    }

    fn push_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(element) => {
                if matches!(element.tag.as_str(), "script" | "style" | "noscript" | "template")
                    || element.style.is_display_none()
                {
                    return;
                }
                for child in &self.nodes[node.0].children {
                    self.push_text(*child, out);
                }
            }
            NodeKind::Document => {
                for child in &self.nodes[node.0].children {
                    self.push_text(*child, out);
                }
            }
        }
    }

    pub fn style(&self, node: NodeId) -> Option<&ComputedStyle> {
        self.element(node).map(|e| &e.style)
    }

    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.element(node)?.rect
    }

    /// The viewport box: the document element's rect.
    pub fn viewport(&self) -> Rect {
        self.rect(self.document_element).unwrap_or_default()
    }

    /// `clientLeft` / `clientTop` of the document element.
    pub fn client_offset(&self) -> (f64, f64) {
        (self.client_left, self.client_top)
    }

    /// Key the live page assigned to this element when it was snapshotted.
    pub fn live_key(&self, node: NodeId) -> Option<u64> {
        self.element(node)?.live_key
    }

    /// Connected element carrying the live `key`.
    pub fn find_by_live_key(&self, key: u64) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|node| self.live_key(*node) == Some(key))
    }

    /// Topmost rendered element at a viewport point, like `elementFromPoint`.
    pub fn element_from_point(&self, x: f64, y: f64) -> Option<NodeId> {
        let viewport = self.viewport();
        if x < 0.0 || y < 0.0 || x > viewport.width || y > viewport.height {
            return None;
        }
        self.elements()
            .into_iter()
            .enumerate()
            .filter(|(_, node)| self.rect(*node).is_some_and(|r| r.contains(x, y)))
            .filter(|(_, node)| self.is_rendered(*node))
            .max_by_key(|(order, node)| {
                let z = self.style(*node).map(|s| s.z_index).unwrap_or_default();
                (z, *order)
            })
            .map(|(_, node)| node)
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        if self.style(node).is_some_and(|s| s.is_hidden()) {
            return false;
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if self.style(current).is_some_and(|s| s.is_display_none()) {
                return false;
            }
            cursor = self.parent_element(current);
        }
        true
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if !self.is_element(node) || self.has_class(node, class) {
            return;
        }
        let classes = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim_end()),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes);
        self.journal.push(Mutation::ClassAdded {
            node,
            class: class.to_string(),
        });
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let classes = self
            .attribute(node, "class")
            .unwrap_or_default()
            .split_whitespace()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attribute(node, "class", &classes);
        self.journal.push(Mutation::ClassRemoved {
            node,
            class: class.to_string(),
        });
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .elements()
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect())
    }

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    // ── Form controls ───────────────────────────────────────────────

    /// The `type` property: lowercase input type (unknown → `text`),
    /// `select-one`/`select-multiple` for selects, otherwise the type attribute.
    pub fn control_type(&self, node: NodeId) -> Option<String> {
        let tag = self.tag_name(node)?;
        match tag {
            "input" => {
                let raw = self.attribute(node, "type").unwrap_or("text").to_ascii_lowercase();
                if INPUT_TYPES.contains(&raw.as_str()) {
                    Some(raw)
                } else {
                    Some("text".to_string())
                }
            }
            "select" => Some(if self.attribute(node, "multiple").is_some() {
                "select-multiple".to_string()
            } else {
                "select-one".to_string()
            }),
            "textarea" => Some("textarea".to_string()),
            "button" => Some(
                self.attribute(node, "type")
                    .map(str::to_ascii_lowercase)
                    .filter(|t| matches!(t.as_str(), "submit" | "reset" | "button"))
                    .unwrap_or_else(|| "submit".to_string()),
            ),
            _ => self.attribute(node, "type").map(str::to_ascii_lowercase),
        }
    }

    /// Elements that expose a `value` property.
    pub fn has_value_property(&self, node: NodeId) -> bool {
        matches!(
            self.tag_name(node),
            Some("input" | "select" | "textarea" | "option" | "button")
        )
    }

    pub fn value(&self, node: NodeId) -> Option<String> {
        match self.tag_name(node)? {
            "select" => Some(self.select_value(node)),
            "option" => Some(self.option_value(node)),
            "input" | "textarea" | "button" => self.element(node).map(|e| e.value.clone()),
            _ => None,
        }
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(select, &mut out);
        out.retain(|node| self.is_tag(*node, "option"));
        out
    }

    fn option_value(&self, option: NodeId) -> String {
        match self.attribute(option, "value") {
            Some(value) => value.to_string(),
            None => self.inner_text(option).split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }

    fn select_value(&self, select: NodeId) -> String {
        let options = self.options(select);
        let cleared = self.element(select).is_some_and(|e| e.selection_cleared);
        options
            .iter()
            .find(|o| self.element(**o).is_some_and(|e| e.selected))
            .or_else(|| {
                options
                    .first()
                    .filter(|_| !cleared && !self.is_tag_multiple(select))
            })
            .map(|o| self.option_value(*o))
            .unwrap_or_default()
    }

    fn is_tag_multiple(&self, select: NodeId) -> bool {
        self.attribute(select, "multiple").is_some()
    }

    /// `(text, value)` of each option; `None` when `node` is not a select.
    pub fn select_options(&self, node: NodeId) -> Option<Vec<(String, String)>> {
        if !self.is_tag(node, "select") {
            return None;
        }
        Some(
            self.options(node)
                .into_iter()
                .map(|o| (self.inner_text(o), self.option_value(o)))
                .collect(),
        )
    }

    /// Assign the `value` property and journal it. Selects pick the matching
    /// option (none selected if nothing matches).
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        match self.tag_name(node) {
            Some("select") => {
                let mut any = false;
                for option in self.options(node) {
                    let matches = self.option_value(option) == value;
                    any |= matches;
                    if let Some(element) = self.element_mut(option) {
                        element.selected = matches;
                    }
                }
                if let Some(element) = self.element_mut(node) {
                    element.selection_cleared = !any;
                }
            }
            Some("option") => self.set_attribute(node, "value", value),
            Some(_) => {
                if let Some(element) = self.element_mut(node) {
                    element.value = value.to_string();
                }
            }
            None => return,
        }
        self.journal.push(Mutation::Value {
            node,
            value: value.to_string(),
        });
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|e| e.checked)
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        element.checked = checked;
        self.journal.push(Mutation::Checked { node, checked });
    }

    /// The control's form owner: the `form` attribute target, else the
    /// nearest ancestor `<form>`.
    pub fn form_owner(&self, node: NodeId) -> Option<NodeId> {
        if let Some(form_id) = self.attribute(node, "form").filter(|id| !id.is_empty()) {
            return self
                .elements()
                .into_iter()
                .find(|n| self.is_tag(*n, "form") && self.attribute(*n, "id") == Some(form_id));
        }
        self.parent(node).and_then(|parent| self.closest(parent, "form"))
    }

    // ── Events ──────────────────────────────────────────────────────

    pub fn dispatch(&mut self, node: NodeId, kind: EventKind) {
        if self.is_element(node) {
            self.journal.push(Mutation::Event { node, kind });
        }
    }

    /// Dispatch a click and run the element's activation behaviour.
    pub fn click(&mut self, node: NodeId) {
        if !self.is_element(node) {
            return;
        }
        self.dispatch(node, EventKind::Click);
        match self.control_type(node).as_deref() {
            Some("checkbox") if self.is_tag(node, "input") => {
                if let Some(element) = self.element_mut(node) {
                    element.checked = !element.checked;
                }
            }
            Some("radio") if self.is_tag(node, "input") => self.check_radio(node),
            Some("submit" | "image") if self.is_tag(node, "input") || self.is_tag(node, "button") => {
                if let Some(form) = self.form_owner(node) {
                    if let Some(element) = self.element_mut(form) {
                        element.submitted = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn check_radio(&mut self, node: NodeId) {
        let name = self.attribute(node, "name").map(str::to_string);
        let form = self.form_owner(node);
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            let group: Vec<NodeId> = self
                .elements()
                .into_iter()
                .filter(|n| *n != node && self.is_tag(*n, "input"))
                .filter(|n| self.control_type(*n).as_deref() == Some("radio"))
                .filter(|n| self.attribute(*n, "name") == Some(name.as_str()))
                .filter(|n| self.form_owner(*n) == form)
                .collect();
            for other in group {
                if let Some(element) = self.element_mut(other) {
                    element.checked = false;
                }
            }
        }
        if let Some(element) = self.element_mut(node) {
            element.checked = true;
        }
    }

    pub fn focus(&mut self, node: NodeId) {
        if !self.is_element(node) {
            return;
        }
        self.active_element = Some(node);
        self.dispatch(node, EventKind::Focus);
    }

    pub fn blur(&mut self, node: NodeId) {
        if !self.is_element(node) {
            return;
        }
        if self.active_element == Some(node) {
            self.active_element = None;
        }
        self.dispatch(node, EventKind::Blur);
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.active_element
    }

    /// Submit a form directly, without clicking any of its buttons.
    pub fn submit_form(&mut self, form: NodeId) {
        let Some(element) = self.element_mut(form) else {
            return;
        };
        element.submitted = true;
        self.journal.push(Mutation::Submitted { form });
    }

    pub fn is_submitted(&self, form: NodeId) -> bool {
        self.element(form).is_some_and(|e| e.submitted)
    }

    // ── Autofill bookkeeping ────────────────────────────────────────

    pub fn fingerprint(&self, node: NodeId) -> Option<&str> {
        self.element(node)?.fingerprint.as_deref()
    }

    pub fn set_fingerprint(&mut self, node: NodeId, fingerprint: String) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        element.fingerprint = Some(fingerprint.clone());
        self.journal.push(Mutation::Fingerprint { node, fingerprint });
    }

    /// Resolve a fingerprint among the connected `input`/`select` elements.
    pub fn find_by_fingerprint(&self, fingerprint: &str) -> Option<NodeId> {
        if fingerprint.is_empty() {
            return None;
        }
        self.elements().into_iter().find(|node| {
            (self.is_tag(*node, "input") || self.is_tag(*node, "select"))
                && self.fingerprint(*node) == Some(fingerprint)
        })
    }

    pub fn is_form_filled(&self, form: NodeId) -> bool {
        self.element(form).is_some_and(|e| e.filled)
    }

    /// Flag the form as auto-filled. Idempotent.
    pub fn mark_form_filled(&mut self, form: NodeId) {
        let Some(element) = self.element_mut(form) else {
            return;
        };
        if element.filled {
            return;
        }
        element.filled = true;
        self.journal.push(Mutation::FormFilled { form });
    }

    pub(crate) fn form_memo(&self, form: NodeId) -> Option<&FormMemo> {
        self.element(form)?.form_memo.as_ref()
    }

    pub(crate) fn set_form_memo(&mut self, form: NodeId, memo: FormMemo) {
        if let Some(element) = self.element_mut(form) {
            element.form_memo = Some(memo);
        }
    }

    // ── Journal ─────────────────────────────────────────────────────

    pub fn journal(&self) -> &[Mutation] {
        &self.journal
    }

    pub fn take_journal(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }

    /// Events dispatched on `node`, in order.
    pub fn events_for(&self, node: NodeId) -> Vec<EventKind> {
        self.journal
            .iter()
            .filter_map(|m| match m {
                Mutation::Event { node: n, kind } if *n == node => Some(*kind),
                _ => None,
            })
            .collect()
    }
}
