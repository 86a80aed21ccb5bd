//! Field indexer: fingerprints every fillable control on a page and
//! describes it for the credential-selection surface.

mod form;
mod label;
mod visibility;

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dom::{Document, NodeId};

pub use form::{resolve_action, FormDescriptor};
pub use label::normalize_label;
pub use visibility::{is_viewable, is_visible};

/// Input types that are never offered for filling.
const EXCLUDED_INPUT_TYPES: &[&str] = &["button", "submit", "reset", "file", "hidden", "image"];

/// What the indexer reports for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDetails {
    pub url: String,
    pub fields: Vec<FieldDescriptor>,
}

/// Options of a `<select>`, as `(normalized text, value)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectInfo {
    pub options: Vec<(Option<String>, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "opid")]
    pub fingerprint: String,
    #[serde(rename = "elementNumber")]
    pub element_index: usize,
    #[serde(rename = "htmlID")]
    pub html_id: Option<String>,
    #[serde(rename = "htmlName")]
    pub html_name: Option<String>,
    #[serde(rename = "htmlClass")]
    pub html_class: Option<String>,
    pub rel: Option<String>,
    #[serde(rename = "type")]
    pub control_type: String,
    pub value: String,
    #[serde(rename = "maxLength")]
    pub max_length: u32,
    #[serde(rename = "autoCompleteType")]
    pub autocomplete_hint: Option<String>,
    /// `None` for anything that is not a select; a select without options
    /// reports an empty list.
    #[serde(rename = "selectInfo")]
    pub select_options: Option<SelectInfo>,
    pub visible: bool,
    pub viewable: bool,
    #[serde(rename = "label-tag")]
    pub label_tag: Option<String>,
    #[serde(rename = "label-data")]
    pub label_data: Option<String>,
    #[serde(rename = "label-aria")]
    pub label_aria: Option<String>,
    pub placeholder: Option<String>,
    #[serde(rename = "label-top")]
    pub label_top: Option<String>,
    #[serde(rename = "label-right")]
    pub label_right: Option<String>,
    #[serde(rename = "label-left")]
    pub label_left: Option<String>,
    pub form: Option<Rc<FormDescriptor>>,
}

/// Scans a document for `input` and `select` controls.
///
/// Fingerprints are stored on the elements themselves, so a later fill pass
/// against the same document resolves them without holding any references.
pub struct FieldIndexer {
    config: EngineConfig,
}

impl FieldIndexer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn collect(&self, doc: &mut Document, salt: &str) -> PageDetails {
        let candidates: Vec<NodeId> = doc
            .elements()
            .into_iter()
            .filter(|node| doc.is_tag(*node, "input") || doc.is_tag(*node, "select"))
            .collect();

        for (ordinal, node) in candidates.iter().enumerate() {
            doc.set_fingerprint(*node, format!("__{salt}__{ordinal}__"));
        }

        let mut forms = form::FormRegistry::new(salt);
        let fillable: Vec<NodeId> = candidates
            .into_iter()
            .filter(|node| is_fillable(doc, *node))
            .collect();
        let fields: Vec<FieldDescriptor> = fillable
            .into_iter()
            .enumerate()
            .map(|(index, node)| self.describe(doc, node, index, &mut forms))
            .collect();

        debug!(
            url = doc.url(),
            salt,
            fields = fields.len(),
            forms = forms.len(),
            "indexed page fields"
        );

        PageDetails {
            url: doc.url().to_string(),
            fields,
        }
    }

    fn describe(
        &self,
        doc: &mut Document,
        node: NodeId,
        element_index: usize,
        forms: &mut form::FormRegistry,
    ) -> FieldDescriptor {
        let attr = |name: &str| non_empty(doc.attribute(node, name));
        let autocomplete_hint = ["x-autocompletetype", "autocompletetype", "autocomplete"]
            .iter()
            .find_map(|name| attr(*name));

        let mut field = FieldDescriptor {
            fingerprint: doc.fingerprint(node).unwrap_or_default().to_string(),
            element_index,
            html_id: attr("id"),
            html_name: attr("name"),
            html_class: attr("class"),
            rel: attr("rel"),
            control_type: doc.control_type(node).unwrap_or_default(),
            value: doc.value(node).unwrap_or_default(),
            max_length: self.max_length(doc, node),
            autocomplete_hint,
            select_options: doc.select_options(node).map(|options| SelectInfo {
                options: options
                    .into_iter()
                    .map(|(text, value)| (normalize_label(&text), value))
                    .collect(),
            }),
            visible: is_visible(doc, node),
            viewable: is_viewable(doc, node, self.config.hit_test_offset),
            label_tag: label::label_tag(doc, node),
            label_data: doc.attribute(node, "data-label").and_then(normalize_label),
            label_aria: doc.attribute(node, "aria-label").and_then(normalize_label),
            placeholder: doc.attribute(node, "placeholder").and_then(normalize_label),
            label_top: label::label_top(doc, node),
            label_right: label::label_right(doc, node),
            label_left: label::label_left(doc, node, self.config.label_walk_max_depth),
            form: None,
        };
        field.form = forms.descriptor_for(doc, node);
        field
    }

    fn max_length(&self, doc: &Document, node: NodeId) -> u32 {
        if !doc.is_tag(node, "input") {
            return self.config.max_length_sentinel;
        }
        doc.attribute(node, "maxlength")
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(self.config.max_length_sentinel)
    }
}

/// Index `doc` with the default engine configuration.
pub fn collect_page_details(doc: &mut Document, salt: &str) -> PageDetails {
    FieldIndexer::new(EngineConfig::default()).collect(doc, salt)
}

fn is_fillable(doc: &Document, node: NodeId) -> bool {
    if doc.is_tag(node, "select") {
        return true;
    }
    let control_type = doc.control_type(node).unwrap_or_default();
    !EXCLUDED_INPUT_TYPES.contains(&control_type.as_str())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
