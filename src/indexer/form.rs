use std::rc::Rc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::{Document, FormMemo, NodeId};

/// Metadata for the form that owns one or more indexed fields. All fields of
/// the same form share one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDescriptor {
    #[serde(rename = "formNumber")]
    pub form_id: usize,
    #[serde(rename = "htmlName")]
    pub html_name: Option<String>,
    #[serde(rename = "htmlID")]
    pub html_id: Option<String>,
    #[serde(rename = "htmlAction")]
    pub action: Option<String>,
    #[serde(rename = "htmlMethod")]
    pub method: Option<String>,
    #[serde(rename = "opid")]
    pub form_fingerprint: String,
}

/// Hands out form descriptors during one indexing pass.
pub(super) struct FormRegistry<'a> {
    salt: &'a str,
    assigned: usize,
}

impl<'a> FormRegistry<'a> {
    pub(super) fn new(salt: &'a str) -> Self {
        Self { salt, assigned: 0 }
    }

    pub(super) fn len(&self) -> usize {
        self.assigned
    }

    /// Descriptor of `field`'s form owner, created and memoized on the form
    /// element the first time one of its fields is seen in this pass.
    pub(super) fn descriptor_for(&mut self, doc: &mut Document, field: NodeId) -> Option<Rc<FormDescriptor>> {
        let form = doc.form_owner(field)?;
        if let Some(memo) = doc.form_memo(form).filter(|memo| memo.salt == self.salt) {
            return Some(Rc::clone(&memo.descriptor));
        }

        let form_id = self.assigned;
        self.assigned += 1;
        let form_fingerprint = format!("__form__{}__{}__", self.salt, form_id);
        let descriptor = Rc::new(FormDescriptor {
            form_id,
            html_name: doc.attribute(form, "name").map(str::to_string),
            html_id: doc.attribute(form, "id").map(str::to_string),
            action: resolve_action(doc.url(), doc.attribute(form, "action")),
            method: doc.attribute(form, "method").map(str::to_string),
            form_fingerprint: form_fingerprint.clone(),
        });
        doc.set_fingerprint(form, form_fingerprint);
        doc.set_form_memo(
            form,
            FormMemo {
                salt: self.salt.to_string(),
                descriptor: Rc::clone(&descriptor),
            },
        );
        Some(descriptor)
    }
}

/// Resolve a form `action` against the page origin. Absolute `http(s)`
/// actions pass through; anything else becomes origin-relative.
pub fn resolve_action(page_url: &str, action: Option<&str>) -> Option<String> {
    let action = action.filter(|a| !a.is_empty())?;
    if action.starts_with("http") {
        return Some(action.to_string());
    }
    let origin = match Url::parse(page_url) {
        Ok(url) if url.origin().is_tuple() => url.origin().ascii_serialization(),
        _ => return Some(action.to_string()),
    };
    if action.starts_with('/') || action.starts_with('?') {
        Some(format!("{origin}{action}"))
    } else {
        Some(format!("{origin}/{action}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_actions_against_origin() {
        let page = "https://login.example.com:8443/account/signin?next=1";
        assert_eq!(resolve_action(page, None), None);
        assert_eq!(resolve_action(page, Some("")), None);
        assert_eq!(
            resolve_action(page, Some("https://auth.example.com/post")).as_deref(),
            Some("https://auth.example.com/post")
        );
        assert_eq!(
            resolve_action(page, Some("/session")).as_deref(),
            Some("https://login.example.com:8443/session")
        );
        assert_eq!(
            resolve_action(page, Some("session")).as_deref(),
            Some("https://login.example.com:8443/session")
        );
        assert_eq!(
            resolve_action(page, Some("?step=2")).as_deref(),
            Some("https://login.example.com:8443?step=2")
        );
        assert_eq!(
            resolve_action("https://example.com/", Some("go")).as_deref(),
            Some("https://example.com/go")
        );
    }
}
