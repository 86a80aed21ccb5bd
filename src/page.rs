use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::page::Page as CrPage;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::dom::{Document, DocumentSnapshot, Mutation};
use crate::error::{Error, Result};
use crate::fill::{FillReport, FillResponse, FillRun, FillScript, Step};
use crate::indexer::{FieldIndexer, PageDetails};

/// Serializes the live DOM into a [`DocumentSnapshot`]. Every element gets a
/// stable `__webfillKey` so later mutations can find it again.
const SNAPSHOT_JS: &str = r#"
    (() => {
        let next = window.__webfillNextKey || 1;
        const walk = (el) => {
            if (el.__webfillKey === undefined) el.__webfillKey = next++;
            const style = window.getComputedStyle(el);
            const rect = el.getBoundingClientRect();
            const attributes = {};
            for (const attr of el.attributes) attributes[attr.name] = attr.value;
            const children = [];
            for (const child of el.childNodes) {
                if (child.nodeType === Node.ELEMENT_NODE) {
                    children.push(Object.assign({ nodeType: 'element' }, walk(child)));
                } else if (child.nodeType === Node.TEXT_NODE) {
                    children.push({ nodeType: 'text', text: child.data });
                }
            }
            return {
                tag: el.tagName.toLowerCase(),
                attributes,
                value: typeof el.value === 'string' ? el.value : null,
                checked: !!el.checked,
                selected: !!el.selected,
                style: {
                    display: style.display,
                    visibility: style.visibility,
                    zIndex: parseInt(style.zIndex, 10) || 0,
                },
                rect: { x: rect.left, y: rect.top, width: rect.width, height: rect.height },
                key: el.__webfillKey,
                fingerprint: el.__webfillFingerprint || null,
                filled: !!el.__webfillFilled,
                children,
            };
        };
        const html = document.documentElement;
        const root = walk(html);
        root.rect = { x: 0, y: 0, width: html.clientWidth, height: html.clientHeight };
        window.__webfillNextKey = next;
        return JSON.stringify({
            url: document.baseURI,
            clientLeft: html.clientLeft,
            clientTop: html.clientTop,
            root,
        });
    })()
"#;

/// Applies a batch of [`ReplayOp`]s to the live elements they are keyed by and
/// returns the keys that no longer match an element.
const REPLAY_JS: &str = r#"
    (ops) => {
        const byKey = new Map();
        for (const el of document.querySelectorAll('*')) {
            if (el.__webfillKey !== undefined) byKey.set(el.__webfillKey, el);
        }
        const fire = (el, type) => {
            switch (type) {
                case 'click': el.click(); break;
                case 'focus': el.focus(); break;
                case 'blur': el.blur(); break;
                case 'keydown':
                case 'keyup':
                case 'keypress':
                    el.dispatchEvent(new KeyboardEvent(type, { bubbles: true, cancelable: true }));
                    break;
                default:
                    el.dispatchEvent(new Event(type, { bubbles: true, cancelable: true }));
            }
        };
        const missing = [];
        for (const op of ops) {
            const el = byKey.get(op.key);
            if (!el) {
                if (!missing.includes(op.key)) missing.push(op.key);
                continue;
            }
            switch (op.op) {
                case 'fingerprint': el.__webfillFingerprint = op.fingerprint; break;
                case 'value': el.value = op.value; break;
                case 'checked': el.checked = op.checked; break;
                case 'addClass': el.classList.add(op.class); break;
                case 'removeClass': el.classList.remove(op.class); break;
                case 'markFilled': el.__webfillFilled = true; break;
                case 'submit':
                    if (typeof el.requestSubmit === 'function') el.requestSubmit();
                    else el.submit();
                    break;
                case 'event': fire(el, op.event); break;
            }
        }
        return JSON.stringify(missing);
    }
"#;

/// One journaled mutation, addressed by the element's live key.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum ReplayOp<'a> {
    Fingerprint { key: u64, fingerprint: &'a str },
    Value { key: u64, value: &'a str },
    Checked { key: u64, checked: bool },
    AddClass { key: u64, class: &'a str },
    RemoveClass { key: u64, class: &'a str },
    MarkFilled { key: u64 },
    Submit { key: u64 },
    Event { key: u64, event: &'static str },
}

impl<'a> ReplayOp<'a> {
    fn from_mutation(doc: &Document, mutation: &'a Mutation) -> Option<Self> {
        let key = doc.live_key(mutation.node())?;
        Some(match mutation {
            Mutation::Fingerprint { fingerprint, .. } => ReplayOp::Fingerprint { key, fingerprint },
            Mutation::Value { value, .. } => ReplayOp::Value { key, value },
            Mutation::Checked { checked, .. } => ReplayOp::Checked { key, checked: *checked },
            Mutation::ClassAdded { class, .. } => ReplayOp::AddClass { key, class },
            Mutation::ClassRemoved { class, .. } => ReplayOp::RemoveClass { key, class },
            Mutation::FormFilled { .. } => ReplayOp::MarkFilled { key },
            Mutation::Submitted { .. } => ReplayOp::Submit { key },
            Mutation::Event { kind, .. } => ReplayOp::Event {
                key,
                event: kind.as_str(),
            },
        })
    }
}

/// A browser tab the indexer and executor can run against.
///
/// Each pass snapshots the live DOM, runs the engine on the snapshot and
/// replays the resulting journal back onto the page. Fingerprints written by
/// [`collect_page_details`](Self::collect_page_details) live on the page's
/// elements, so a later [`fill`](Self::fill) resolves them from a fresh
/// snapshot.
pub struct Page {
    inner: CrPage,
    default_timeout: Duration,
    engine: EngineConfig,
}

impl Page {
    pub(crate) fn new(inner: CrPage, default_timeout: Duration, engine: EngineConfig) -> Self {
        Self {
            inner,
            default_timeout,
            engine,
        }
    }

    /// Returns a reference to the underlying chromiumoxide Page.
    pub fn inner(&self) -> &CrPage {
        &self.inner
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Navigate to the given URL and wait for the page to load.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(())
    }

    /// Get the current page URL.
    pub async fn url(&self) -> Result<String> {
        self.inner
            .url()
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?
            .ok_or_else(|| Error::NavigationError("No URL found".into()))
    }

    /// Wait for an element matching the given CSS selector to appear in the DOM.
    /// Polls every 100ms up to the configured default timeout.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        let timeout = self.default_timeout;
        let interval = Duration::from_millis(100);
        let start = std::time::Instant::now();

        loop {
            match self.inner.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(_) if start.elapsed() < timeout => {
                    tokio::time::sleep(interval).await;
                }
                Err(_) => {
                    return Err(Error::Timeout(format!(
                        "Timed out waiting for selector: {}",
                        selector
                    )));
                }
            }
        }
    }

    /// Evaluate a JavaScript expression and return the result as a string.
    pub async fn evaluate(&self, expression: &str) -> Result<String> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| Error::ScriptEvaluationFailed(e.to_string()))?;
        match result.value() {
            Some(val) => Ok(val.to_string()),
            None => Ok(String::new()),
        }
    }

    // ── Autofill ────────────────────────────────────────────────────

    /// Capture the live DOM as an in-memory [`Document`].
    pub async fn snapshot(&self) -> Result<Document> {
        let result = self
            .inner
            .evaluate(SNAPSHOT_JS)
            .await
            .map_err(|e| Error::ScriptEvaluationFailed(e.to_string()))?;
        let json_str: String = result
            .into_value()
            .map_err(|e| Error::Snapshot(e.to_string()))?;
        let snapshot: DocumentSnapshot =
            serde_json::from_str(&json_str).map_err(|e| Error::Snapshot(e.to_string()))?;
        Ok(Document::from_snapshot(&snapshot))
    }

    /// Fingerprint and describe every fillable field on the page.
    pub async fn collect_page_details(&self, salt: &str) -> Result<PageDetails> {
        let mut doc = self.snapshot().await?;
        let details = FieldIndexer::new(self.engine.clone()).collect(&mut doc, salt);
        self.replay(&mut doc).await?;
        info!(url = %details.url, fields = details.fields.len(), "collected page details");
        Ok(details)
    }

    /// Run `script` against the page, replaying each step live and honouring
    /// the script's delays between operations.
    pub async fn fill(&self, script: &FillScript) -> Result<FillReport> {
        self.drive(script, None).await
    }

    /// Like [`fill`](Self::fill), stopping before the next step once
    /// `cancel` is set.
    pub async fn fill_with_cancel(&self, script: &FillScript, cancel: Arc<AtomicBool>) -> Result<FillReport> {
        self.drive(script, Some(&cancel)).await
    }

    /// String-in, string-out entry point for a serialized fill script.
    pub async fn execute_fill_script(&self, payload: &str) -> FillResponse {
        let result = match FillScript::parse(payload) {
            Ok(script) => self.fill(&script).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(_) => FillResponse::ok(),
            Err(err) => FillResponse::failure(err.to_string()),
        }
    }

    /// Each step runs on a fresh snapshot, so fingerprints resolve against
    /// whatever the page rendered after the previous step.
    async fn drive(&self, script: &FillScript, cancel: Option<&AtomicBool>) -> Result<FillReport> {
        let mut doc = self.snapshot().await?;
        let mut run = FillRun::start(script, &self.engine, &doc)?;
        let mut fresh = true;
        loop {
            if !fresh {
                let current = self.snapshot().await?;
                run.rebase(&doc, &current);
                doc = current;
            }
            fresh = false;

            if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                let position = run.position();
                run.abort(&mut doc);
                self.replay(&mut doc).await?;
                info!(position, "fill cancelled");
                return Err(Error::Cancelled(position));
            }

            let before = run.touched().len();
            let step = run.step(&mut doc);
            let missing = self.replay(&mut doc).await?;
            let lost = lost_fingerprints(&doc, &run.touched()[before..], &missing);
            run.forget(&lost);

            match step {
                Step::Wait(duration) => tokio::time::sleep(duration).await,
                Step::Finished => break,
            }
        }
        Ok(run.into_report())
    }

    /// Push the document's pending journal onto the live page. Returns the
    /// live keys the page could not find.
    async fn replay(&self, doc: &mut Document) -> Result<Vec<u64>> {
        let journal = doc.take_journal();
        if journal.is_empty() {
            return Ok(Vec::new());
        }
        let doc = &*doc;
        let ops: Vec<ReplayOp> = journal
            .iter()
            .filter_map(|mutation| ReplayOp::from_mutation(doc, mutation))
            .collect();
        if ops.len() < journal.len() {
            debug!(
                dropped = journal.len() - ops.len(),
                "mutations without a live element were not replayed"
            );
        }
        let ops_json =
            serde_json::to_string(&ops).map_err(|e| Error::ScriptEvaluationFailed(e.to_string()))?;
        let js = format!("({})({})", REPLAY_JS.trim(), ops_json);
        let result = self
            .inner
            .evaluate(js)
            .await
            .map_err(|e| Error::ScriptEvaluationFailed(e.to_string()))?;
        let json_str: String = result
            .into_value()
            .map_err(|e| Error::ScriptEvaluationFailed(e.to_string()))?;
        let missing: Vec<u64> =
            serde_json::from_str(&json_str).map_err(|e| Error::ScriptEvaluationFailed(e.to_string()))?;
        if !missing.is_empty() {
            debug!(missing = missing.len(), "replay targets left the page");
        }
        Ok(missing)
    }
}

/// Fingerprints among `touched` whose element's live key is in `missing`.
fn lost_fingerprints(doc: &Document, touched: &[String], missing: &[u64]) -> Vec<String> {
    if missing.is_empty() {
        return Vec::new();
    }
    touched
        .iter()
        .filter(|fingerprint| {
            doc.find_by_fingerprint(fingerprint)
                .and_then(|node| doc.live_key(node))
                .is_some_and(|key| missing.contains(&key))
        })
        .cloned()
        .collect()
}
