use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::protocol;
use super::script::{Autosubmit, FillScript, Operation};
use crate::config::{EngineConfig, InsecureFillPolicy};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};

/// Where a [`FillRun`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Index of the operation executed last.
    Running(usize),
    Completed,
    Failed,
}

/// What the driver of a [`FillRun`] should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait this long, then call [`FillRun::step`] again.
    Wait(Duration),
    Finished,
}

/// Outcome of a completed fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    /// Fingerprints of every element an operation resolved, first touch first.
    #[serde(rename = "usedOpids")]
    pub touched: Vec<String>,
    #[serde(rename = "fillContextIdentifier")]
    pub fill_context_identifier: Option<String>,
    pub autosubmitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutosubmitStage {
    Pending,
    Scheduled,
    Done,
}

/// One execution of a fill script, advanced a step at a time.
///
/// The run keeps a virtual clock: every [`Step::Wait`] it hands out is
/// assumed to have elapsed when `step` is next called. Highlight classes are
/// removed against that clock, so the run behaves the same under a real
/// sleep, a paused test clock, or a live page replay.
#[derive(Debug)]
pub struct FillRun<'a> {
    script: &'a FillScript,
    config: &'a EngineConfig,
    state: RunState,
    next: usize,
    delay: Duration,
    clock: Duration,
    pending_wait: Duration,
    animations: Vec<(NodeId, Duration)>,
    autosubmit: AutosubmitStage,
    autosubmitted: bool,
    touched: Vec<String>,
}

impl<'a> FillRun<'a> {
    /// Prepare a run against `doc`, refusing to start when the login was
    /// saved on `https` but the page is plain `http`, unless the config
    /// allows it.
    pub fn start(script: &'a FillScript, config: &'a EngineConfig, doc: &Document) -> Result<Self> {
        if let Some(saved_url) = script.saved_url.as_deref() {
            if is_downgrade(saved_url, doc.url()) {
                match config.insecure_fill_policy {
                    InsecureFillPolicy::Refuse => {
                        warn!(saved_url, page_url = doc.url(), "refusing to fill insecure page");
                        return Err(Error::InsecurePage {
                            saved_url: saved_url.to_string(),
                            page_url: doc.url().to_string(),
                        });
                    }
                    InsecureFillPolicy::Allow => {
                        warn!(saved_url, page_url = doc.url(), "filling insecure page");
                    }
                }
            }
        }

        Ok(Self {
            script,
            config,
            state: RunState::Idle,
            next: 0,
            delay: script
                .delay_between_operations()
                .unwrap_or(config.default_operation_delay),
            clock: Duration::ZERO,
            pending_wait: Duration::ZERO,
            animations: Vec::new(),
            autosubmit: AutosubmitStage::Pending,
            autosubmitted: false,
            touched: Vec::new(),
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Index of the next operation to execute.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Current inter-operation delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn touched(&self) -> &[String] {
        &self.touched
    }

    /// Execute the next unit of work: an operation, the autosubmit, or
    /// the removal of expired highlights.
    pub fn step(&mut self, doc: &mut Document) -> Step {
        if matches!(self.state, RunState::Completed | RunState::Failed) {
            return Step::Finished;
        }
        self.clock += std::mem::take(&mut self.pending_wait);
        self.expire_animations(doc);

        let script = self.script;
        if let Some(operation) = script.operations.get(self.next) {
            self.state = RunState::Running(self.next);
            self.next += 1;
            self.apply(doc, operation);
            return self.wait(self.delay);
        }

        if let Some(autosubmit) = script.autosubmit.as_ref() {
            match self.autosubmit {
                AutosubmitStage::Pending => {
                    self.autosubmit = AutosubmitStage::Scheduled;
                    return self.wait(self.config.autosubmit_delay);
                }
                AutosubmitStage::Scheduled => {
                    self.autosubmit = AutosubmitStage::Done;
                    self.autosubmitted = self.submit(doc, autosubmit);
                }
                AutosubmitStage::Done => {}
            }
        }

        let remaining = self
            .animations
            .iter()
            .map(|(_, deadline)| deadline.saturating_sub(self.clock))
            .max();
        if let Some(remaining) = remaining {
            return self.wait(remaining);
        }

        self.state = RunState::Completed;
        Step::Finished
    }

    /// Carry the run over to a fresh snapshot of the same page. Pending
    /// highlights follow their element's live key; those whose element is
    /// gone are dropped.
    pub fn rebase(&mut self, previous: &Document, current: &Document) {
        self.animations = std::mem::take(&mut self.animations)
            .into_iter()
            .filter_map(|(node, deadline)| {
                let key = previous.live_key(node)?;
                Some((current.find_by_live_key(key)?, deadline))
            })
            .collect();
    }

    /// Remove fingerprints from the touched set, e.g. when the page lost the
    /// element before the change reached it.
    pub fn forget(&mut self, fingerprints: &[String]) {
        if fingerprints.is_empty() {
            return;
        }
        debug!(count = fingerprints.len(), "dropping fingerprints the page no longer has");
        self.touched.retain(|fp| !fingerprints.contains(fp));
    }

    /// Abandon the run. Highlights still on the page are removed.
    pub fn abort(&mut self, doc: &mut Document) {
        for (node, _) in std::mem::take(&mut self.animations) {
            doc.remove_class(node, &self.config.animation_class);
        }
        self.state = RunState::Failed;
    }

    pub fn into_report(self) -> FillReport {
        FillReport {
            touched: self.touched,
            fill_context_identifier: self.script.fill_context_identifier.clone(),
            autosubmitted: self.autosubmitted,
        }
    }

    fn wait(&mut self, duration: Duration) -> Step {
        self.pending_wait = duration;
        Step::Wait(duration)
    }

    fn apply(&mut self, doc: &mut Document, operation: &Operation) {
        let index = self.next - 1;
        let result = match operation {
            Operation::FillByFingerprint { fingerprint, value } => {
                self.fill_by_fingerprint(doc, fingerprint, value)
            }
            Operation::FillByQuery { selector, value } => self.fill_by_query(doc, selector, value),
            Operation::ClickByFingerprint { fingerprint } => {
                resolve(doc, fingerprint).map(|node| {
                    doc.click(node);
                    vec![fingerprint.clone()]
                })
            }
            Operation::ClickByQuery { selector } => query(doc, selector).map(|nodes| {
                for node in &nodes {
                    doc.click(*node);
                    doc.focus(*node);
                }
                fingerprints(doc, &nodes)
            }),
            Operation::TouchAllFields => protocol::touch_all_fields(doc).map(|count| {
                debug!(index, count, "touched placeholder fields");
                Vec::new()
            }),
            Operation::SetValueByQuery { selector, value } => query(doc, selector).map(|nodes| {
                let nodes: Vec<NodeId> = nodes
                    .into_iter()
                    .filter(|node| doc.has_value_property(*node))
                    .collect();
                for node in &nodes {
                    doc.set_value(*node, value);
                }
                fingerprints(doc, &nodes)
            }),
            Operation::Delay(delay) => {
                self.delay = *delay;
                Ok(Vec::new())
            }
            Operation::Unsupported { operation, .. } => {
                warn!(index, operation = operation.as_str(), "skipping unsupported fill operation");
                Ok(Vec::new())
            }
        };

        match result {
            Ok(resolved) => {
                for fingerprint in resolved {
                    if !self.touched.contains(&fingerprint) {
                        self.touched.push(fingerprint);
                    }
                }
            }
            Err(err) if err.is_recoverable() => {
                debug!(index, operation = operation.name(), error = %err, "fill operation skipped");
            }
            Err(err) => {
                warn!(index, operation = operation.name(), error = %err, "fill operation failed");
            }
        }
    }

    fn fill_by_fingerprint(&mut self, doc: &mut Document, fingerprint: &str, value: &str) -> Result<Vec<String>> {
        let node = resolve(doc, fingerprint)?;
        self.fill_element(doc, node, value);
        Ok(vec![fingerprint.to_string()])
    }

    fn fill_by_query(&mut self, doc: &mut Document, selector: &str, value: &str) -> Result<Vec<String>> {
        let nodes = query(doc, selector)?;
        for node in &nodes {
            self.fill_element(doc, *node, value);
        }
        Ok(fingerprints(doc, &nodes))
    }

    /// Set one control to `value`. Text and checkbox controls that already
    /// hold the value see no events; radios are clicked whenever truthy.
    fn fill_element(&mut self, doc: &mut Document, node: NodeId, value: &str) {
        match doc.control_type(node).as_deref() {
            Some("checkbox") => {
                let checked = protocol::is_truthy(value);
                if doc.checked(node) != checked {
                    self.change(doc, node, |doc, node| doc.set_checked(node, checked));
                }
            }
            Some("radio") => {
                if protocol::is_truthy(value) {
                    self.mark_filled(doc, node);
                    doc.click(node);
                }
            }
            _ => {
                if doc.value(node).as_deref() != Some(value) {
                    self.change(doc, node, |doc, node| doc.set_value(node, value));
                }
            }
        }
    }

    fn change(&mut self, doc: &mut Document, node: NodeId, mutate: impl FnOnce(&mut Document, NodeId)) {
        self.mark_filled(doc, node);
        protocol::before_change(doc, node);
        mutate(doc, node);
        protocol::after_change(doc, node);
        self.animate(doc, node);
    }

    fn mark_filled(&self, doc: &mut Document, node: NodeId) {
        if !self.script.options.mark_filling {
            return;
        }
        if let Some(form) = doc.form_owner(node) {
            doc.mark_form_filled(form);
        }
    }

    fn animate(&mut self, doc: &mut Document, node: NodeId) {
        if !self.script.options.animate || !protocol::should_animate(doc, node) {
            return;
        }
        let class = &self.config.animation_class;
        if doc.has_class(node, class) {
            self.animations.retain(|(n, _)| *n != node);
        } else {
            doc.add_class(node, class);
        }
        self.animations
            .push((node, self.clock + self.config.animation_duration));
    }

    fn expire_animations(&mut self, doc: &mut Document) {
        let clock = self.clock;
        let class = &self.config.animation_class;
        self.animations.retain(|(node, deadline)| {
            if *deadline <= clock {
                doc.remove_class(*node, class);
                false
            } else {
                true
            }
        });
    }

    fn submit(&self, doc: &mut Document, autosubmit: &Autosubmit) -> bool {
        let form = autosubmit
            .focus_fingerprint
            .as_deref()
            .and_then(|fingerprint| doc.find_by_fingerprint(fingerprint))
            .and_then(|field| doc.form_owner(field));
        let Some(form) = form else {
            debug!("autosubmit skipped: no form owner for focus field");
            return false;
        };

        if self.script.properties.allow_clicky_autosubmit {
            if let Some(button) = protocol::submit_control(doc, form) {
                doc.click(button);
                return true;
            }
        }
        doc.submit_form(form);
        true
    }
}

fn resolve(doc: &Document, fingerprint: &str) -> Result<NodeId> {
    doc.find_by_fingerprint(fingerprint)
        .ok_or_else(|| Error::FieldNotFound(fingerprint.to_string()))
}

fn query(doc: &Document, selector: &str) -> Result<Vec<NodeId>> {
    let nodes = doc.query_selector_all(selector)?;
    if nodes.is_empty() {
        return Err(Error::FieldNotFound(selector.to_string()));
    }
    Ok(nodes)
}

fn fingerprints(doc: &Document, nodes: &[NodeId]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|node| doc.fingerprint(*node).map(str::to_string))
        .collect()
}

fn is_downgrade(saved_url: &str, page_url: &str) -> bool {
    let scheme = |raw: &str| Url::parse(raw).map(|url| url.scheme().to_string()).ok();
    scheme(saved_url).as_deref() == Some("https") && scheme(page_url).as_deref() == Some("http")
}

/// Runs fill scripts against a document, sleeping on the tokio clock
/// between operations.
#[derive(Debug, Clone, Default)]
pub struct FillExecutor {
    config: EngineConfig,
}

impl FillExecutor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn execute(&self, doc: &mut Document, script: &FillScript) -> Result<FillReport> {
        self.run(doc, script, None).await
    }

    /// Like [`execute`](Self::execute), but checks `cancel` before every
    /// step. A cancelled run reports the index of the first operation it
    /// did not execute.
    pub async fn execute_with_cancel(
        &self,
        doc: &mut Document,
        script: &FillScript,
        cancel: Arc<AtomicBool>,
    ) -> Result<FillReport> {
        self.run(doc, script, Some(&cancel)).await
    }

    async fn run(&self, doc: &mut Document, script: &FillScript, cancel: Option<&AtomicBool>) -> Result<FillReport> {
        let mut run = FillRun::start(script, &self.config, doc)?;
        loop {
            if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                let position = run.position();
                run.abort(doc);
                info!(position, "fill cancelled");
                return Err(Error::Cancelled(position));
            }
            match run.step(doc) {
                Step::Wait(duration) => tokio::time::sleep(duration).await,
                Step::Finished => break,
            }
        }

        let report = run.into_report();
        info!(
            operations = script.operations.len(),
            touched = report.touched.len(),
            autosubmitted = report.autosubmitted,
            "fill script completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_page() -> (Document, NodeId) {
        let mut doc = Document::new("https://example.com/login");
        let body = doc.body();
        let form = doc.append_element(body, "form", &[]);
        let user = doc.append_element(form, "input", &[("type", "email")]);
        doc.set_fingerprint(user, "__t__0__".to_string());
        (doc, user)
    }

    #[test]
    fn run_waits_after_each_operation_then_drains_highlights() {
        let (mut doc, user) = login_page();
        let script = FillScript::parse(
            r#"{"script": [
                {"operation": "fill_by_opid", "parameters": ["__t__0__", "alice"]},
                {"operation": "delay", "parameters": [50]}
            ]}"#,
        )
        .unwrap();
        let config = EngineConfig::default();
        let mut run = FillRun::start(&script, &config, &doc).unwrap();
        assert_eq!(run.state(), RunState::Idle);

        assert_eq!(run.step(&mut doc), Step::Wait(Duration::from_millis(1)));
        assert_eq!(run.state(), RunState::Running(0));
        assert!(doc.has_class(user, &config.animation_class));

        assert_eq!(run.step(&mut doc), Step::Wait(Duration::from_millis(50)));
        assert_eq!(run.delay(), Duration::from_millis(50));

        // 51ms elapsed, highlight lasts 200ms.
        assert_eq!(run.step(&mut doc), Step::Wait(Duration::from_millis(149)));
        assert!(doc.has_class(user, &config.animation_class));
        assert_eq!(run.step(&mut doc), Step::Finished);
        assert!(!doc.has_class(user, &config.animation_class));
        assert_eq!(run.state(), RunState::Completed);
        assert_eq!(run.touched(), ["__t__0__".to_string()]);
    }

    #[test]
    fn downgrade_detection_compares_schemes() {
        assert!(is_downgrade("https://example.com/", "http://example.com/login"));
        assert!(!is_downgrade("https://example.com/", "https://example.com/login"));
        assert!(!is_downgrade("http://example.com/", "http://example.com/login"));
        assert!(!is_downgrade("not a url", "http://example.com/login"));
    }

    #[test]
    fn insecure_policy_controls_start() {
        let mut doc = Document::new("http://example.com/login");
        let script = FillScript {
            saved_url: Some("https://example.com/login".into()),
            ..FillScript::default()
        };

        let refuse = EngineConfig::default();
        assert!(matches!(
            FillRun::start(&script, &refuse, &doc),
            Err(Error::InsecurePage { .. })
        ));

        let allow = EngineConfig::builder()
            .insecure_fill_policy(InsecureFillPolicy::Allow)
            .build();
        let mut run = FillRun::start(&script, &allow, &doc).unwrap();
        assert_eq!(run.step(&mut doc), Step::Finished);
    }
}
