use std::time::Duration;

use crate::browser::AutofillBrowser;
use crate::error::Result;

pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_path: Option<String>,
    /// Default timeout for operations like `wait_for_selector` (default: 30s).
    pub default_timeout: Duration,
    pub engine: EngineConfig,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chrome_path: None,
            default_timeout: Duration::from_secs(30),
            engine: EngineConfig::default(),
        }
    }
}

pub struct BrowserBuilder {
    config: BrowserConfig,
}

impl BrowserBuilder {
    pub fn new() -> Self {
        Self {
            config: BrowserConfig::default(),
        }
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Set the default timeout for operations like `wait_for_selector`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Engine settings shared by every page opened from this browser.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn build_config(self) -> BrowserConfig {
        self.config
    }

    pub async fn build(self) -> Result<AutofillBrowser> {
        AutofillBrowser::launch(self.build_config()).await
    }
}

impl Default for BrowserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What to do when a login saved on an `https://` page is about to be filled
/// into a plain `http:` page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsecureFillPolicy {
    #[default]
    Refuse,
    Allow,
}

/// Tunables for the field indexer and the fill executor.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reported as `maxLength` when a control has no length limit.
    pub max_length_sentinel: u32,
    /// Offset from the top-left corner used for the viewability hit test.
    pub hit_test_offset: f64,
    /// Recursion cap for the backward `label-left` walk.
    pub label_walk_max_depth: usize,
    /// Delay between operations unless the script overrides it.
    pub default_operation_delay: Duration,
    pub animation_class: String,
    pub animation_duration: Duration,
    pub autosubmit_delay: Duration,
    pub insecure_fill_policy: InsecureFillPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_length_sentinel: 999,
            hit_test_offset: 3.0,
            label_walk_max_depth: 8,
            default_operation_delay: Duration::from_millis(1),
            animation_class: "webview-autofill-animated-fill".to_string(),
            animation_duration: Duration::from_millis(200),
            autosubmit_delay: Duration::from_millis(100),
            insecure_fill_policy: InsecureFillPolicy::Refuse,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn max_length_sentinel(mut self, sentinel: u32) -> Self {
        self.config.max_length_sentinel = sentinel;
        self
    }

    pub fn hit_test_offset(mut self, offset: f64) -> Self {
        self.config.hit_test_offset = offset;
        self
    }

    pub fn label_walk_max_depth(mut self, depth: usize) -> Self {
        self.config.label_walk_max_depth = depth;
        self
    }

    pub fn default_operation_delay(mut self, delay: Duration) -> Self {
        self.config.default_operation_delay = delay;
        self
    }

    pub fn animation(mut self, class: impl Into<String>, duration: Duration) -> Self {
        self.config.animation_class = class.into();
        self.config.animation_duration = duration;
        self
    }

    pub fn autosubmit_delay(mut self, delay: Duration) -> Self {
        self.config.autosubmit_delay = delay;
        self
    }

    pub fn insecure_fill_policy(mut self, policy: InsecureFillPolicy) -> Self {
        self.config.insecure_fill_policy = policy;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
