use chromiumoxide::browser::{Browser as CrBrowser, BrowserConfig as CrBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tracing::{debug, info};

use crate::config::{BrowserBuilder, BrowserConfig, EngineConfig};
use crate::error::{Error, Result};
use crate::page::Page;

/// Chrome flags that improve performance without affecting functionality.
const PERF_ARGS: &[&str] = &[
    "disable-gpu",
    "disable-extensions",
    "metrics-recording-only",
    "mute-audio",
    "no-default-browser-check",
    "disable-client-side-phishing-detection",
    "disable-popup-blocking",
    "disable-prompt-on-repost",
];

/// A Chrome instance hosting pages to index and fill.
pub struct AutofillBrowser {
    browser: CrBrowser,
    default_timeout: std::time::Duration,
    engine: EngineConfig,
    _handler_task: tokio::task::JoinHandle<()>,
}

impl AutofillBrowser {
    /// Create a new BrowserBuilder for configuring and launching a browser.
    pub fn builder() -> BrowserBuilder {
        BrowserBuilder::new()
    }

    /// Launch a browser instance with the given configuration.
    pub async fn launch(config: BrowserConfig) -> Result<Self> {
        let mut builder = CrBrowserConfig::builder();

        if config.headless {
            builder = builder.new_headless_mode().no_sandbox();
        } else {
            builder = builder.with_head().no_sandbox();
        }

        for arg in PERF_ARGS {
            builder = builder.arg(*arg);
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder = builder.viewport(Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: false,
            has_touch: false,
        });

        let cr_config = builder
            .build()
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let (browser, mut handler) = CrBrowser::launch(cr_config)
            .await
            .map_err(|e| Error::LaunchError(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "browser handler event failed");
                }
            }
        });

        info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            default_timeout: config.default_timeout,
            engine: config.engine,
            _handler_task: handler_task,
        })
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// Open a new page (tab) navigated to the given URL.
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let cr_page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| Error::NavigationError(e.to_string()))?;
        Ok(Page::new(cr_page, self.default_timeout, self.engine.clone()))
    }

    /// Return all currently open pages (tabs).
    pub async fn pages(&self) -> Result<Vec<Page>> {
        let timeout = self.default_timeout;
        let cr_pages = self.browser.pages().await?;
        Ok(cr_pages
            .into_iter()
            .map(|p| Page::new(p, timeout, self.engine.clone()))
            .collect())
    }
}
