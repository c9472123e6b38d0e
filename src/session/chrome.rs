use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::{MagpieError, Result};
use crate::config::BrowserOpts;
use crate::session::Session;

/// Factory for browser sessions. Holds the launch options; each
/// [`open`](SessionManager::open) call starts a fresh Chrome process.
#[derive(Debug, Clone)]
pub struct SessionManager {
    opts: BrowserOpts,
}

impl SessionManager {
    pub fn new(opts: BrowserOpts) -> Self {
        Self { opts }
    }

    /// Translate the session options into a launch config. Navigation and
    /// CDP requests are bounded by the configured timeout rather than the
    /// library default.
    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.opts.nav_timeout())
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--lang={}", self.opts.lang));

        if self.opts.block_images {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }

        if !self.opts.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| MagpieError::Browser(format!("Failed to build browser config: {}", e)))
    }

    /// Launch a browser and open the single page this session will reuse.
    pub async fn open(&self) -> Result<ChromeSession> {
        let browser_config = self.browser_config()?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            MagpieError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        // Drive the CDP event stream for the lifetime of the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| MagpieError::Browser(format!("Failed to create page: {}", e)))?;

        if let Some(ref ua) = self.opts.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| MagpieError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        debug!("Browser session opened");
        Ok(ChromeSession {
            browser,
            page,
            handler_task,
        })
    }
}

/// One live Chrome process with a single page, exclusively owned by one
/// worker. Memory cost is a deployment concern; sizing worker count against
/// it happens in configuration, not here.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl Session for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| MagpieError::Navigation(format!("{}: {}", url, e)))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| MagpieError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| MagpieError::Execution(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| MagpieError::Execution(format!("Failed to parse result: {:?}", e)))
    }

    async fn is_alive(&self) -> bool {
        self.page.evaluate("1 + 1").await.is_ok()
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close page: {}", e);
        }
        self.browser
            .close()
            .await
            .map_err(|e| MagpieError::Browser(format!("Failed to close browser: {}", e)))?;
        self.handler_task.abort();
        Ok(())
    }
}
