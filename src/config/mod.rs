//! Run configuration.
//!
//! Read from `~/.config/magpie/config.toml` when present (or a path given
//! with `--config`); missing fields fall back to defaults and command-line
//! flags override file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::{MagpieError, Result};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub harvest: HarvestConfig,
    pub browser: BrowserOpts,
    pub scroll: ScrollConfig,
    pub retry: RetryConfig,
    pub selectors: SelectorConfig,
}

impl Config {
    /// Load configuration from an explicit path, or the default path if it
    /// exists, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| MagpieError::Config(format!("{}: {}", path.display(), e)))
    }

    /// `~/.config/magpie/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("magpie").join("config.toml"))
    }
}

/// Knobs for the run as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Maximum reviews to collect per target; `None` means exhaust the page.
    pub max_reviews: Option<usize>,

    /// Number of concurrent workers, each with its own browser session.
    pub workers: usize,

    /// Index of the first target to process (resumable windowing).
    pub start_from: usize,

    /// Number of targets to process from `start_from`; `None` means all.
    pub limit: Option<usize>,

    /// Pause after navigation and panel interactions, in milliseconds.
    pub pacing_ms: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_reviews: None,
            workers: 2,
            start_from: 0,
            limit: None,
            pacing_ms: 1500,
        }
    }
}

impl HarvestConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Browser session options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOpts {
    pub headless: bool,

    /// Navigation timeout in seconds.
    pub nav_timeout_secs: u64,

    /// Skip image loading for faster page settles.
    pub block_images: bool,

    /// Accept-language the site is rendered in; drives label matching for
    /// tab/sort/expand controls.
    pub lang: String,

    pub user_agent: Option<String>,
}

impl Default for BrowserOpts {
    fn default() -> Self {
        Self {
            headless: true,
            nav_timeout_secs: 30,
            block_images: true,
            lang: "en-US".to_string(),
            user_agent: Some(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
        }
    }
}

impl BrowserOpts {
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.nav_timeout_secs)
    }
}

/// Scroll-loop tuning. The stagnation threshold and pacing are site-specific
/// empirical values, so they are knobs rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Consecutive no-growth reads before declaring the page exhausted.
    pub stagnation_threshold: u32,

    /// Hard cap on scroll attempts, the safety valve for pathological pages.
    pub max_attempts: u32,

    /// Initial wait between a scroll action and the count read, milliseconds.
    pub base_wait_ms: u64,

    /// Added to the wait on each stagnant read, to let slow loads catch up.
    pub stagnant_wait_step_ms: u64,

    /// Upper bound on the adaptive wait, milliseconds.
    pub max_wait_ms: u64,

    /// Loaded-node multiple of the requested count at which scrolling stops
    /// early. Loaded nodes exceed extractable reviews (rating-only entries
    /// carry no text), so the loop buys headroom before the extractor caps.
    pub overshoot_factor: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            stagnation_threshold: 3,
            max_attempts: 50,
            base_wait_ms: 1200,
            stagnant_wait_step_ms: 400,
            max_wait_ms: 3000,
            overshoot_factor: 1.5,
        }
    }
}

/// Retry policy applied to every fallible page interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    /// Linear backoff step between attempts, milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 800,
        }
    }
}

/// DOM selectors for the review surface. These track the target site's
/// generated class names and will need updating when the site ships a new
/// frontend build, so they live in config rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub review_node: String,
    pub scroll_container: String,
    pub rating: String,
    pub date: String,
    pub text_container: String,
    pub text_span: String,
    pub author: String,
    pub expand_button: String,
    pub original_button: String,
    /// Substrings matched against the reviews-tab button label, any locale.
    pub tab_labels: Vec<String>,
    /// Substrings matched against the newest-sort menu item, any locale.
    pub newest_labels: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            review_node: "div.jJc9Ad".to_string(),
            scroll_container: "div.m6QErb.DxyBCb".to_string(),
            rating: "span.kvMYJc".to_string(),
            date: "span.rsqaWe".to_string(),
            text_container: "div.MyEned".to_string(),
            text_span: "span.wiI7pd".to_string(),
            author: "div.d4r55".to_string(),
            expand_button: "button.w8nwRe".to_string(),
            original_button: "button.kyuRq".to_string(),
            tab_labels: vec!["Reviews".to_string(), "리뷰".to_string()],
            newest_labels: vec!["Newest".to_string(), "최신순".to_string()],
        }
    }
}
