//! Browser session ownership and navigation primitives.
//!
//! One [`ChromeSession`] wraps one OS-level Chrome process plus a single
//! reused page. A session is exclusively owned by the worker that opened it
//! and is never shared or handed off. Extraction and scrolling go through
//! [`Session::evaluate`] so page logic runs in-page instead of through
//! slower simulated-interaction APIs.

mod chrome;
#[cfg(test)]
pub mod fake;

pub use chrome::{ChromeSession, SessionManager};

use async_trait::async_trait;
use serde_json::Value;

use crate::app::Result;

/// Navigation and in-page execution primitives the harvesting engine needs.
///
/// The trait seam exists so the page driver and scroll loop can run against
/// a scripted fake in tests, without a browser.
#[async_trait]
pub trait Session: Send + Sync {
    /// Navigate the session's page to a URL and wait for it to settle.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Whether the underlying browser process still responds. Workers use
    /// this to detect a crashed session and replace it instead of hanging.
    async fn is_alive(&self) -> bool;

    /// Release the underlying browser process.
    async fn close(&mut self) -> Result<()>;
}
