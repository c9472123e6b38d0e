//! The review-harvesting engine.
//!
//! # Architecture
//!
//! ```text
//! TargetRecord → PageDriver → [navigate, open panel, sort, scroll loop]
//!                                  │ per scroll cycle
//!                                  ▼
//!                        ReviewExtractor (expand + batch extract)
//!                                  │
//!                                  ▼
//!                        ReviewAccumulator (fingerprint dedup)
//!                                  │
//!                                  ▼
//!                             TargetResult
//! ```
//!
//! The [`ScrollController`] is a pure termination predicate over loaded-node
//! counts; the [`RetryPolicy`] bounds and paces every fallible interaction
//! with an explicit retryable/fatal split.

pub mod driver;
pub mod extractor;
pub mod retry;
pub mod scroll;

pub use driver::{DriveState, PageDriver};
pub use extractor::{ReviewAccumulator, ReviewExtractor};
pub use retry::RetryPolicy;
pub use scroll::{ScrollController, ScrollDecision, ScrollEnd};
