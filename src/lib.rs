//! # Magpie
//!
//! A concurrent review harvester for dynamically-loaded, infinite-scroll
//! place pages.
//!
//! ## Architecture
//!
//! Magpie follows a pipeline architecture fanned out across workers:
//!
//! ```text
//! Discovery → Coordinator → Worker (Session → Driver → Scroll → Extract) → Store
//! ```
//!
//! - [`discovery`]: Reads the target list produced by the upstream search
//!   collaborator
//! - [`session`]: Headless Chrome sessions via chromiumoxide, one per worker
//! - [`harvest`]: The per-target engine: page-state driver, scroll
//!   controller, deduplicating extractor, retry wrapper
//! - [`worker`]: Shard processing and the coordinator that merges results
//! - [`store`]: Per-target JSON artifacts plus the run log
//!
//! ## Quick Start
//!
//! ```bash
//! # Collect up to 50 reviews per target with four browsers
//! magpie harvest targets.json -o reviews -m 50 -w 4
//!
//! # Inspect the discovery file
//! magpie targets targets.json
//!
//! # Summarize a finished (or interrupted) run
//! magpie report reviews
//! ```
//!
//! Re-running `harvest` with the same output directory resumes: targets with
//! an existing artifact are skipped.

/// Error types shared across the crate.
pub mod app;

/// Command-line interface using clap.
///
/// Defines the CLI structure and subcommands:
/// - `harvest <input>` - Collect reviews for every target
/// - `targets <input>` - List targets without harvesting
/// - `report <dir>` - Summarize a previous run
pub mod cli;

/// Run configuration.
///
/// Loads from `~/.config/magpie/config.toml` (or `--config`), supporting
/// harvest limits, browser options, scroll tuning, retry policy, and the
/// DOM selectors for the review surface. Command-line flags override file
/// values.
pub mod config;

/// Target discovery boundary: loads the JSON target list the upstream
/// search collaborator produced.
pub mod discovery;

/// Core domain models.
///
/// - [`TargetRecord`](domain::TargetRecord): one scrape subject
/// - [`ReviewRecord`](domain::ReviewRecord): a review with its SHA256
///   fingerprint
/// - [`TargetResult`](domain::TargetResult) / [`CollectionLog`](domain::CollectionLog):
///   per-target and run-level outcomes
pub mod domain;

/// The per-target harvesting engine.
///
/// - [`PageDriver`](harvest::PageDriver): state machine from navigation to
///   extraction
/// - [`ScrollController`](harvest::ScrollController): termination decisions
///   for the scroll loop
/// - [`ReviewExtractor`](harvest::ReviewExtractor): in-page scripts and
///   fingerprint deduplication
/// - [`RetryPolicy`](harvest::RetryPolicy): bounded retry with linear
///   backoff
pub mod harvest;

/// Browser session ownership.
///
/// - [`Session`](session::Session): async trait over navigation and
///   in-page execution
/// - [`ChromeSession`](session::ChromeSession): chromiumoxide-backed
///   implementation, one Chrome process per worker
pub mod session;

/// Persistence for artifacts and the run log.
///
/// - [`Store`](store::Store): trait defining storage operations
/// - [`JsonStore`](store::JsonStore): one JSON file per target id
pub mod store;

/// Worker pool and coordination.
///
/// - [`Worker`](worker::Worker): processes one disjoint shard sequentially
/// - [`Coordinator`](worker::Coordinator): partitions targets, spawns
///   workers, merges results
pub mod worker;
