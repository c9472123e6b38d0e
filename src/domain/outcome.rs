use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{MagpieError, Result};
use crate::domain::ReviewRecord;

/// How a single target ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// The requested count was reached, or no cap was requested and the page
    /// was exhausted. A zero-review target is Complete with an empty set.
    Complete,
    /// Scrolling stagnated or hit the attempt cap before reaching the
    /// requested count. Not an error; partial reviews are kept.
    PartialTimeout,
    Failed,
}

/// Whether the most-recent sort was actually applied. Sort is best-effort;
/// when the control is unavailable the pass proceeds with site-default order
/// and that fact is recorded here rather than guessed at later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Newest,
    Unspecified,
}

/// Per-target aggregate: insertion-ordered, fingerprint-deduplicated reviews
/// plus the terminal status of the drive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResult {
    pub target_id: String,
    pub target_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub known_review_count: Option<u64>,
    pub status: TargetStatus,
    pub sort_order: SortOrder,
    pub reviews: Vec<ReviewRecord>,
    #[serde(default)]
    pub error_detail: Option<String>,
    /// Classified failure kind ("navigation", "blocked", ...) when Failed.
    #[serde(default)]
    pub failure_kind: Option<String>,
}

impl TargetResult {
    pub fn review_count(&self) -> usize {
        self.reviews.len()
    }
}

/// Merged run output keyed by target id. Keys are unique by construction
/// (disjoint shards); a collision at merge time is a bug signal, not noise.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub targets: BTreeMap<String, TargetResult>,
}

impl CollectionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one target's result, rejecting duplicate keys.
    pub fn insert(&mut self, result: TargetResult) -> Result<()> {
        let id = result.target_id.clone();
        if self.targets.contains_key(&id) {
            return Err(MagpieError::MergeCollision(id));
        }
        self.targets.insert(id, result);
        Ok(())
    }

    /// Fold another partial result into this one, flagging key collisions.
    pub fn merge(&mut self, other: CollectionResult) -> Result<()> {
        for (_, result) in other.targets {
            self.insert(result)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn total_reviews(&self) -> usize {
        self.targets.values().map(|t| t.reviews.len()).sum()
    }
}

/// One failed target and the classified reason, for the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTarget {
    pub id: String,
    pub kind: String,
}

/// Run-level counters, written once at run end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionLog {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    pub targets_attempted: usize,
    pub targets_succeeded: usize,
    pub targets_failed: usize,
    /// Targets skipped because a prior run already produced their artifact.
    pub targets_skipped: usize,
    pub reviews_collected: usize,
    pub failed_targets: Vec<FailedTarget>,
    pub aborted: bool,
}

impl CollectionLog {
    /// Exit classification: clean, completed-with-failures, or stopped before
    /// finishing the assigned window.
    pub fn outcome(&self) -> RunOutcome {
        if self.aborted {
            RunOutcome::Aborted
        } else if self.targets_failed > 0 {
            RunOutcome::PartialFailures
        } else {
            RunOutcome::Clean
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Clean,
    PartialFailures,
    Aborted,
}

impl RunOutcome {
    pub fn exit_code(self) -> u8 {
        match self {
            RunOutcome::Clean => 0,
            RunOutcome::PartialFailures => 2,
            RunOutcome::Aborted => 3,
        }
    }
}
