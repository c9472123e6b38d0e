//! Boundary to the target-discovery collaborator.
//!
//! Discovery runs upstream (a paginated search API) and hands this engine a
//! JSON array of targets. The core only reads that sequence; it never
//! mutates or re-queries it.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::app::{MagpieError, Result};
use crate::domain::TargetRecord;

/// Load the discovery file: a JSON array of target records.
pub fn load_targets(path: &Path) -> Result<Vec<TargetRecord>> {
    let content = fs::read_to_string(path).map_err(|e| {
        MagpieError::TargetsFile(format!("{}: {}", path.display(), e))
    })?;
    let targets: Vec<TargetRecord> = serde_json::from_str(&content).map_err(|e| {
        MagpieError::TargetsFile(format!("{}: {}", path.display(), e))
    })?;

    // Duplicate ids would break the one-worker-per-target ownership model.
    let mut seen = std::collections::HashSet::new();
    for target in &targets {
        if !seen.insert(target.id.as_str()) {
            return Err(MagpieError::TargetsFile(format!(
                "duplicate target id: {}",
                target.id
            )));
        }
    }

    info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}
