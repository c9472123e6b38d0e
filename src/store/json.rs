use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::app::Result;
use crate::domain::{CollectionLog, TargetResult};
use crate::store::Store;

const LOG_FILE: &str = "collection_log.json";

/// One JSON file per target id under a root directory, plus one run log.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (and create if needed) the output directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn result_path(&self, target_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize(target_id)))
    }

    /// Write via a temp file and rename, so readers and resumed runs never
    /// see a half-written artifact.
    fn write_json(&self, path: &Path, content: &str) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Keep artifact names filesystem-safe; place ids are alphanumeric in
/// practice but inputs are not trusted. When replacement changes the name,
/// a short hash of the raw id is appended so two distinct ids (say `a/b`
/// and `a_b`) can never share an artifact path and cross-wire resume.
fn sanitize(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned == id {
        return cleaned;
    }
    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    format!("{}-{}", cleaned, &digest[..8])
}

impl Store for JsonStore {
    fn has_result(&self, target_id: &str) -> bool {
        self.result_path(target_id).exists()
    }

    fn write_result(&self, result: &TargetResult) -> Result<()> {
        let path = self.result_path(&result.target_id);
        let content = serde_json::to_string_pretty(result)?;
        self.write_json(&path, &content)?;
        debug!(
            "Wrote {} ({} reviews)",
            path.display(),
            result.reviews.len()
        );
        Ok(())
    }

    fn read_result(&self, target_id: &str) -> Result<Option<TargetResult>> {
        let path = self.result_path(target_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list_result_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == LOG_FILE || !name.ends_with(".json") {
                continue;
            }
            ids.push(name.trim_end_matches(".json").to_string());
        }
        ids.sort();
        Ok(ids)
    }

    fn write_log(&self, log: &CollectionLog) -> Result<()> {
        let content = serde_json::to_string_pretty(log)?;
        self.write_json(&self.root.join(LOG_FILE), &content)
    }

    fn read_log(&self) -> Result<Option<CollectionLog>> {
        let path = self.root.join(LOG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{SortOrder, TargetStatus};

    fn result(id: &str) -> TargetResult {
        TargetResult {
            target_id: id.into(),
            target_name: "A Place".into(),
            address: Some("1 Main St".into()),
            known_review_count: Some(12),
            status: TargetStatus::Complete,
            sort_order: SortOrder::Newest,
            reviews: Vec::new(),
            error_detail: None,
            failure_kind: None,
        }
    }

    #[test]
    fn test_result_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        assert!(!store.has_result("t1"));
        store.write_result(&result("t1")).unwrap();
        assert!(store.has_result("t1"));

        let read = store.read_result("t1").unwrap().unwrap();
        assert_eq!(read.target_id, "t1");
        assert_eq!(read.status, TargetStatus::Complete);
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        assert!(store.read_result("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_excludes_run_log() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        store.write_result(&result("b")).unwrap();
        store.write_result(&result("a")).unwrap();
        store
            .write_log(&CollectionLog {
                started_at: Utc::now(),
                elapsed_secs: 0,
                targets_attempted: 2,
                targets_succeeded: 2,
                targets_failed: 0,
                targets_skipped: 0,
                reviews_collected: 0,
                failed_targets: Vec::new(),
                aborted: false,
            })
            .unwrap();

        assert_eq!(store.list_result_ids().unwrap(), vec!["a", "b"]);
        assert!(store.read_log().unwrap().is_some());
    }

    #[test]
    fn test_sanitized_artifact_names() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        store.write_result(&result("weird/../id")).unwrap();
        assert!(store.has_result("weird/../id"));
        // No traversal outside the root happened.
        assert_eq!(store.list_result_ids().unwrap().len(), 1);
    }

    #[test]
    fn test_colliding_sanitized_ids_get_distinct_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        // Both ids sanitize to "a_b"; they must not share a path.
        store.write_result(&result("a/b")).unwrap();
        store.write_result(&result("a_b")).unwrap();

        assert_eq!(store.list_result_ids().unwrap().len(), 2);
        assert!(store.has_result("a/b"));
        assert!(store.has_result("a_b"));
        assert_eq!(store.read_result("a/b").unwrap().unwrap().target_id, "a/b");
        assert_eq!(store.read_result("a_b").unwrap().unwrap().target_id, "a_b");
    }

    #[test]
    fn test_no_tmp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        store.write_result(&result("t1")).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
