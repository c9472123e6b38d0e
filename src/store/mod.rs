pub mod json;

pub use json::JsonStore;

use crate::app::Result;
use crate::domain::{CollectionLog, TargetResult};

/// Persistence for per-target artifacts and the run log.
///
/// Targets are partitioned across workers with no overlap, so each worker
/// writes only keys it owns and no locking is needed. A pre-existing
/// per-target artifact means the target is already Complete and is skipped
/// on re-runs.
pub trait Store {
    /// Whether a prior run already produced this target's artifact.
    fn has_result(&self, target_id: &str) -> bool;

    /// Persist one target's result immediately (write-as-you-go), so a
    /// mid-run crash loses at most the in-flight target.
    fn write_result(&self, result: &TargetResult) -> Result<()>;

    fn read_result(&self, target_id: &str) -> Result<Option<TargetResult>>;

    /// Ids of all targets with persisted artifacts.
    fn list_result_ids(&self) -> Result<Vec<String>>;

    /// Write the run-level log, once, at run end.
    fn write_log(&self, log: &CollectionLog) -> Result<()>;

    fn read_log(&self) -> Result<Option<CollectionLog>>;
}
