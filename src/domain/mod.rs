pub mod outcome;
pub mod review;
pub mod target;

pub use outcome::{
    CollectionLog, CollectionResult, FailedTarget, RunOutcome, SortOrder, TargetResult,
    TargetStatus,
};
pub use review::ReviewRecord;
pub use target::TargetRecord;
