use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::app::Result;
use crate::config::Config;
use crate::domain::{CollectionLog, CollectionResult, TargetRecord};
use crate::harvest::PageDriver;
use crate::store::Store;
use crate::worker::{SessionFactory, Worker, WorkerReport};

/// Fans the target list out across workers and merges their results.
///
/// Shards are disjoint contiguous partitions, so no two workers ever hold
/// the same target id; write contention is eliminated by construction
/// rather than by locking.
pub struct Coordinator<F, St> {
    factory: Arc<F>,
    store: Arc<St>,
    config: Config,
}

impl<F, St> Coordinator<F, St>
where
    F: SessionFactory + 'static,
    F::Session: 'static,
    St: Store + Send + Sync + 'static,
{
    pub fn new(factory: Arc<F>, store: Arc<St>, config: Config) -> Self {
        Self {
            factory,
            store,
            config,
        }
    }

    /// Run the whole collection. `stop` is the global stop signal: raising
    /// it lets in-flight targets finish but blocks further dispatch.
    pub async fn run(
        &self,
        targets: Vec<TargetRecord>,
        stop: Arc<AtomicBool>,
    ) -> Result<(CollectionResult, CollectionLog)> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let window = apply_window(
            targets,
            self.config.harvest.start_from,
            self.config.harvest.limit,
        );
        let worker_count = self.config.harvest.workers.max(1);
        let shards = partition(window, worker_count);

        info!(
            "Dispatching {} shards ({} workers configured)",
            shards.len(),
            worker_count
        );

        let driver = Arc::new(PageDriver::new(self.config.clone()));
        let mut handles = Vec::new();
        for (id, shard) in shards.into_iter().enumerate() {
            let worker = Worker::new(
                id,
                self.factory.clone(),
                driver.clone(),
                self.store.clone(),
                shard,
            );
            let stop = stop.clone();
            handles.push(tokio::spawn(async move { worker.run(stop).await }));
        }

        let mut reports = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Worker task join error: {}", e),
            }
        }

        let (merged, log) = merge_reports(
            reports,
            started_at,
            clock.elapsed().as_secs(),
            stop.load(Ordering::SeqCst),
        )?;

        self.store.write_log(&log)?;
        info!(
            "Run finished: {} targets merged, {} failed, {} reviews, {}s",
            merged.len(),
            log.targets_failed,
            log.reviews_collected,
            log.elapsed_secs
        );
        Ok((merged, log))
    }
}

/// Resumable windowing over the target list.
pub fn apply_window(
    targets: Vec<TargetRecord>,
    start_from: usize,
    limit: Option<usize>,
) -> Vec<TargetRecord> {
    let mut iter = targets.into_iter().skip(start_from);
    match limit {
        Some(n) => iter.by_ref().take(n).collect(),
        None => iter.collect(),
    }
}

/// Split into at most `workers` disjoint contiguous shards of near-equal
/// size, dropping empty shards.
pub fn partition(targets: Vec<TargetRecord>, workers: usize) -> Vec<Vec<TargetRecord>> {
    let workers = workers.max(1);
    let total = targets.len();
    if total == 0 {
        return Vec::new();
    }
    let base = total / workers;
    let remainder = total % workers;

    let mut shards = Vec::new();
    let mut iter = targets.into_iter();
    for i in 0..workers {
        let size = base + usize::from(i < remainder);
        if size == 0 {
            break;
        }
        shards.push(iter.by_ref().take(size).collect());
    }
    shards
}

/// Fold worker reports into the final result and run log. A key collision
/// between partial results is an invariant violation and surfaces as an
/// error, never a silent drop.
pub fn merge_reports(
    reports: Vec<WorkerReport>,
    started_at: chrono::DateTime<Utc>,
    elapsed_secs: u64,
    stop_raised: bool,
) -> Result<(CollectionResult, CollectionLog)> {
    let mut merged = CollectionResult::new();
    let mut log = CollectionLog {
        started_at,
        elapsed_secs,
        targets_attempted: 0,
        targets_succeeded: 0,
        targets_failed: 0,
        targets_skipped: 0,
        reviews_collected: 0,
        failed_targets: Vec::new(),
        aborted: stop_raised,
    };

    for report in reports {
        log.targets_attempted += report.attempted;
        log.targets_succeeded += report.succeeded;
        log.targets_failed += report.failed;
        log.targets_skipped += report.skipped;
        log.reviews_collected += report.reviews;
        log.failed_targets.extend(report.failed_targets);
        if report.stopped_early {
            log.aborted = true;
        }
        merged.merge(report.partial)?;
    }

    Ok((merged, log))
}
