//! Shard processing.
//!
//! One worker owns one browser session and walks its shard strictly one
//! target at a time; concurrency exists only across workers. Workers share
//! nothing during processing except the partitioned output store, and hand
//! their partial results to the coordinator only when the shard is done.

pub mod coordinator;

pub use coordinator::Coordinator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::app::Result;
use crate::domain::{CollectionResult, FailedTarget, SortOrder, TargetRecord, TargetResult, TargetStatus};
use crate::harvest::PageDriver;
use crate::session::{ChromeSession, Session, SessionManager};
use crate::store::Store;

/// Opens browser sessions. The seam lets worker logic run against scripted
/// fake sessions in tests.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Session + Send;

    async fn open(&self) -> Result<Self::Session>;
}

#[async_trait]
impl SessionFactory for SessionManager {
    type Session = ChromeSession;

    async fn open(&self) -> Result<ChromeSession> {
        SessionManager::open(self).await
    }
}

/// Per-worker counters and partial results, merged once at shard completion.
/// No cross-worker shared mutable state exists during processing.
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub partial: CollectionResult,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub reviews: usize,
    pub failed_targets: Vec<FailedTarget>,
    /// The global stop signal interrupted this shard before it finished.
    pub stopped_early: bool,
}

/// Processes one disjoint shard of targets sequentially on one session.
pub struct Worker<F, St> {
    id: usize,
    factory: Arc<F>,
    driver: Arc<PageDriver>,
    store: Arc<St>,
    shard: Vec<TargetRecord>,
}

impl<F, St> Worker<F, St>
where
    F: SessionFactory,
    St: Store + Send + Sync,
{
    pub fn new(
        id: usize,
        factory: Arc<F>,
        driver: Arc<PageDriver>,
        store: Arc<St>,
        shard: Vec<TargetRecord>,
    ) -> Self {
        Self {
            id,
            factory,
            driver,
            store,
            shard,
        }
    }

    pub async fn run(self, stop: Arc<AtomicBool>) -> WorkerReport {
        let mut report = WorkerReport {
            worker_id: self.id,
            ..WorkerReport::default()
        };
        let mut session: Option<F::Session> = None;

        info!("Worker {} starting: {} targets", self.id, self.shard.len());

        for target in &self.shard {
            // The stop signal blocks further dispatch; the in-flight target
            // was allowed to finish before we got here.
            if stop.load(Ordering::SeqCst) {
                info!("Worker {} stopping early on signal", self.id);
                report.stopped_early = true;
                break;
            }

            // Idempotent resume: a prior run's artifact stands as-is.
            if self.store.has_result(&target.id) {
                info!("Worker {}: skipping {} (already collected)", self.id, target.id);
                report.skipped += 1;
                match self.store.read_result(&target.id) {
                    Ok(Some(existing)) => {
                        if let Err(e) = report.partial.insert(existing) {
                            error!("Worker {}: {}", self.id, e);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(
                        "Worker {}: unreadable prior artifact for {}: {}",
                        self.id, target.id, e
                    ),
                }
                continue;
            }

            report.attempted += 1;

            if session.is_none() {
                match self.factory.open().await {
                    Ok(s) => session = Some(s),
                    Err(e) => {
                        error!("Worker {}: failed to open session: {}", self.id, e);
                        let result = session_failure_result(target, &e.to_string());
                        self.record(&mut report, result);
                        continue;
                    }
                }
            }
            let Some(active) = session.as_ref() else {
                continue;
            };

            let mut result = self.driver.run(active, target).await;

            // A dead browser is fatal for this target only: replace the
            // session and keep going with the rest of the shard.
            if result.status == TargetStatus::Failed && !active.is_alive().await {
                warn!(
                    "Worker {}: session crashed on {}, replacing browser",
                    self.id, target.id
                );
                result.failure_kind = Some("session_crash".to_string());
                if let Some(mut dead) = session.take() {
                    let _ = dead.close().await;
                }
            }

            self.record(&mut report, result);
        }

        if let Some(mut s) = session.take() {
            if let Err(e) = s.close().await {
                warn!("Worker {}: failed to close session: {}", self.id, e);
            }
        }

        info!(
            "Worker {} finished: {} ok, {} failed, {} skipped, {} reviews",
            self.id, report.succeeded, report.failed, report.skipped, report.reviews
        );
        report
    }

    fn record(&self, report: &mut WorkerReport, result: TargetResult) {
        // Write-as-you-go: the artifact lands before the next target starts.
        if let Err(e) = self.store.write_result(&result) {
            error!(
                "Worker {}: failed to persist result for {}: {}",
                self.id, result.target_id, e
            );
        }

        match result.status {
            TargetStatus::Failed => {
                report.failed += 1;
                report.failed_targets.push(FailedTarget {
                    id: result.target_id.clone(),
                    kind: result
                        .failure_kind
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string()),
                });
            }
            TargetStatus::Complete | TargetStatus::PartialTimeout => {
                report.succeeded += 1;
            }
        }
        report.reviews += result.reviews.len();

        if let Err(e) = report.partial.insert(result) {
            // Shards are disjoint, so this indicates a partitioning bug.
            error!("Worker {}: {}", self.id, e);
        }
    }
}

fn session_failure_result(target: &TargetRecord, detail: &str) -> TargetResult {
    TargetResult {
        target_id: target.id.clone(),
        target_name: target.name.clone(),
        address: target.address.clone(),
        known_review_count: target.known_review_count,
        status: TargetStatus::Failed,
        sort_order: SortOrder::Unspecified,
        reviews: Vec::new(),
        error_detail: Some(detail.to_string()),
        failure_kind: Some("browser".to_string()),
    }
}
