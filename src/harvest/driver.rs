use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::{MagpieError, Result};
use crate::config::Config;
use crate::domain::{ReviewRecord, SortOrder, TargetRecord, TargetResult, TargetStatus};
use crate::harvest::extractor::{ReviewAccumulator, ReviewExtractor};
use crate::harvest::retry::RetryPolicy;
use crate::harvest::scroll::{ScrollController, ScrollDecision, ScrollEnd};
use crate::session::Session;

/// States of one target's drive. `Failed` is reachable from every
/// non-terminal state once the retry budget for a step is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    Init,
    Navigated,
    PanelOpen,
    SortApplied,
    Scrolling,
    Extracted,
    Done,
    Failed,
}

/// How the drive finished, before result assembly.
enum DriveEnd {
    /// Target legitimately has no reviews; Complete with an empty set.
    NoReviews,
    Scrolled(ScrollEnd),
}

/// Drives a single target through navigate → open panel → sort → scroll →
/// extract, producing a [`TargetResult`] on every path. A failed target
/// still yields a result carrying whatever was extracted before the failure,
/// so one bad target never blocks the run.
pub struct PageDriver {
    extractor: ReviewExtractor,
    retry: RetryPolicy,
    config: Config,
    pacing: Duration,
}

impl PageDriver {
    pub fn new(config: Config) -> Self {
        Self {
            extractor: ReviewExtractor::new(config.selectors.clone()),
            retry: RetryPolicy::from_config(&config.retry),
            pacing: config.harvest.pacing(),
            config,
        }
    }

    /// Run the state machine for one target on the given session.
    pub async fn run<S: Session>(&self, session: &S, target: &TargetRecord) -> TargetResult {
        let mut acc = ReviewAccumulator::new();
        let mut sort_order = SortOrder::Unspecified;
        let requested = self.config.harvest.max_reviews;

        match self.drive(session, target, &mut acc, &mut sort_order).await {
            Ok(end) => {
                debug!("[{}] state {:?}", target.name, DriveState::Done);
                let collected = acc.len();
                let status = match end {
                    DriveEnd::NoReviews => TargetStatus::Complete,
                    DriveEnd::Scrolled(ScrollEnd::TargetReached) => TargetStatus::Complete,
                    DriveEnd::Scrolled(ScrollEnd::Stagnated)
                    | DriveEnd::Scrolled(ScrollEnd::AttemptCap) => match requested {
                        Some(req) if collected < req => TargetStatus::PartialTimeout,
                        _ => TargetStatus::Complete,
                    },
                };
                let reviews = std::mem::take(&mut acc).into_records(requested);
                info!(
                    "[{}] done: {} reviews, status {:?}",
                    target.name,
                    reviews.len(),
                    status
                );
                self.assemble(target, reviews, status, sort_order, None, None)
            }
            Err(e) => {
                debug!("[{}] state {:?}", target.name, DriveState::Failed);
                warn!("[{}] failed: {}", target.name, e);
                let reviews = std::mem::take(&mut acc).into_records(requested);
                self.assemble(
                    target,
                    reviews,
                    TargetStatus::Failed,
                    sort_order,
                    Some(e.to_string()),
                    Some(e.failure_kind().to_string()),
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        target: &TargetRecord,
        reviews: Vec<ReviewRecord>,
        status: TargetStatus,
        sort_order: SortOrder,
        error_detail: Option<String>,
        failure_kind: Option<String>,
    ) -> TargetResult {
        TargetResult {
            target_id: target.id.clone(),
            target_name: target.name.clone(),
            address: target.address.clone(),
            known_review_count: target.known_review_count,
            status,
            sort_order,
            reviews,
            error_detail,
            failure_kind,
        }
    }

    async fn drive<S: Session>(
        &self,
        session: &S,
        target: &TargetRecord,
        acc: &mut ReviewAccumulator,
        sort_order: &mut SortOrder,
    ) -> Result<DriveEnd> {
        let mut state = DriveState::Init;
        debug!("[{}] state {:?}", target.name, state);

        // Init → Navigated
        let url = target.detail_url()?;
        self.retry
            .run("navigate", || session.navigate(url.as_str()))
            .await?;
        tokio::time::sleep(self.pacing).await;
        self.wait_for_ready(session).await?;
        state = DriveState::Navigated;
        debug!("[{}] state {:?}", target.name, state);

        // Navigated → PanelOpen (or straight to Done for zero-review targets)
        match self.open_panel(session).await? {
            PanelState::Opened => {}
            PanelState::Empty => {
                info!("[{}] target has no reviews", target.name);
                return Ok(DriveEnd::NoReviews);
            }
        }
        tokio::time::sleep(self.pacing).await;
        state = DriveState::PanelOpen;
        debug!("[{}] state {:?}", target.name, state);

        // PanelOpen → SortApplied (best-effort)
        if self.apply_newest_sort(session).await? {
            *sort_order = SortOrder::Newest;
        } else {
            info!(
                "[{}] sort control unavailable, proceeding with site-default order",
                target.name
            );
        }
        state = DriveState::SortApplied;
        debug!("[{}] state {:?}", target.name, state);

        // SortApplied → Scrolling → Extracted
        state = DriveState::Scrolling;
        debug!("[{}] state {:?}", target.name, state);
        let end = self.scroll_and_extract(session, acc).await?;
        state = DriveState::Extracted;
        debug!(
            "[{}] state {:?}: {} distinct reviews",
            target.name,
            state,
            acc.len()
        );

        Ok(DriveEnd::Scrolled(end))
    }

    async fn wait_for_ready<S: Session>(&self, session: &S) -> Result<()> {
        let script = self.extractor.readiness_script();
        self.retry
            .run("readiness", || async {
                let value = session.evaluate(&script).await?;
                if value["blocked"].as_bool().unwrap_or(false) {
                    return Err(MagpieError::Blocked(
                        "page shows a block or CAPTCHA interstitial".into(),
                    ));
                }
                if !value["ready"].as_bool().unwrap_or(false) {
                    return Err(MagpieError::ElementNotFound(
                        "page did not reach a loaded state".into(),
                    ));
                }
                Ok(())
            })
            .await
    }

    async fn open_panel<S: Session>(&self, session: &S) -> Result<PanelState> {
        let script = self.extractor.open_panel_script();
        self.retry
            .run("open reviews panel", || async {
                let value = session.evaluate(&script).await?;
                match value["state"].as_str() {
                    Some("opened") => Ok(PanelState::Opened),
                    Some("empty") => Ok(PanelState::Empty),
                    _ => Err(MagpieError::ElementNotFound(
                        "reviews panel never rendered".into(),
                    )),
                }
            })
            .await
    }

    /// Returns whether the most-recent ordering was applied. Sort failure is
    /// not a target failure; fatal session errors still propagate.
    async fn apply_newest_sort<S: Session>(&self, session: &S) -> Result<bool> {
        let opened = match session.evaluate(&self.extractor.open_sort_menu_script()).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) if e.is_retryable() => false,
            Err(e) => return Err(e),
        };
        if !opened {
            return Ok(false);
        }
        tokio::time::sleep(self.pacing / 2).await;
        match session.evaluate(&self.extractor.choose_newest_script()).await {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) if e.is_retryable() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The scroll poll loop: scroll, wait, count, expand, extract, decide.
    /// Extraction happens once per scroll cycle so overlapping re-reads of
    /// virtualized nodes are deduplicated as they arrive.
    async fn scroll_and_extract<S: Session>(
        &self,
        session: &S,
        acc: &mut ReviewAccumulator,
    ) -> Result<ScrollEnd> {
        let mut ctrl = ScrollController::new(
            self.config.scroll.clone(),
            self.config.harvest.max_reviews,
        );
        let mut wait = Duration::from_millis(self.config.scroll.base_wait_ms);

        let scroll_script = self.extractor.scroll_script();
        let count_script = self.extractor.count_script();
        let expand_script = self.extractor.expand_script();
        let extract_script = self.extractor.extract_script();

        loop {
            self.retry
                .run("scroll", || session.evaluate(&scroll_script))
                .await?;
            tokio::time::sleep(wait).await;

            let loaded = self
                .retry
                .run("count reviews", || async {
                    let value = session.evaluate(&count_script).await?;
                    value.as_u64().map(|n| n as usize).ok_or_else(|| {
                        MagpieError::Execution("count script returned non-number".into())
                    })
                })
                .await?;

            self.retry
                .run("expand reviews", || session.evaluate(&expand_script))
                .await?;
            let batch: Value = self
                .retry
                .run("extract reviews", || session.evaluate(&extract_script))
                .await?;
            self.extractor.absorb_batch(batch, acc)?;

            match ctrl.observe(loaded) {
                ScrollDecision::Continue(next_wait) => wait = next_wait,
                ScrollDecision::Stop(end) => {
                    debug!(
                        "scroll loop stopped after {} attempts: {:?}",
                        ctrl.attempts(),
                        end
                    );
                    return Ok(end);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelState {
    Opened,
    Empty,
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::session::fake::{FakeSession, PanelBehavior};

    /// Config with millisecond pacing so tests run fast.
    fn test_config(max_reviews: Option<usize>, stagnation_threshold: u32) -> Config {
        let mut config = Config::default();
        config.harvest.max_reviews = max_reviews;
        config.harvest.pacing_ms = 1;
        config.scroll.stagnation_threshold = stagnation_threshold;
        config.scroll.base_wait_ms = 1;
        config.scroll.stagnant_wait_step_ms = 1;
        config.scroll.max_wait_ms = 2;
        config.retry.backoff_ms = 1;
        config
    }

    fn target() -> TargetRecord {
        TargetRecord::new("ChIJtest", "Test Diner")
    }

    fn nodes(ids: std::ops::Range<usize>) -> Vec<Value> {
        ids.map(|i| FakeSession::node(&format!("r{i}"), 4, "a week ago", &format!("review {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_three_batch_overlap_scenario() {
        // Batches of 10, then 8 with 2 overlapping, then nothing new:
        // 16 distinct fingerprints, capped to the requested 15.
        let mut second = nodes(8..10);
        second.extend(nodes(10..16));
        let session = FakeSession::new(vec![nodes(0..10), second, Vec::new()]);

        let driver = PageDriver::new(test_config(Some(15), 1));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Complete);
        assert_eq!(result.reviews.len(), 15);
        let distinct: std::collections::HashSet<_> =
            result.reviews.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(distinct.len(), 15);
        assert_eq!(result.sort_order, SortOrder::Newest);
    }

    #[tokio::test]
    async fn test_zero_review_target_is_complete_and_empty() {
        let session = FakeSession::new(Vec::new());
        session.set_panel(PanelBehavior::Empty);

        let driver = PageDriver::new(test_config(Some(10), 3));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Complete);
        assert!(result.reviews.is_empty());
        assert!(result.error_detail.is_none());
    }

    #[tokio::test]
    async fn test_retryable_extraction_failure_recovers() {
        let session = FakeSession::new(vec![nodes(0..5)]);
        session.fail_times("records", 2, || {
            MagpieError::Execution("transient empty read".into())
        });

        let driver = PageDriver::new(test_config(Some(5), 1));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Complete);
        assert_eq!(result.reviews.len(), 5);
        assert!(result.failure_kind.is_none());
    }

    #[tokio::test]
    async fn test_fatal_navigation_not_retried() {
        let session = FakeSession::new(Vec::new());
        session.fail_times("navigate", 1, || {
            MagpieError::Navigation("HTTP 403".into())
        });

        let driver = PageDriver::new(test_config(None, 3));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Failed);
        assert_eq!(result.failure_kind.as_deref(), Some("navigation"));
        assert_eq!(session.navigations().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_panel_fails_after_retries() {
        let session = FakeSession::new(Vec::new());
        session.set_panel(PanelBehavior::Missing);

        let driver = PageDriver::new(test_config(None, 3));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Failed);
        assert_eq!(result.failure_kind.as_deref(), Some("element_not_found"));
    }

    #[tokio::test]
    async fn test_sort_unavailable_degrades_gracefully() {
        let session = FakeSession::new(vec![nodes(0..3), Vec::new()]);
        session.set_sort_available(false);

        let driver = PageDriver::new(test_config(None, 1));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Complete);
        assert_eq!(result.sort_order, SortOrder::Unspecified);
        assert_eq!(result.reviews.len(), 3);
    }

    #[tokio::test]
    async fn test_early_termination_caps_output() {
        // Plenty available; requested 5 stops well before the attempt cap.
        let session =
            FakeSession::new(vec![nodes(0..10), nodes(10..20), nodes(20..30)]);

        let driver = PageDriver::new(test_config(Some(5), 3));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Complete);
        assert_eq!(result.reviews.len(), 5);
    }

    #[tokio::test]
    async fn test_stagnation_below_request_is_partial_timeout() {
        // Only 4 reviews exist but 10 were requested.
        let session = FakeSession::new(vec![nodes(0..4), Vec::new()]);

        let driver = PageDriver::new(test_config(Some(10), 1));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::PartialTimeout);
        assert_eq!(result.reviews.len(), 4);
        assert!(result.error_detail.is_none());
    }

    #[tokio::test]
    async fn test_blocked_page_is_fatal() {
        let session = FakeSession::new(Vec::new());
        session.fail_times("pageReady", 1, || {
            MagpieError::Blocked("unusual traffic page".into())
        });

        let driver = PageDriver::new(test_config(None, 3));
        let result = driver.run(&session, &target()).await;

        assert_eq!(result.status, TargetStatus::Failed);
        assert_eq!(result.failure_kind.as_deref(), Some("blocked"));
    }
}
