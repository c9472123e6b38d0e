use std::time::Duration;

use crate::config::ScrollConfig;

/// Why the scroll loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEnd {
    /// Enough nodes loaded for the requested count. The primary speed lever:
    /// never keep scrolling past what was asked for.
    TargetReached,
    /// Repeated load actions produced no new content; the page is exhausted.
    /// A normal termination, not an error.
    Stagnated,
    /// Safety valve against pathological pages.
    AttemptCap,
}

/// What the driver should do after a count read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDecision {
    /// Scroll again, then wait this long before the next count read.
    Continue(Duration),
    Stop(ScrollEnd),
}

/// Termination predicate for the scroll poll loop.
///
/// Deliberately pure: it only observes loaded-node counts and decides, so it
/// is testable without any page. The driver owns the actual scroll/wait/read
/// cycle. Without a priori knowledge of the true review count, "enough" is:
/// the requested count (with overshoot headroom) was loaded, or the count
/// stopped growing, or the attempt cap was hit.
#[derive(Debug)]
pub struct ScrollController {
    config: ScrollConfig,
    /// Loaded-node count at which the target is considered reached.
    early_stop_at: Option<usize>,
    last_count: Option<usize>,
    stagnant_reads: u32,
    attempts: u32,
    wait: Duration,
}

impl ScrollController {
    pub fn new(config: ScrollConfig, requested: Option<usize>) -> Self {
        let early_stop_at = requested
            .map(|n| ((n as f64) * config.overshoot_factor).ceil() as usize);
        let wait = Duration::from_millis(config.base_wait_ms);
        Self {
            config,
            early_stop_at,
            last_count: None,
            stagnant_reads: 0,
            attempts: 0,
            wait,
        }
    }

    /// Feed one loaded-node count into the predicate.
    pub fn observe(&mut self, loaded: usize) -> ScrollDecision {
        self.attempts += 1;

        if let Some(stop_at) = self.early_stop_at {
            if loaded >= stop_at {
                return ScrollDecision::Stop(ScrollEnd::TargetReached);
            }
        }

        if self.last_count == Some(loaded) {
            self.stagnant_reads += 1;
            // Let slow network loads catch up, within bounds.
            let grown = self.wait + Duration::from_millis(self.config.stagnant_wait_step_ms);
            self.wait = grown.min(Duration::from_millis(self.config.max_wait_ms));
        } else {
            self.stagnant_reads = 0;
            self.wait = Duration::from_millis(self.config.base_wait_ms);
        }
        self.last_count = Some(loaded);

        if self.stagnant_reads >= self.config.stagnation_threshold {
            return ScrollDecision::Stop(ScrollEnd::Stagnated);
        }
        if self.attempts >= self.config.max_attempts {
            return ScrollDecision::Stop(ScrollEnd::AttemptCap);
        }
        ScrollDecision::Continue(self.wait)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
