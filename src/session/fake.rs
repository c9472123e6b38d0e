//! Scripted session stub for exercising the harvesting engine without a
//! browser. The page is modeled as an append-only list of review nodes that
//! grows one batch per scroll action, mirroring how a virtualized
//! infinite-scroll panel loads content.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::app::{MagpieError, Result};
use crate::session::Session;

/// What the reviews panel looks like when the driver tries to open it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelBehavior {
    /// Tab exists and opens normally.
    Opens,
    /// Target legitimately has zero reviews.
    Empty,
    /// Panel never renders; a retryable structural failure.
    Missing,
}

struct FakeState {
    /// Per-target batch scripts, keyed by a substring of the target URL.
    /// Consulted on navigation so one session can serve a whole shard.
    target_batches: HashMap<String, Vec<Vec<Value>>>,
    /// Batches of review-node JSON appended on successive scrolls.
    pending_batches: VecDeque<Vec<Value>>,
    /// Nodes currently "rendered" in the panel.
    loaded: Vec<Value>,
    panel: PanelBehavior,
    sort_available: bool,
    alive: bool,
    navigations: Vec<String>,
    /// Queued failures per operation marker, consumed one per call.
    failures: HashMap<&'static str, VecDeque<MagpieError>>,
}

pub struct FakeSession {
    state: Mutex<FakeState>,
}

impl FakeSession {
    pub fn new(batches: Vec<Vec<Value>>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                target_batches: HashMap::new(),
                pending_batches: batches.into_iter().collect(),
                loaded: Vec::new(),
                panel: PanelBehavior::Opens,
                sort_available: true,
                alive: true,
                navigations: Vec::new(),
                failures: HashMap::new(),
            }),
        }
    }

    /// A session that serves several targets: navigation to a URL containing
    /// one of the keys resets the panel and loads that target's batches.
    pub fn for_targets(targets: HashMap<String, Vec<Vec<Value>>>) -> Self {
        let session = Self::new(Vec::new());
        session.state.lock().unwrap().target_batches = targets;
        session
    }

    /// A convenience review node in the shape the extraction script returns.
    pub fn node(id: &str, rating: u8, date: &str, text: &str) -> Value {
        json!({
            "review_id": id,
            "author": format!("author of {id}"),
            "rating": rating,
            "date": date,
            "text": text,
            "language": "en",
        })
    }

    pub fn set_panel(&self, panel: PanelBehavior) {
        self.state.lock().unwrap().panel = panel;
    }

    pub fn set_sort_available(&self, available: bool) {
        self.state.lock().unwrap().sort_available = available;
    }

    pub fn kill(&self) {
        self.state.lock().unwrap().alive = false;
    }

    /// Queue `count` failures for the operation whose script contains
    /// `marker` ("navigate", "panelButton", "records", ...). Each matching
    /// call consumes one failure until the queue drains.
    pub fn fail_times(&self, marker: &'static str, count: usize, make: fn() -> MagpieError) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(marker).or_default();
        for _ in 0..count {
            queue.push_back(make());
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn take_failure(state: &mut FakeState, markers: &[&'static str]) -> Option<MagpieError> {
        for marker in markers {
            if let Some(queue) = state.failures.get_mut(marker) {
                if let Some(err) = queue.pop_front() {
                    return Some(err);
                }
            }
        }
        None
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if let Some(err) = Self::take_failure(&mut state, &["navigate"]) {
            return Err(err);
        }
        let matched = state
            .target_batches
            .iter()
            .find(|(key, _)| url.contains(key.as_str()))
            .map(|(_, batches)| batches.clone());
        if let Some(batches) = matched {
            state.loaded.clear();
            state.pending_batches = batches.into_iter().collect();
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut state = self.state.lock().unwrap();

        if !state.alive {
            return Err(MagpieError::SessionCrash("browser gone".into()));
        }

        let markers: Vec<&'static str> = [
            "pageReady",
            "panelButton",
            "sortMenu",
            "newestOption",
            "scrollTop",
            "reviewNodes",
            "expanders",
            "records",
        ]
        .into_iter()
        .filter(|m| script.contains(m))
        .collect();
        if let Some(err) = Self::take_failure(&mut state, &markers) {
            return Err(err);
        }

        if script.contains("pageReady") {
            return Ok(json!({ "ready": true, "blocked": false }));
        }
        if script.contains("panelButton") {
            let value = match state.panel {
                PanelBehavior::Opens => json!({ "state": "opened" }),
                PanelBehavior::Empty => json!({ "state": "empty" }),
                PanelBehavior::Missing => json!({ "state": "missing" }),
            };
            return Ok(value);
        }
        if script.contains("sortMenu") || script.contains("newestOption") {
            return Ok(json!(state.sort_available));
        }
        if script.contains("scrollTop") {
            if let Some(batch) = state.pending_batches.pop_front() {
                state.loaded.extend(batch);
            }
            return Ok(json!(state.loaded.len()));
        }
        if script.contains("expanders") {
            return Ok(json!(state.loaded.len()));
        }
        if script.contains("records") {
            return Ok(Value::Array(state.loaded.clone()));
        }
        if script.contains("reviewNodes") {
            return Ok(json!(state.loaded.len()));
        }

        Ok(Value::Null)
    }

    async fn is_alive(&self) -> bool {
        self.state.lock().unwrap().alive
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().alive = false;
        Ok(())
    }
}
