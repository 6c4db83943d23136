//! In-memory decision tracer
//!
//! Holds the ordered log of committed decisions for one process or one trace.
//! Insertion order is commit order, which is not necessarily timestamp order.

use super::sink::DecisionSink;
use super::trace_store::TraceStore;
use crate::decision::{ActiveSpan, DecisionEvent, DecisionSpan};
use crate::error::{FlowingError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Type alias for callbacks fired on every committed decision
pub type DecisionCallback = Arc<dyn Fn(&DecisionEvent) + Send + Sync>;

#[derive(Default)]
struct TracerLog {
    events: Vec<DecisionEvent>,
    seen_ids: HashSet<String>,
}

/// Ordered, thread-safe log of committed decision events
///
/// `record` never fails and never deduplicates. A repeated `decision_id` is
/// kept as-is and reported by [`DecisionTracer::duplicate_decision_ids`].
pub struct DecisionTracer {
    log: Mutex<TracerLog>,
    on_record_callback: Option<DecisionCallback>,
}

impl DecisionTracer {
    /// Create an empty tracer
    pub fn new() -> Self {
        Self {
            log: Mutex::new(TracerLog::default()),
            on_record_callback: None,
        }
    }

    /// Create a tracer that calls `callback` for every committed decision
    pub fn with_callback(callback: DecisionCallback) -> Self {
        Self {
            log: Mutex::new(TracerLog::default()),
            on_record_callback: Some(callback),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TracerLog> {
        // A panic inside a span body must not stop later commits.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// New span bound to this tracer; not started until [`DecisionSpan::start`]
    pub fn decision_span(
        &self,
        agent_id: impl Into<String>,
        parent_id: Option<String>,
    ) -> DecisionSpan<'_> {
        DecisionSpan::new(self, agent_id, parent_id)
    }

    /// Run `body` inside a started span
    ///
    /// The event is committed when `body` returns, whatever it returns, and
    /// also when it panics.
    pub fn in_span<R>(
        &self,
        agent_id: impl Into<String>,
        parent_id: Option<String>,
        body: impl FnOnce(&mut ActiveSpan<'_>) -> R,
    ) -> R {
        let mut span = self.decision_span(agent_id, parent_id).start();
        body(&mut span)
    }

    /// Snapshot of the log in commit order
    pub fn export(&self) -> Vec<DecisionEvent> {
        self.lock().events.clone()
    }

    /// Serialize the log as a pretty-printed JSON array
    pub fn export_json_string(&self) -> Result<String> {
        let events = self.export();
        Ok(serde_json::to_string_pretty(&events)?)
    }

    /// Write the log to `path` as a JSON array, replacing any existing file
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = self.export_json_string()?;
        std::fs::write(path, body).map_err(|source| FlowingError::TraceWriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Exported {} decisions to {}", self.len(), path.display());
        Ok(())
    }

    /// Take every event out of the log, leaving it empty
    pub fn drain(&self) -> Vec<DecisionEvent> {
        let mut log = self.lock();
        log.seen_ids.clear();
        std::mem::take(&mut log.events)
    }

    /// Move the log into a trace store as decision-kind events
    ///
    /// Returns the number of events handed over. The store still has to be
    /// flushed to reach disk.
    pub fn flush_into(&self, store: &TraceStore) -> usize {
        let events = self.drain();
        let count = events.len();
        for event in events {
            store.log_decision(event);
        }
        debug!("Moved {} decisions into trace {}", count, store.trace_id());
        count
    }

    /// Decision ids that were recorded more than once
    pub fn duplicate_decision_ids(&self) -> Vec<String> {
        let log = self.lock();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for event in &log.events {
            *counts.entry(event.decision_id.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id.to_string())
            .collect();
        duplicates.sort();
        duplicates
    }

    /// Clear all events from the log
    pub fn clear(&self) {
        let mut log = self.lock();
        log.events.clear();
        log.seen_ids.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }
}

impl Default for DecisionTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionSink for DecisionTracer {
    fn record(&self, event: DecisionEvent) {
        if let Some(callback) = &self.on_record_callback {
            callback(&event);
        }

        let mut log = self.lock();
        if !log.seen_ids.insert(event.decision_id.clone()) {
            warn!(decision_id = event.decision_id.as_str(), "Duplicate decision id recorded");
        }
        log.events.push(event);
    }
}
