//! File-backed trace store
//!
//! A [`TraceStore`] buffers [`TraceEvent`]s for one trace id in memory and
//! merges them into `<trace_dir>/<trace_id>.json` on [`TraceStore::flush`].
//!
//! Flush is read-merge-write: the existing JSON array is read (an unreadable or
//! malformed file counts as empty), the buffer is appended and the whole array
//! is written back. The write goes to a temporary file in the trace directory
//! that is then renamed over the target, so readers never see a torn file.
//! Flushes from one store are serialized by a lock. Two stores (or processes)
//! flushing the same trace id concurrently can still lose each other's events:
//! the last writer wins.

use super::sink::DecisionSink;
use super::trace_events::{EventBody, TraceEvent};
use crate::decision::{current_timestamp, generate_id, DecisionEvent, DecisionSpan};
use crate::error::{FlowingError, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Configuration for where trace files live
#[derive(Debug, Clone)]
pub struct TraceStoreConfig {
    pub trace_dir: PathBuf,
}

impl Default for TraceStoreConfig {
    fn default() -> Self {
        Self {
            trace_dir: std::env::var("FLOWING_TRACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("traces")),
        }
    }
}

impl TraceStoreConfig {
    pub fn with_dir(trace_dir: impl Into<PathBuf>) -> Self {
        Self {
            trace_dir: trace_dir.into(),
        }
    }

    /// Path of the file holding `trace_id`
    pub fn trace_path(&self, trace_id: &str) -> PathBuf {
        self.trace_dir.join(format!("{}.json", trace_id))
    }
}

/// Buffered, durable log of trace events for a single trace id
pub struct TraceStore {
    trace_id: String,
    file_path: PathBuf,
    buffer: Mutex<Vec<TraceEvent>>,
    flush_lock: Mutex<()>,
}

impl TraceStore {
    /// Create a store in the default trace directory
    ///
    /// A fresh trace id is generated when `trace_id` is `None`.
    pub fn new(trace_id: Option<String>) -> Result<Self> {
        Self::with_config(TraceStoreConfig::default(), trace_id)
    }

    /// Create a store with custom configuration; creates the trace directory
    pub fn with_config(config: TraceStoreConfig, trace_id: Option<String>) -> Result<Self> {
        std::fs::create_dir_all(&config.trace_dir).map_err(|source| {
            FlowingError::TraceWriteError {
                path: config.trace_dir.clone(),
                source,
            }
        })?;

        let trace_id = trace_id.unwrap_or_else(generate_id);
        let file_path = config.trace_path(&trace_id);
        debug!("Opened trace {} at {}", trace_id, file_path.display());

        Ok(Self {
            trace_id,
            file_path,
            buffer: Mutex::new(Vec::new()),
            flush_lock: Mutex::new(()),
        })
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn lock_buffer(&self) -> MutexGuard<'_, Vec<TraceEvent>> {
        self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(
        &self,
        parent_span: Option<String>,
        agent: String,
        span_id: String,
        timestamp: f64,
        body: EventBody,
    ) {
        let event = TraceEvent {
            trace_id: self.trace_id.clone(),
            span_id,
            parent_span,
            agent,
            timestamp,
            body,
        };
        self.lock_buffer().push(event);
    }

    /// Buffer a free-form event and return its freshly minted span id
    pub fn log(
        &self,
        agent: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
        parent_span: Option<String>,
    ) -> String {
        let span_id = generate_id();
        self.push(
            parent_span,
            agent.into(),
            span_id.clone(),
            current_timestamp(),
            EventBody::Custom {
                event_type: event_type.into(),
                payload,
            },
        );
        span_id
    }

    /// Buffer a committed decision
    ///
    /// The envelope reuses the decision id as its span id and the decision's
    /// parent as its parent span, so both views share one causal tree. The
    /// envelope timestamp is the decision's commit time, not the time it was
    /// handed to the store.
    pub fn log_decision(&self, event: DecisionEvent) -> String {
        let span_id = event.decision_id.clone();
        self.push(
            event.parent_id.clone(),
            event.agent_id.clone(),
            span_id.clone(),
            event.timestamp,
            EventBody::Decision(event),
        );
        span_id
    }

    /// New decision span that commits into this store's buffer
    pub fn decision_span(
        &self,
        agent_id: impl Into<String>,
        parent_id: Option<String>,
    ) -> DecisionSpan<'_> {
        DecisionSpan::new(self, agent_id, parent_id)
    }

    /// Number of events waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.lock_buffer().len()
    }

    /// Merge buffered events into the trace file
    ///
    /// Returns the number of events written from the buffer. On a write failure
    /// the buffered events are kept for the next attempt and the error is
    /// returned.
    pub fn flush(&self) -> Result<usize> {
        let _guard = self.flush_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let pending = std::mem::take(&mut *self.lock_buffer());
        let count = pending.len();

        match self.write_merged(&pending) {
            Ok(total) => {
                info!(
                    "Flushed {} events to trace {} ({} total)",
                    count, self.trace_id, total
                );
                Ok(count)
            }
            Err(err) => {
                let mut buffer = self.lock_buffer();
                let logged_since = std::mem::take(&mut *buffer);
                *buffer = pending;
                buffer.extend(logged_since);
                Err(err)
            }
        }
    }

    fn write_merged(&self, pending: &[TraceEvent]) -> Result<usize> {
        let mut combined = read_existing(&self.file_path);
        for event in pending {
            combined.push(serde_json::to_value(event)?);
        }
        let body = serde_json::to_string_pretty(&combined)?;

        let write_err = |source: std::io::Error| FlowingError::TraceWriteError {
            path: self.file_path.clone(),
            source,
        };
        let dir = self.file_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        temp.write_all(body.as_bytes()).map_err(write_err)?;
        temp.persist(&self.file_path).map_err(|e| write_err(e.error))?;

        Ok(combined.len())
    }

    /// Read every event of `trace_id` from `trace_dir`
    pub fn load(config: &TraceStoreConfig, trace_id: &str) -> Result<Vec<TraceEvent>> {
        Self::read_events(config.trace_path(trace_id))
    }

    /// Read a trace file; unlike flush, a missing or malformed file is an error
    pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<TraceEvent>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Existing entries of a trace file; anything unreadable counts as none
fn read_existing(path: &Path) -> Vec<Value> {
    if !path.exists() {
        return Vec::new();
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(FlowingError::from)
        .and_then(|contents| serde_json::from_str::<Vec<Value>>(&contents).map_err(FlowingError::from));

    match parsed {
        Ok(events) => events,
        Err(err) => {
            warn!(
                "Could not read existing trace {}, treating it as empty: {}",
                path.display(),
                err
            );
            Vec::new()
        }
    }
}

impl DecisionSink for TraceStore {
    fn record(&self, event: DecisionEvent) {
        self.log_decision(event);
    }
}

impl Drop for TraceStore {
    fn drop(&mut self) {
        if self.buffered() == 0 {
            return;
        }
        if let Err(err) = self.flush() {
            warn!("Dropping trace {} with unflushed events: {}", self.trace_id, err);
        }
    }
}
