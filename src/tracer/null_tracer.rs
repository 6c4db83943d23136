//! Null tracer implementation following the Null Object Pattern
//!
//! A [`NullTracer`] accepts every commit and keeps nothing. Replay-mode runtimes
//! use it so that replayed decisions are never re-recorded, and callers that
//! don't want tracing can hand it out instead of checking an `Option`.

use super::sink::DecisionSink;
use crate::decision::{DecisionEvent, DecisionSpan};

/// A sink that silently discards all decisions
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracer;

impl NullTracer {
    /// Create a new null tracer
    pub fn new() -> Self {
        Self
    }

    /// Always returns false for null tracer
    pub fn is_enabled(&self) -> bool {
        false
    }

    /// Spans still behave normally; their commit is simply dropped
    pub fn decision_span(
        &self,
        agent_id: impl Into<String>,
        parent_id: Option<String>,
    ) -> DecisionSpan<'_> {
        DecisionSpan::new(self, agent_id, parent_id)
    }

    /// Always returns 0 for null tracer
    pub fn len(&self) -> usize {
        0
    }

    /// Always returns true for null tracer
    pub fn is_empty(&self) -> bool {
        true
    }
}

impl DecisionSink for NullTracer {
    fn record(&self, _event: DecisionEvent) {
        // Do nothing
    }
}
