//! The seam a span commits through

use crate::decision::DecisionEvent;
use std::sync::Arc;

/// Destination for committed decision events
///
/// Implementations must never fail or block on I/O: a commit happens inside a
/// span guard's `Drop`, possibly while a panic is unwinding.
pub trait DecisionSink: Send + Sync {
    /// Append a committed event
    fn record(&self, event: DecisionEvent);
}

impl<T: DecisionSink + ?Sized> DecisionSink for Arc<T> {
    fn record(&self, event: DecisionEvent) {
        (**self).record(event)
    }
}
