//! Scoped span recorder
//!
//! A [`DecisionSpan`] is an unstarted handle bound to one sink and one agent.
//! Calling [`DecisionSpan::start`] consumes it and returns an [`ActiveSpan`]
//! guard. The guard commits its event to the sink when it is dropped, which
//! covers normal scope exit, `?` early returns and unwinding panics alike. The
//! guard never touches an in-flight error; it only makes sure the partially
//! filled event still reaches the trace.

use super::event::{current_timestamp, DecisionEvent, ToolCall};
use crate::tracer::DecisionSink;
use std::collections::HashMap;
use tracing::debug;

/// Unstarted span bound to a sink and an agent
pub struct DecisionSpan<'a> {
    sink: &'a dyn DecisionSink,
    agent_id: String,
    parent_id: Option<String>,
}

impl<'a> DecisionSpan<'a> {
    /// Create a span handle; nothing is recorded until it is started
    pub fn new(
        sink: &'a dyn DecisionSink,
        agent_id: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            sink,
            agent_id: agent_id.into(),
            parent_id,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Allocate the event and mint its decision id
    ///
    /// Consumes the handle, so a span can only ever be started once.
    pub fn start(self) -> ActiveSpan<'a> {
        let event = DecisionEvent::new(self.agent_id, self.parent_id);
        debug!(decision_id = event.decision_id.as_str(), agent_id = event.agent_id.as_str(), "Span started");
        ActiveSpan {
            sink: self.sink,
            event: Some(event),
        }
    }
}

/// Guard over an open decision; commits exactly once on drop
pub struct ActiveSpan<'a> {
    sink: &'a dyn DecisionSink,
    event: Option<DecisionEvent>,
}

impl ActiveSpan<'_> {
    /// The id minted for this span, for linking child spans
    pub fn decision_id(&self) -> &str {
        self.event.as_ref().map(|e| e.decision_id.as_str()).unwrap_or_default()
    }

    /// The event as populated so far
    pub fn event(&self) -> Option<&DecisionEvent> {
        self.event.as_ref()
    }

    pub fn record_prompt(&mut self, prompt: impl Into<String>) {
        if let Some(event) = self.event.as_mut() {
            event.prompt = prompt.into();
        }
    }

    pub fn record_model(&mut self, model: impl Into<String>, temperature: f64) {
        if let Some(event) = self.event.as_mut() {
            event.model = model.into();
            event.temperature = temperature;
        }
    }

    pub fn record_output(&mut self, output: impl Into<String>) {
        if let Some(event) = self.event.as_mut() {
            event.output = output.into();
        }
    }

    /// Append a tool invocation; order is preserved
    pub fn record_tool_call(
        &mut self,
        name: impl Into<String>,
        arguments: HashMap<String, serde_json::Value>,
    ) {
        if let Some(event) = self.event.as_mut() {
            event.tool_calls.push(ToolCall::new(name, arguments));
        }
    }

    /// Commit the event now instead of at scope exit
    pub fn end(self) {
        drop(self);
    }

    fn commit(&mut self) {
        if let Some(mut event) = self.event.take() {
            event.timestamp = current_timestamp();
            debug!(
                decision_id = event.decision_id.as_str(),
                agent_id = event.agent_id.as_str(),
                panicking = std::thread::panicking(),
                "Span committed"
            );
            self.sink.record(event);
        }
    }
}

impl Drop for ActiveSpan<'_> {
    fn drop(&mut self) {
        self.commit();
    }
}
