//! Tracer system for decision recording and durable traces
//!
//! The tracer system records the causal chain of decisions made by agents and
//! persists it so runs can be inspected or replayed later.
//!
//! # Architecture
//!
//! - **DecisionSink**: The trait a span commits its finished event through
//! - **DecisionTracer**: In-memory, ordered log of decisions with JSON export
//! - **TraceStore**: Buffered, file-backed log keyed by trace id with merge-on-flush
//! - **NullTracer**: Null object pattern for when tracing is disabled
//!
//! # Event Types
//!
//! - **DecisionEvent**: One decision (prompt, model, output, tool calls, parent link)
//! - **TraceEvent**: Durable envelope; its `event_type` tag selects either a
//!   decision payload or a free-form JSON payload
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use flowing::tracer::{DecisionTracer, TraceStore, TraceStoreConfig};
//!
//! # fn main() -> flowing::Result<()> {
//! let tracer = DecisionTracer::new();
//!
//! let planner_id = tracer.in_span("planner", None, |span| {
//!     span.record_prompt("decide next step");
//!     span.record_model("gpt-4", 0.2);
//!     span.record_output("research X");
//!     span.decision_id().to_string()
//! });
//!
//! tracer.in_span("executor", Some(planner_id), |span| span.record_output("done"));
//!
//! let store = TraceStore::with_config(TraceStoreConfig::with_dir("traces"), None)?;
//! tracer.flush_into(&store);
//! store.flush()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Parent links
//!
//! `parent_id` (and `parent_span` in the envelope) is a non-owning reference.
//! It is never checked for existence or cycles, so a child may point at a
//! decision recorded by another tracer or another process.

pub mod decision_tracer;
pub mod null_tracer;
pub mod sink;
pub mod trace_events;
pub mod trace_store;

// Re-export main types
pub use decision_tracer::{DecisionCallback, DecisionTracer};
pub use null_tracer::NullTracer;
pub use sink::DecisionSink;
pub use trace_events::{EventBody, TraceEvent, DECISION_EVENT_TYPE};
pub use trace_store::{TraceStore, TraceStoreConfig};
