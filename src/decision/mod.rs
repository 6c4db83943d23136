//! Decision data model and the scoped span that builds it.
//!
//! A [`DecisionEvent`] is the atomic unit of a trace: one prompt, one model
//! configuration, one output, plus any tool calls made along the way. Events are
//! populated through an [`ActiveSpan`] and committed to a
//! [`DecisionSink`](crate::tracer::DecisionSink) exactly once when the span ends.

pub mod event;
pub mod span;

pub use event::{current_timestamp, generate_id, DecisionEvent, ToolCall};
pub use span::{ActiveSpan, DecisionSpan};
