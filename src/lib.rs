pub mod comms;
pub mod decision;
pub mod error;
pub mod llm;
pub mod runtime;
pub mod tracer;

pub use error::{FlowingError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::decision::{ActiveSpan, DecisionEvent, DecisionSpan, ToolCall};
    pub use crate::error::{FlowingError, Result};
    pub use crate::llm::{DecisionSource, FnDecisionSource, OllamaDecisionSource};
    pub use crate::runtime::{DecisionRequest, FlowingRuntime, RuntimeConfig, RuntimeMode};
    pub use crate::tracer::{
        DecisionSink, DecisionTracer, NullTracer, TraceEvent, TraceStore, TraceStoreConfig,
    };
}
