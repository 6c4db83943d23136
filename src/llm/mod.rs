pub mod decision_source;
pub mod ollama;

pub use decision_source::{DecisionSource, FnDecisionSource};
pub use ollama::{OllamaConfig, OllamaDecisionSource};
