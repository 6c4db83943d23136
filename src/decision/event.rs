//! Decision event value types
//!
//! Events are deliberately permissive: empty prompts, negative temperatures and
//! unknown model names are all accepted. A trace must capture whatever the agent
//! produced, including partial values left behind by an early exit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a fresh globally unique identifier
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Get current timestamp as Unix timestamp (seconds since epoch)
pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// One auxiliary tool invocation made while producing a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: HashMap<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Records one unit of agent reasoning
///
/// Every field except `decision_id` falls back to its default when missing from
/// a deserialized trace, so hand-written or partial replay files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// Identifier of the agent that produced the decision
    #[serde(default)]
    pub agent_id: String,
    /// The prompt given to the model
    #[serde(default)]
    pub prompt: String,
    /// The model that was used
    #[serde(default)]
    pub model: String,
    /// The temperature setting used for the call
    #[serde(default)]
    pub temperature: f64,
    /// The decision output
    #[serde(default)]
    pub output: String,
    /// Tool calls in insertion order
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Non-owning reference to the decision that caused this one
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Unique identifier minted when the event is created
    pub decision_id: String,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub timestamp: f64,
}

impl DecisionEvent {
    /// Create an empty event for `agent_id` with a fresh decision id
    pub fn new(agent_id: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            prompt: String::new(),
            model: String::new(),
            temperature: 0.0,
            output: String::new(),
            tool_calls: Vec::new(),
            parent_id,
            decision_id: generate_id(),
            timestamp: current_timestamp(),
        }
    }

    /// Replace the minted id with a caller-supplied one
    pub fn with_decision_id(mut self, decision_id: impl Into<String>) -> Self {
        self.decision_id = decision_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_event_defaults() {
        let event = DecisionEvent::new("planner", None);

        assert_eq!(event.agent_id, "planner");
        assert!(event.prompt.is_empty());
        assert!(event.model.is_empty());
        assert!(event.output.is_empty());
        assert!(event.tool_calls.is_empty());
        assert_eq!(event.parent_id, None);
        assert!(!event.decision_id.is_empty());
        assert!(event.timestamp > 0.0);
    }

    #[test]
    fn test_decision_ids_are_unique() {
        let a = DecisionEvent::new("agent", None);
        let b = DecisionEvent::new("agent", None);
        assert_ne!(a.decision_id, b.decision_id);
    }

    #[test]
    fn test_with_decision_id() {
        let event = DecisionEvent::new("agent", Some("parent".to_string())).with_decision_id("abc");
        assert_eq!(event.decision_id, "abc");
        assert_eq!(event.parent_id.as_deref(), Some("parent"));
    }

    #[test]
    fn test_permissive_values_accepted() {
        let mut event = DecisionEvent::new("", None);
        event.temperature = -3.5;
        event.model = "no-such-model".to_string();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["temperature"], json!(-3.5));
        assert_eq!(value["model"], json!("no-such-model"));
    }

    #[test]
    fn test_serialized_field_names() {
        let mut event = DecisionEvent::new("executor", Some("p-1".to_string()));
        let mut args = HashMap::new();
        args.insert("query".to_string(), json!("quantum networking"));
        event.tool_calls.push(ToolCall::new("search", args));

        let value = serde_json::to_value(&event).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "agent_id",
            "prompt",
            "model",
            "temperature",
            "output",
            "tool_calls",
            "parent_id",
            "decision_id",
            "timestamp",
        ] {
            assert!(obj.contains_key(key), "missing key {}", key);
        }
        assert_eq!(value["tool_calls"][0]["name"], json!("search"));
        assert_eq!(value["tool_calls"][0]["arguments"]["query"], json!("quantum networking"));
    }

    #[test]
    fn test_partial_event_deserializes() {
        let event: DecisionEvent =
            serde_json::from_value(json!({"decision_id": "abc", "output": "42"})).unwrap();

        assert_eq!(event.decision_id, "abc");
        assert_eq!(event.output, "42");
        assert_eq!(event.parent_id, None);
        assert!(event.tool_calls.is_empty());
    }

    #[test]
    fn test_missing_decision_id_rejected() {
        let result = serde_json::from_value::<DecisionEvent>(json!({"output": "42"}));
        assert!(result.is_err());
    }
}
