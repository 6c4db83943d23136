//! Trace envelope events
//!
//! Every entry in a trace file shares one envelope: `trace_id`, `span_id`,
//! `parent_span`, `agent`, `event_type`, `timestamp` and `payload`. The
//! `event_type` tag selects the body. `"decision"` carries a full
//! [`DecisionEvent`] as its payload; any other tag is a free-form event whose
//! payload is arbitrary JSON (or null).

use crate::decision::DecisionEvent;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type tag for structured decision payloads
pub const DECISION_EVENT_TYPE: &str = "decision";

const PREVIEW_LEN: usize = 100;

/// Body of a trace event, selected by its `event_type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBody", into = "RawBody")]
pub enum EventBody {
    /// A structured decision (`event_type: "decision"`)
    Decision(DecisionEvent),
    /// Any other event with a free-form payload
    Custom { event_type: String, payload: Value },
}

#[derive(Serialize, Deserialize)]
struct RawBody {
    event_type: String,
    #[serde(default)]
    payload: Value,
}

impl From<RawBody> for EventBody {
    fn from(raw: RawBody) -> Self {
        if raw.event_type == DECISION_EVENT_TYPE {
            if let Ok(decision) = serde_json::from_value::<DecisionEvent>(raw.payload.clone()) {
                return EventBody::Decision(decision);
            }
        }
        EventBody::Custom {
            event_type: raw.event_type,
            payload: raw.payload,
        }
    }
}

impl From<EventBody> for RawBody {
    fn from(body: EventBody) -> Self {
        match body {
            EventBody::Decision(decision) => RawBody {
                event_type: DECISION_EVENT_TYPE.to_string(),
                payload: serde_json::to_value(decision).unwrap_or(Value::Null),
            },
            EventBody::Custom {
                event_type,
                payload,
            } => RawBody {
                event_type,
                payload,
            },
        }
    }
}

impl EventBody {
    pub fn event_type(&self) -> &str {
        match self {
            EventBody::Decision(_) => DECISION_EVENT_TYPE,
            EventBody::Custom { event_type, .. } => event_type,
        }
    }

    pub fn as_decision(&self) -> Option<&DecisionEvent> {
        match self {
            EventBody::Decision(decision) => Some(decision),
            EventBody::Custom { .. } => None,
        }
    }
}

/// One entry of a durable trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default)]
    pub parent_span: Option<String>,
    pub agent: String,
    /// Unix timestamp (seconds)
    pub timestamp: f64,
    #[serde(flatten)]
    pub body: EventBody,
}

impl TraceEvent {
    pub fn event_type(&self) -> &str {
        self.body.event_type()
    }

    pub fn as_decision(&self) -> Option<&DecisionEvent> {
        self.body.as_decision()
    }

    /// Get a formatted string summary of the event
    pub fn printable_summary(&self) -> String {
        let secs = self.timestamp.trunc() as i64;
        let nanos = (self.timestamp.fract() * 1e9) as u32;
        let dt = DateTime::<Utc>::from_timestamp(secs, nanos)
            .unwrap_or_default()
            .with_timezone(&Local);
        let time_str = dt.format("%H:%M:%S%.3f").to_string();

        let mut summary =
            format!("[{}] {} → {} (span: {})", time_str, self.agent, self.event_type(), self.span_id);

        if let Some(parent) = &self.parent_span {
            summary.push_str(&format!("\n   Parent: {}", parent));
        }

        match &self.body {
            EventBody::Decision(decision) => {
                if !decision.model.is_empty() {
                    summary.push_str(&format!(
                        "\n   Model: {} (temperature {})",
                        decision.model, decision.temperature
                    ));
                }
                if !decision.prompt.is_empty() {
                    summary.push_str(&format!("\n   Prompt: {}", preview(&decision.prompt)));
                }
                summary.push_str(&format!("\n   Output: {}", preview(&decision.output)));
                if !decision.tool_calls.is_empty() {
                    let names: Vec<&str> =
                        decision.tool_calls.iter().map(|t| t.name.as_str()).collect();
                    summary.push_str(&format!("\n   Tool Calls: {}", names.join(", ")));
                }
            }
            EventBody::Custom { payload, .. } => match payload {
                Value::Null => {}
                Value::Object(fields) => {
                    for (key, value) in fields {
                        summary.push_str(&format!("\n   {}: {}", key, preview(&value.to_string())));
                    }
                }
                other => summary.push_str(&format!("\n   {}", preview(&other.to_string()))),
            },
        }

        summary
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_LEN {
        format!("{}...", text.chars().take(PREVIEW_LEN).collect::<String>())
    } else {
        text.to_string()
    }
}
