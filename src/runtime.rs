//! Record/replay runtime
//!
//! A [`FlowingRuntime`] sits between an agent and whatever produces its
//! decisions. In [`RuntimeMode::Record`] it runs the real decision call and
//! records the result; in [`RuntimeMode::Replay`] it answers from a trace file
//! loaded at construction and never runs the real call.
//!
//! # Decision ids
//!
//! Decision ids are supplied by the caller on every [`DecisionRequest`]. The
//! runtime never mints them, because an id minted at record time could not be
//! reproduced by the replaying run. Callers must derive ids that are stable
//! across runs (for example `"<agent>-<step>"`); the same id is embedded in the
//! recorded event and used as the replay lookup key.

use crate::decision::DecisionEvent;
use crate::error::{FlowingError, Result};
use crate::llm::DecisionSource;
use crate::tracer::{DecisionSink, NullTracer, TraceEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Execution mode of a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Record,
    Replay,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::Record => write!(f, "record"),
            RuntimeMode::Replay => write!(f, "replay"),
        }
    }
}

impl FromStr for RuntimeMode {
    type Err = FlowingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(RuntimeMode::Record),
            "replay" => Ok(RuntimeMode::Replay),
            other => Err(FlowingError::ConfigError(format!("unknown runtime mode: {}", other))),
        }
    }
}

/// Runtime settings, usually read from the environment
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    pub trace_path: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Read `FLOWING_MODE` and `FLOWING_TRACE_PATH`
    pub fn from_env() -> Result<Self> {
        let mode = match std::env::var("FLOWING_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => RuntimeMode::default(),
        };
        let trace_path = std::env::var("FLOWING_TRACE_PATH").ok().map(PathBuf::from);
        Ok(Self { mode, trace_path })
    }
}

/// One decision routed through the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub agent_id: String,
    pub decision_id: String,
    pub prompt: String,
    pub parent_id: Option<String>,
}

impl DecisionRequest {
    pub fn new(
        agent_id: impl Into<String>,
        decision_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            decision_id: decision_id.into(),
            prompt: prompt.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

/// Wraps decision calls with record or replay behaviour
///
/// Cloning is cheap; the replay index is shared read-only between clones.
#[derive(Clone)]
pub struct FlowingRuntime {
    mode: RuntimeMode,
    replay_index: Arc<HashMap<String, DecisionEvent>>,
    sink: Arc<dyn DecisionSink>,
}

impl FlowingRuntime {
    /// Runtime that executes real calls and records them into `sink`
    pub fn record(sink: Arc<dyn DecisionSink>) -> Self {
        Self {
            mode: RuntimeMode::Record,
            replay_index: Arc::new(HashMap::new()),
            sink,
        }
    }

    /// Runtime that answers from the trace at `trace_path`
    pub fn replay(trace_path: impl AsRef<Path>) -> Result<Self> {
        let replay_index = load_replay_index(trace_path.as_ref())?;
        Ok(Self {
            mode: RuntimeMode::Replay,
            replay_index: Arc::new(replay_index),
            sink: Arc::new(NullTracer::new()),
        })
    }

    /// Build a runtime from configuration
    ///
    /// Replay mode without a trace path fails here rather than on first use.
    pub fn from_config(config: &RuntimeConfig, sink: Arc<dyn DecisionSink>) -> Result<Self> {
        match config.mode {
            RuntimeMode::Record => Ok(Self::record(sink)),
            RuntimeMode::Replay => {
                let path = config.trace_path.as_ref().ok_or_else(|| {
                    FlowingError::ConfigError("trace_path required in replay mode".to_string())
                })?;
                Self::replay(path)
            }
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Recorded output for `decision_id`, or [`FlowingError::ReplayMiss`]
    pub fn replay_output(&self, decision_id: &str) -> Result<&str> {
        self.replay_index
            .get(decision_id)
            .map(|event| event.output.as_str())
            .ok_or_else(|| FlowingError::ReplayMiss {
                decision_id: decision_id.to_string(),
            })
    }

    /// Full recorded event for `decision_id`
    pub fn recorded(&self, decision_id: &str) -> Option<&DecisionEvent> {
        self.replay_index.get(decision_id)
    }

    pub fn contains(&self, decision_id: &str) -> bool {
        self.replay_index.contains_key(decision_id)
    }

    /// Number of decisions available for replay
    pub fn replay_len(&self) -> usize {
        self.replay_index.len()
    }

    /// Route one decision through the runtime
    ///
    /// In replay mode `real_call` is never invoked. A miss is an error; the
    /// runtime does not fall back to computing a fresh answer.
    pub fn decide<F>(&self, request: &DecisionRequest, real_call: F) -> Result<String>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        match self.mode {
            RuntimeMode::Replay => self.replay_output(&request.decision_id).map(String::from),
            RuntimeMode::Record => {
                let output = real_call(&request.prompt)?;
                self.record_decision(request, &output, None);
                Ok(output)
            }
        }
    }

    /// Async variant of [`FlowingRuntime::decide`] backed by a [`DecisionSource`]
    ///
    /// Records the source's model and temperature when it reports them.
    pub async fn decide_with(
        &self,
        request: &DecisionRequest,
        source: &dyn DecisionSource,
    ) -> Result<String> {
        match self.mode {
            RuntimeMode::Replay => self.replay_output(&request.decision_id).map(String::from),
            RuntimeMode::Record => {
                let output = source.decide(&request.prompt).await?;
                self.record_decision(request, &output, source.model());
                Ok(output)
            }
        }
    }

    fn record_decision(&self, request: &DecisionRequest, output: &str, model: Option<(&str, f64)>) {
        let mut event = DecisionEvent::new(request.agent_id.clone(), request.parent_id.clone())
            .with_decision_id(request.decision_id.clone());
        event.prompt = request.prompt.clone();
        event.output = output.to_string();
        if let Some((name, temperature)) = model {
            event.model = name.to_string();
            event.temperature = temperature;
        }

        debug!(
            decision_id = request.decision_id.as_str(),
            agent_id = request.agent_id.as_str(),
            "Recorded decision"
        );
        self.sink.record(event);
    }
}

fn load_replay_index(path: &Path) -> Result<HashMap<String, DecisionEvent>> {
    let contents = std::fs::read_to_string(path)?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)?;

    // Accepts decision exports and trace store envelopes; anything else is skipped
    let mut index = HashMap::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        let event = if let Ok(envelope) = serde_json::from_value::<TraceEvent>(entry.clone()) {
            match envelope.as_decision() {
                Some(event) => event.clone(),
                None => continue,
            }
        } else if let Ok(event) = serde_json::from_value::<DecisionEvent>(entry) {
            event
        } else {
            warn!(position, "Skipping unrecognised entry in replay trace {}", path.display());
            continue;
        };
        if let Some(previous) = index.insert(event.decision_id.clone(), event) {
            warn!(
                decision_id = previous.decision_id.as_str(),
                "Duplicate decision id in replay trace, keeping the later one"
            );
        }
    }

    info!("Loaded {} decisions for replay from {}", index.len(), path.display());
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FnDecisionSource;
    use crate::tracer::{DecisionTracer, TraceStore, TraceStoreConfig};
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn write_trace(temp_dir: &TempDir, name: &str, body: serde_json::Value) -> PathBuf {
        let path = temp_dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(&body).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("record".parse::<RuntimeMode>().unwrap(), RuntimeMode::Record);
        assert_eq!(" Replay ".parse::<RuntimeMode>().unwrap(), RuntimeMode::Replay);
        assert!(matches!("rewind".parse::<RuntimeMode>(), Err(FlowingError::ConfigError(_))));
        assert_eq!(RuntimeMode::Replay.to_string(), "replay");
        assert_eq!(RuntimeMode::default(), RuntimeMode::Record);
    }

    #[test]
    fn test_replay_without_trace_path_fails_fast() {
        let config = RuntimeConfig {
            mode: RuntimeMode::Replay,
            trace_path: None,
        };
        let result = FlowingRuntime::from_config(&config, Arc::new(NullTracer::new()));
        assert!(matches!(result, Err(FlowingError::ConfigError(_))));
    }

    #[test]
    fn test_record_mode_needs_nothing() {
        let runtime =
            FlowingRuntime::from_config(&RuntimeConfig::default(), Arc::new(NullTracer::new()))
                .unwrap();
        assert_eq!(runtime.mode(), RuntimeMode::Record);
        assert_eq!(runtime.replay_len(), 0);
    }

    #[test]
    fn test_replay_hit_and_miss() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_trace(&temp_dir, "trace.json", json!([{"decision_id": "abc", "output": "42"}]));
        let runtime = FlowingRuntime::replay(&path).unwrap();
        let calls = Cell::new(0);

        let hit = runtime.decide(&DecisionRequest::new("agent", "abc", "what?"), |_| {
            calls.set(calls.get() + 1);
            Ok("live".to_string())
        });
        assert_eq!(hit.unwrap(), "42");

        let miss = runtime.decide(&DecisionRequest::new("agent", "zzz", "what?"), |_| {
            calls.set(calls.get() + 1);
            Ok("live".to_string())
        });
        assert!(matches!(miss, Err(FlowingError::ReplayMiss { ref decision_id }) if decision_id == "zzz"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_replay_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = FlowingRuntime::replay(temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(FlowingError::IoError(_))));
    }

    #[test]
    fn test_record_then_replay_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let tracer = Arc::new(DecisionTracer::new());
        let recorder = FlowingRuntime::record(tracer.clone());

        let prompts = ["plan the day", "pick a café ☕", ""];
        let mut recorded = Vec::new();
        for (step, prompt) in prompts.iter().enumerate() {
            let request = DecisionRequest::new("planner", format!("planner-{}", step), *prompt);
            let output = recorder
                .decide(&request, |p| Ok(format!("answer to [{}] #{}", p, step)))
                .unwrap();
            recorded.push((request, output));
        }

        let path = temp_dir.path().join("trace.json");
        tracer.export_json(&path).unwrap();

        let replayer = FlowingRuntime::replay(&path).unwrap();
        assert_eq!(replayer.replay_len(), prompts.len());
        for (request, output) in &recorded {
            let replayed = replayer
                .decide(request, |_| panic!("real call must not run during replay"))
                .unwrap();
            assert_eq!(&replayed, output);
        }
    }

    #[test]
    fn test_record_mode_records_request_fields() {
        let tracer = Arc::new(DecisionTracer::new());
        let runtime = FlowingRuntime::record(tracer.clone());

        let request = DecisionRequest::new("executor", "exec-1", "search").with_parent("plan-1");
        let output = runtime.decide(&request, |p| Ok(format!("{} done", p))).unwrap();
        assert_eq!(output, "search done");

        let events = tracer.export();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].decision_id, "exec-1");
        assert_eq!(events[0].agent_id, "executor");
        assert_eq!(events[0].prompt, "search");
        assert_eq!(events[0].output, "search done");
        assert_eq!(events[0].parent_id.as_deref(), Some("plan-1"));
    }

    #[test]
    fn test_record_mode_propagates_call_error() {
        let tracer = Arc::new(DecisionTracer::new());
        let runtime = FlowingRuntime::record(tracer.clone());

        let result = runtime.decide(&DecisionRequest::new("a", "d-1", "p"), |_| {
            Err(FlowingError::DecisionError("model offline".to_string()))
        });

        assert!(matches!(result, Err(FlowingError::DecisionError(_))));
        assert!(tracer.is_empty());
    }

    #[test]
    fn test_replay_from_trace_store_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = TraceStore::with_config(
            TraceStoreConfig::with_dir(temp_dir.path()),
            Some("run-1".to_string()),
        )
        .unwrap();
        let tracer = DecisionTracer::new();

        store.log("planner", "started", json!({"goal": "x"}), None);
        tracer.record(DecisionEvent::new("planner", None).with_decision_id("d-1"));
        let mut second = DecisionEvent::new("planner", None).with_decision_id("d-2");
        second.output = "second".to_string();
        tracer.record(second);
        tracer.flush_into(&store);
        store.flush().unwrap();

        let runtime = FlowingRuntime::replay(store.file_path()).unwrap();
        assert_eq!(runtime.replay_len(), 2);
        assert_eq!(runtime.replay_output("d-2").unwrap(), "second");
        assert!(runtime.contains("d-1"));
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_trace(
            &temp_dir,
            "dupes.json",
            json!([
                {"decision_id": "abc", "output": "first"},
                {"decision_id": "abc", "output": "second"}
            ]),
        );

        let runtime = FlowingRuntime::replay(&path).unwrap();
        assert_eq!(runtime.replay_len(), 1);
        assert_eq!(runtime.replay_output("abc").unwrap(), "second");
    }

    #[test]
    fn test_unrecognised_entries_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_trace(
            &temp_dir,
            "mixed.json",
            json!([
                {"legacy": 1},
                "not an object",
                {"decision_id": "abc", "output": "42"}
            ]),
        );

        let runtime = FlowingRuntime::replay(&path).unwrap();
        assert_eq!(runtime.replay_len(), 1);
        assert_eq!(runtime.replay_output("abc").unwrap(), "42");
    }

    #[test]
    fn test_replay_index_shared_across_threads() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_trace(&temp_dir, "trace.json", json!([{"decision_id": "abc", "output": "42"}]));
        let runtime = FlowingRuntime::replay(&path).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let runtime = runtime.clone();
                std::thread::spawn(move || runtime.replay_output("abc").map(String::from))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "42");
        }
    }

    #[tokio::test]
    async fn test_decide_with_source_records_model() {
        struct FixedModel;

        #[async_trait::async_trait]
        impl DecisionSource for FixedModel {
            async fn decide(&self, prompt: &str) -> Result<String> {
                Ok(format!("{}!", prompt))
            }

            fn model(&self) -> Option<(&str, f64)> {
                Some(("gpt-4", 0.2))
            }
        }

        let tracer = Arc::new(DecisionTracer::new());
        let runtime = FlowingRuntime::record(tracer.clone());
        let output = runtime
            .decide_with(&DecisionRequest::new("planner", "p-1", "go"), &FixedModel)
            .await
            .unwrap();

        assert_eq!(output, "go!");
        let events = tracer.export();
        assert_eq!(events[0].model, "gpt-4");
        assert!((events[0].temperature - 0.2).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_decide_with_replay_skips_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_trace(&temp_dir, "trace.json", json!([{"decision_id": "abc", "output": "42"}]));
        let runtime = FlowingRuntime::replay(&path).unwrap();
        let source = FnDecisionSource::new(|_: &str| -> Result<String> {
            panic!("source must not run during replay")
        });

        let output = runtime
            .decide_with(&DecisionRequest::new("agent", "abc", "q"), &source)
            .await
            .unwrap();
        assert_eq!(output, "42");

        let miss = runtime
            .decide_with(&DecisionRequest::new("agent", "zzz", "q"), &source)
            .await;
        assert!(miss.unwrap_err().is_replay_miss());
    }
}
