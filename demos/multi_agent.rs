//! Planner/executor demonstration of decision tracing and replay
//!
//! Records two causally linked decisions, writes them to a trace store, then
//! replays the run from the exported decisions without calling the "model".
//!
//! # Running the example
//!
//! ```bash
//! cargo run --example multi_agent
//! FLOWING_TRACE_DIR=/tmp/traces RUST_LOG=flowing=debug cargo run --example multi_agent
//! FLOWING_MODE=replay FLOWING_TRACE_PATH=traces/<id>-decisions.json cargo run --example multi_agent
//! ```

use flowing::prelude::*;
use std::sync::Arc;

fn fake_model(prompt: &str) -> flowing::Result<String> {
    Ok(match prompt {
        "Decide what to research" => "Research quantum networking".to_string(),
        other => format!("Found 3 relevant papers for: {}", other),
    })
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runtime_config = RuntimeConfig::from_env()?;
    if runtime_config.mode == RuntimeMode::Replay {
        let replayer = FlowingRuntime::from_config(&runtime_config, Arc::new(NullTracer::new()))?;
        for decision_id in ["planner-0", "executor-0"] {
            let request = DecisionRequest::new("demo", decision_id, "");
            println!("[replay] {} -> {}", decision_id, replayer.decide(&request, fake_model)?);
        }
        return Ok(());
    }

    let config = TraceStoreConfig::default();
    let store = TraceStore::with_config(config.clone(), None)?;
    let tracer = Arc::new(DecisionTracer::new());

    // Spans built by hand
    let planner_id = tracer.in_span("planner", None, |span| {
        span.record_prompt("Decide what to research");
        span.record_model("gpt-4", 0.2);
        span.record_output("Research quantum networking");
        span.decision_id().to_string()
    });
    tracer.in_span("executor", Some(planner_id.clone()), |span| {
        span.record_prompt("Search for quantum networking papers");
        span.record_model("gpt-4", 0.2);
        span.record_output("Found 3 relevant papers");
    });

    // Decisions routed through a recording runtime
    let recorder = FlowingRuntime::record(tracer.clone());
    let requests = vec![
        DecisionRequest::new("planner", "planner-0", "Decide what to research"),
        DecisionRequest::new("executor", "executor-0", "quantum networking").with_parent("planner-0"),
    ];
    for request in &requests {
        let output = recorder.decide(request, fake_model)?;
        println!("[record] {} -> {}", request.decision_id, output);
    }

    let export_path = config.trace_dir.join(format!("{}-decisions.json", store.trace_id()));
    tracer.export_json(&export_path)?;

    store.log("demo", "run_finished", serde_json::json!({"decisions": tracer.len()}), None);
    tracer.flush_into(&store);
    store.flush()?;
    println!("Trace written to {}", store.file_path().display());

    let replayer = FlowingRuntime::replay(&export_path)?;
    for request in &requests {
        let output = replayer.decide(request, |_| {
            Err(FlowingError::DecisionError("replay must not call the model".to_string()))
        })?;
        println!("[replay] {} -> {}", request.decision_id, output);
    }

    match replayer.decide(&DecisionRequest::new("planner", "planner-99", "?"), fake_model) {
        Err(err) if err.is_replay_miss() => println!("[replay] {}", err),
        other => println!("[replay] unexpected: {:?}", other),
    }

    Ok(())
}
