//! Print a stored trace in timestamp order
//!
//! # Running the example
//!
//! ```bash
//! cargo run --example show_trace -- <trace_id>
//! ```
//!
//! Traces are read from `FLOWING_TRACE_DIR` (default `traces`).

use flowing::tracer::{TraceStore, TraceStoreConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: show_trace <trace_id>");
        std::process::exit(1);
    }
    let trace_id = &args[1];

    let config = TraceStoreConfig::default();
    if !config.trace_path(trace_id).exists() {
        println!("Trace {} not found.", trace_id);
        return Ok(());
    }

    let mut events = TraceStore::load(&config, trace_id)?;
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    println!();
    println!("Trace ID: {}", trace_id);
    println!("{}", "=".repeat(60));

    for event in &events {
        println!();
        println!("{}", event.printable_summary());
    }

    println!();
    println!("End of trace ({} events)", events.len());
    Ok(())
}
