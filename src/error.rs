//! Error types and result aliases for the Flowing library.
//!
//! This module defines the core error type [`FlowingError`] and the [`Result`] type alias
//! used throughout the library. Recording operations (`record`, `log`) never fail; only
//! durable flush/export, replay lookup and the network-facing collaborators return errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowingError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Decision {decision_id} not found in trace")]
    ReplayMiss { decision_id: String },

    #[error("Failed to write trace file {path:?}: {source}")]
    TraceWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decision source error: {0}")]
    DecisionError(String),

    #[error("LLM gateway error: {0}")]
    GatewayError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FlowingError {
    /// True for a replay lookup that found no recorded decision
    pub fn is_replay_miss(&self) -> bool {
        matches!(self, FlowingError::ReplayMiss { .. })
    }
}

pub type Result<T> = std::result::Result<T, FlowingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = FlowingError::ConfigError("trace_path required in replay mode".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: trace_path required in replay mode");
    }

    #[test]
    fn test_replay_miss_display() {
        let err = FlowingError::ReplayMiss {
            decision_id: "zzz".to_string(),
        };
        assert_eq!(err.to_string(), "Decision zzz not found in trace");
        assert!(err.is_replay_miss());
    }

    #[test]
    fn test_trace_write_error_display() {
        let err = FlowingError::TraceWriteError {
            path: PathBuf::from("traces/abc.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        let msg = err.to_string();
        assert!(msg.contains("traces/abc.json"));
        assert!(msg.contains("read-only"));
        assert!(!err.is_replay_miss());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: FlowingError = json_err.into();

        match err {
            FlowingError::SerializationError(_) => {}
            _ => panic!("Expected SerializationError"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FlowingError = io_err.into();

        match err {
            FlowingError::IoError(_) => {}
            _ => panic!("Expected IoError"),
        }
    }

    #[test]
    fn test_error_debug() {
        let err = FlowingError::DecisionError("model offline".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("DecisionError"));
    }
}
