//! Agent-to-agent communication client
//!
//! Sends messages and tasks to other agents' HTTP endpoints with bounded
//! retries, exponential backoff and a per-attempt timeout. Exhausted retries
//! are reported as a [`Delivery::Failed`] value rather than an error, so a
//! flaky peer never aborts the caller. When a [`TraceStore`] is attached each
//! delivery outcome is logged to it.

use crate::error::{FlowingError, Result};
use crate::tracer::TraceStore;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Retry and timeout settings
#[derive(Debug, Clone)]
pub struct CommunicationConfig {
    /// Maximum number of attempts per delivery
    pub max_retries: u32,
    /// Timeout applied to each attempt
    pub timeout: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Wait before the second attempt; later waits grow by `backoff_factor`
    pub backoff_unit: Duration,
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(5),
            backoff_factor: 2.0,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Outcome of a delivery, serialized as `{"status": "ok" | "failed", ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Delivery {
    Ok { response: Value },
    Failed { error: String },
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        matches!(self, Delivery::Ok { .. })
    }
}

/// HTTP client for talking to other agents
pub struct CommunicationClient {
    client: Client,
    config: CommunicationConfig,
    trace_store: Option<Arc<TraceStore>>,
}

impl CommunicationClient {
    /// Create a client with default retry settings
    pub fn new() -> Result<Self> {
        Self::with_config(CommunicationConfig::default())
    }

    /// Create a client; a negative or non-finite `backoff_factor` is a config error
    pub fn with_config(config: CommunicationConfig) -> Result<Self> {
        if !config.backoff_factor.is_finite() || config.backoff_factor < 0.0 {
            return Err(FlowingError::ConfigError(format!(
                "backoff_factor must be finite and non-negative, got {}",
                config.backoff_factor
            )));
        }

        Ok(Self {
            client: Client::builder().build()?,
            config,
            trace_store: None,
        })
    }

    /// Log every delivery outcome to `store`
    pub fn with_trace_store(mut self, store: Arc<TraceStore>) -> Self {
        self.trace_store = Some(store);
        self
    }

    pub fn config(&self) -> &CommunicationConfig {
        &self.config
    }

    /// Send a message to `{target_url}/receive_message`
    pub async fn send_message(&self, target_url: &str, message: &str, sender_name: &str) -> Delivery {
        let body = json!({"message": message, "sender": sender_name});
        let url = format!("{}/receive_message", target_url);
        let (delivery, attempts) = self.post_with_retries(&url, &body).await;

        if delivery.is_ok() {
            info!("[{}] Message sent to {}", sender_name, target_url);
        }
        self.trace_delivery(sender_name, "message_sent", target_url, attempts, &delivery);
        delivery
    }

    /// Send a priced task to `{target_url}/run_task`
    pub async fn send_task(
        &self,
        target_url: &str,
        description: &str,
        price: f64,
        sender_name: &str,
    ) -> Delivery {
        let body = json!({"description": description, "price": price, "sender": sender_name});
        let url = format!("{}/run_task", target_url);
        let (delivery, attempts) = self.post_with_retries(&url, &body).await;

        if delivery.is_ok() {
            info!("[{}] Task sent to {}", sender_name, target_url);
        }
        self.trace_delivery(sender_name, "task_sent", target_url, attempts, &delivery);
        delivery
    }

    /// True when `{target_url}/identity` answers 200 within `timeout`
    pub async fn health_check(&self, target_url: &str, timeout: Duration) -> bool {
        match self
            .client
            .get(format!("{}/identity", target_url))
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn post_with_retries(&self, url: &str, body: &Value) -> (Delivery, u32) {
        let max_retries = self.config.max_retries.max(1);

        for attempt in 0..max_retries {
            match self.post_once(url, body).await {
                Ok(response) => return (Delivery::Ok { response }, attempt + 1),
                Err(err) => {
                    let kind = if err.is_timeout() {
                        "Timeout"
                    } else if err.is_connect() {
                        "Connection error"
                    } else {
                        "Error"
                    };
                    warn!("{} on attempt {}/{} to {}: {}", kind, attempt + 1, max_retries, url, err);
                }
            }

            if attempt + 1 < max_retries {
                let wait = self.backoff(attempt);
                info!("Waiting {:?} before retry", wait);
                tokio::time::sleep(wait).await;
            }
        }

        (
            Delivery::Failed {
                error: "Max retries exceeded".to_string(),
            },
            max_retries,
        )
    }

    async fn post_once(&self, url: &str, body: &Value) -> reqwest::Result<Value> {
        self.client
            .post(url)
            .json(body)
            .timeout(self.config.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Wait before retrying after `attempt`; falls back to `backoff_unit` on overflow
    fn backoff(&self, attempt: u32) -> Duration {
        let unit = self.config.backoff_unit;
        let scale = self.config.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(unit.as_secs_f64() * scale).unwrap_or(unit)
    }

    fn trace_delivery(
        &self,
        sender_name: &str,
        event_type: &str,
        target_url: &str,
        attempts: u32,
        delivery: &Delivery,
    ) {
        if let Some(store) = &self.trace_store {
            let mut payload = json!({"target": target_url, "attempts": attempts});
            if let (Value::Object(fields), Ok(Value::Object(outcome))) =
                (&mut payload, serde_json::to_value(delivery))
            {
                if let Some(status) = outcome.get("status") {
                    fields.insert("status".to_string(), status.clone());
                }
                if let Some(error) = outcome.get("error") {
                    fields.insert("error".to_string(), error.clone());
                }
            }
            store.log(sender_name, event_type, payload, None);
        }
    }
}
