use crate::error::{FlowingError, Result};
use crate::llm::decision_source::DecisionSource;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Configuration for connecting to Ollama server
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Option<std::time::Duration>,
    pub headers: HashMap<String, String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: "llama3.2".to_string(),
            temperature: 1.0,
            timeout: None,
            headers: HashMap::new(),
        }
    }
}

/// Decision source backed by a local Ollama chat model
///
/// Each prompt is sent as a single user message to `/api/chat` with streaming
/// disabled; the assistant message content is the decision output.
pub struct OllamaDecisionSource {
    client: Client,
    config: OllamaConfig,
}

impl OllamaDecisionSource {
    /// Create a source with custom configuration
    pub fn with_config(config: OllamaConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create source for `model` on a custom host
    pub fn with_host(host: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_config(OllamaConfig {
            host: host.into(),
            model: model.into(),
            ..Default::default()
        })
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

#[async_trait]
impl DecisionSource for OllamaDecisionSource {
    async fn decide(&self, prompt: &str) -> Result<String> {
        info!("Delegating decision to Ollama");
        debug!("Model: {}, Prompt length: {}", self.config.model, prompt.len());

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "options": {"temperature": self.config.temperature},
            "stream": false
        });

        let mut request = self.client.post(format!("{}/api/chat", self.config.host)).json(&body);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FlowingError::GatewayError(format!(
                "Ollama API error: {}",
                response.status()
            )));
        }

        let response_body: Value = response.json().await?;

        response_body["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| FlowingError::GatewayError("No content in response".to_string()))
    }

    fn model(&self) -> Option<(&str, f64)> {
        Some((self.config.model.as_str(), self.config.temperature))
    }
}
