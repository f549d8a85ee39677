//! Hosted model client
//!
//! Thin client for a Hugging Face style inference API where every model
//! is addressed as `{base_url}/{model_id}` and takes `{"inputs": ...}`.
//!
//! Author: hephaex@gmail.com

use std::time::Duration;

use kgb_core::{InferenceConfig, KgbError, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

/// Request body accepted by the inference API
#[derive(Debug, Serialize)]
struct InferenceRequest<'a, P: Serialize> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<P>,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    /// Block until a cold model is loaded instead of returning 503
    wait_for_model: bool,
}

/// Inference API client
pub struct InferenceClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl InferenceClient {
    /// Create a new inference client
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KgbError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Create from config
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Full URL for a model
    pub fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model.trim_start_matches('/'))
    }

    /// Run a model on `inputs` and return the raw JSON output
    pub async fn infer<P: Serialize>(
        &self,
        model: &str,
        inputs: &str,
        parameters: Option<P>,
    ) -> Result<Value> {
        let request = InferenceRequest {
            inputs,
            parameters,
            options: InferenceOptions {
                wait_for_model: true,
            },
        };

        let mut builder = self.client.post(self.model_url(model)).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| KgbError::Inference(format!("Request to {model} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(KgbError::Inference(format!(
                "{model} returned {status}: {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KgbError::Inference(format!("Failed to parse {model} response: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
