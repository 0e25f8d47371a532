//! HTTP adapter for the text-generation service.
//!
//! Each request is a `POST` of
//! `{"model", "stage", "instruction", "context"}` to the configured endpoint;
//! the service answers `{"text": "..."}`.

use std::time::Duration;

use guardian_pipeline::{Error, GenerationRequest, Generator, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;

#[derive(Serialize)]
struct GenerateBody<'a> {
  model:   &'a str,
  #[serde(flatten)]
  request: &'a GenerationRequest,
}

#[derive(Deserialize)]
struct GenerateResponse {
  text: String,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpGenerator {
  client: Client,
  config: GeneratorConfig,
}

impl HttpGenerator {
  pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
    use anyhow::Context as _;

    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }
}

impl Generator for HttpGenerator {
  async fn generate(&self, request: GenerationRequest) -> Result<String> {
    let body = GenerateBody { model: &self.config.model, request: &request };

    let resp = self
      .client
      .post(&self.config.endpoint)
      .json(&body)
      .send()
      .await
      .map_err(|e| Error::Generation(format!("POST {} failed: {e}", self.config.endpoint)))?;

    if !resp.status().is_success() {
      return Err(Error::Generation(format!(
        "POST {} → {}",
        self.config.endpoint,
        resp.status()
      )));
    }

    let reply: GenerateResponse = resp
      .json()
      .await
      .map_err(|e| Error::Generation(format!("deserialising reply: {e}")))?;
    tracing::debug!(stage = %request.stage, chars = reply.text.len(), "generation reply");
    Ok(reply.text)
  }
}
