//! Runtime configuration for the `guardian` binary.

use std::path::PathBuf;

use guardian_pipeline::PipelineConfig;
use serde::Deserialize;

/// Deserialised from `guardian.toml` layered with `GUARDIAN_*` environment
/// variables (nested keys use `__`, e.g. `GUARDIAN_GENERATOR__ENDPOINT`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
  pub generator:  GeneratorConfig,
  pub pipeline:   PipelineConfig,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("guardian.db"),
      generator:  GeneratorConfig::default(),
      pipeline:   PipelineConfig::default(),
    }
  }
}

/// Where the text-generation service lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
  /// Full URL that accepts `POST` generation requests.
  pub endpoint:     String,
  /// Passed through to the service verbatim.
  pub model:        String,
  /// HTTP-level timeout for one request.
  pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
  fn default() -> Self {
    Self {
      endpoint:     "http://localhost:8080/generate".to_owned(),
      model:        "default".to_owned(),
      timeout_secs: 120,
    }
  }
}
