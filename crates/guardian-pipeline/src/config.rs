//! Pipeline tuning knobs, deserialised from the `[pipeline]` table of the
//! entry point's configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::DEFAULT_MAX_ITERATIONS;

/// Which validator every stage loop uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
  /// Output key present and non-blank.
  #[default]
  Presence,
  /// Presence plus the minimum-length and emergency-wording heuristics.
  Content,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// `app_name` column of persisted session state.
  pub app_name:              String,
  /// Generation attempts per stage before giving up. Values below 1 are
  /// treated as 1.
  pub max_iterations:        u32,
  /// Per-call limit on the generation collaborator. `None` waits forever.
  pub stage_timeout_secs:    Option<u64>,
  /// Flush the blackboard after every stage, not only at the end of a run.
  pub checkpoint_each_stage: bool,
  /// Append each validated stage output to the assessments log.
  pub persist_assessments:   bool,
  pub validation:            ValidationMode,
  /// Word threshold used by [`ValidationMode::Content`].
  pub min_words:             usize,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      app_name:              "health_guardian".to_owned(),
      max_iterations:        DEFAULT_MAX_ITERATIONS,
      stage_timeout_secs:    None,
      checkpoint_each_stage: true,
      persist_assessments:   true,
      validation:            ValidationMode::Presence,
      min_words:             50,
    }
  }
}

impl PipelineConfig {
  pub fn stage_timeout(&self) -> Option<Duration> {
    self.stage_timeout_secs.map(Duration::from_secs)
  }
}
