//! Error type for `guardian-pipeline`.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("generation failed: {0}")]
  Generation(String),

  #[error("stage {stage} timed out after {after:?}")]
  Timeout { stage: String, after: Duration },

  /// A stage tried to write its output under a key that does not hold text.
  #[error("blackboard key {0} does not hold text")]
  NotATextKey(String),

  #[error("no patient id, name or phone supplied")]
  MissingIdentity,

  #[error("core error: {0}")]
  Core(#[from] guardian_core::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
