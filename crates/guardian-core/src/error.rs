//! Error types for `guardian-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed patient id: {0:?}")]
  MalformedIdentifier(String),

  #[error("unknown health record category: {0:?}")]
  UnknownCategory(String),

  #[error("unknown message role: {0:?}")]
  UnknownRole(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
