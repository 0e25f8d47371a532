//! Error type for `guardian-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] guardian_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row expected to exist right after a write could not be read back.
  #[error("patient vanished after write: {0}")]
  PatientVanished(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
