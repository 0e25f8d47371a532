//! Persisted session-state blobs.
//!
//! One row per `(app_name, user_id, session_id)`. The state is replaced as a
//! whole on every write; there is no field-level merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unique key of a session row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
  pub app_name:   String,
  pub user_id:    String,
  pub session_id: String,
}

impl SessionKey {
  pub fn new(
    app_name: impl Into<String>,
    user_id: impl Into<String>,
    session_id: impl Into<String>,
  ) -> Self {
    Self {
      app_name:   app_name.into(),
      user_id:    user_id.into(),
      session_id: session_id.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
  pub key:         SessionKey,
  pub state:       serde_json::Value,
  pub create_time: DateTime<Utc>,
  pub update_time: DateTime<Utc>,
}
