//! Conversation transcript entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::patient::PatientId;

/// Who authored a message. Stored in the `message_type` column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  User,
  Agent,
}

/// One transcript line. History is ordered by `timestamp` ascending; rows
/// with equal timestamps keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
  pub patient_id: PatientId,
  pub session_id: String,
  pub role:       Role,
  pub content:    String,
  pub timestamp:  DateTime<Utc>,
}
