//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexicographic `ORDER BY` agrees with chronological order.
//! Enums use their snake_case names; payloads and state blobs are compact
//! JSON.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use guardian_core::{
  conversation::{ConversationMessage, Role},
  patient::{Patient, PatientId},
  record::HealthCategory,
  session::{SessionKey, SessionState},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_category(s: &str) -> Result<HealthCategory> {
  HealthCategory::from_str(s)
    .map_err(|_| guardian_core::Error::UnknownCategory(s.to_owned()).into())
}

pub fn decode_role(s: &str) -> Result<Role> {
  Role::from_str(s).map_err(|_| guardian_core::Error::UnknownRole(s.to_owned()).into())
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn encode_json(value: &serde_json::Value) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json(s: &str) -> Result<serde_json::Value> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawPatient::from_row`].
pub const PATIENT_COLUMNS: &str = "patient_id, name, phone, created_at, updated_at";

/// Raw strings read directly from a `patients` row.
pub struct RawPatient {
  pub patient_id: String,
  pub name:       Option<String>,
  pub phone:      Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawPatient {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      patient_id: row.get(0)?,
      name:       row.get(1)?,
      phone:      row.get(2)?,
      created_at: row.get(3)?,
      updated_at: row.get(4)?,
    })
  }

  pub fn into_patient(self) -> Result<Patient> {
    Ok(Patient {
      patient_id: PatientId::new(self.patient_id),
      name:       self.name,
      phone:      self.phone,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `conversations` row.
pub struct RawMessage {
  pub patient_id:      String,
  pub session_id:      String,
  pub message_type:    String,
  pub message_content: String,
  pub timestamp:       String,
}

impl RawMessage {
  pub fn into_message(self) -> Result<ConversationMessage> {
    Ok(ConversationMessage {
      patient_id: PatientId::new(self.patient_id),
      session_id: self.session_id,
      role:       decode_role(&self.message_type)?,
      content:    self.message_content,
      timestamp:  decode_dt(&self.timestamp)?,
    })
  }
}

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub state_json:  String,
  pub create_time: String,
  pub update_time: String,
}

impl RawSession {
  pub fn into_state(self, key: SessionKey) -> Result<SessionState> {
    Ok(SessionState {
      key,
      state: decode_json(&self.state_json)?,
      create_time: decode_dt(&self.create_time)?,
      update_time: decode_dt(&self.update_time)?,
    })
  }
}
