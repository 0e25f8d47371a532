//! The blackboard: shared state for one pipeline run.
//!
//! One optional field per well-known key replaces a free-form dictionary, so
//! a renamed or misspelt key is a compile error rather than a silent miss.
//! Keys written by older versions and unknown to this one survive a
//! hydrate/flush cycle through [`Blackboard::extra`].

use chrono::{DateTime, Utc};
use guardian_core::{
  conversation::{ConversationMessage, Role},
  patient::PatientId,
  record::AssessmentKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::Result;

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Names of the blackboard slots, matching their keys in the persisted blob.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum BlackboardKey {
  PatientId,
  PatientName,
  PatientPhone,
  UserMessage,
  ConversationHistory,
  HealthData,
  HealthDataSummary,
  RiskAssessment,
  EducationContent,
  CarePlan,
  HealthReport,
}

impl BlackboardKey {
  /// Whether the slot holds free text (and so can be a stage output).
  pub fn is_text(self) -> bool {
    !matches!(self, Self::PatientId | Self::ConversationHistory | Self::HealthData)
  }
}

impl From<AssessmentKind> for BlackboardKey {
  fn from(kind: AssessmentKind) -> Self {
    match kind {
      AssessmentKind::RiskAssessment => Self::RiskAssessment,
      AssessmentKind::EducationContent => Self::EducationContent,
      AssessmentKind::CarePlan => Self::CarePlan,
    }
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// One line of the conversation transcript as seen by the stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub role:      Role,
  pub content:   String,
  pub timestamp: DateTime<Utc>,
}

impl From<ConversationMessage> for HistoryEntry {
  fn from(m: ConversationMessage) -> Self {
    Self { role: m.role, content: m.content, timestamp: m.timestamp }
  }
}

/// What the monitor stage fetched for the patient: either the latest record
/// per category or a sentinel asking the patient to supply data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthData {
  Records(Map<String, Value>),
  Unavailable(String),
}

impl HealthData {
  /// Sentinel text handed to the generator when nothing is on file.
  pub const UNAVAILABLE: &'static str = "No health data is on file for this patient yet. \
     Ask them to share vital signs, lab results, medications and conditions, \
     as text or as images of their reports.";

  pub fn unavailable() -> Self { Self::Unavailable(Self::UNAVAILABLE.to_owned()) }

  pub fn is_available(&self) -> bool { matches!(self, Self::Records(_)) }

  fn to_value(&self) -> Value {
    match self {
      Self::Records(map) => Value::Object(map.clone()),
      Self::Unavailable(text) => Value::String(text.clone()),
    }
  }
}

// ─── Tolerant decoding ───────────────────────────────────────────────────────

fn take<T: DeserializeOwned>(map: &mut Map<String, Value>, key: BlackboardKey) -> Option<T> {
  match map.remove(key.as_ref())? {
    Value::Null => None,
    raw => decode(key, raw),
  }
}

fn decode<T: DeserializeOwned>(key: BlackboardKey, raw: Value) -> Option<T> {
  serde_json::from_value(raw)
    .inspect_err(|e| tracing::warn!(%key, error = %e, "dropping unreadable blackboard value"))
    .ok()
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

// ─── Blackboard ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blackboard {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_id:           Option<PatientId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_name:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub patient_phone:        Option<String>,
  /// The raw input of the current turn.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_message:         Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub conversation_history: Vec<HistoryEntry>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub health_data:          Option<HealthData>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub health_data_summary:  Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub risk_assessment:      Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub education_content:    Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub care_plan:            Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub health_report:        Option<String>,
  /// Persisted keys this version does not know about, kept verbatim.
  #[serde(flatten)]
  pub extra:                Map<String, Value>,
}

impl Blackboard {
  pub fn new() -> Self { Self::default() }

  /// Rebuild a board from a persisted state blob. A non-object blob yields
  /// an empty board.
  ///
  /// Each known key is decoded on its own: a value of the wrong shape is
  /// dropped with a warning and the rest of the board survives. History
  /// entries are decoded one by one. Unknown keys land in `extra`.
  pub fn from_value(value: Value) -> Self {
    let Value::Object(mut map) = value else {
      return Self::default();
    };

    let conversation_history = match map.remove(BlackboardKey::ConversationHistory.as_ref()) {
      Some(Value::Array(items)) => items
        .into_iter()
        .filter_map(|item| decode(BlackboardKey::ConversationHistory, item))
        .collect(),
      Some(Value::Null) | None => Vec::new(),
      Some(other) => {
        tracing::warn!(kind = %json_kind(&other), "dropping non-list conversation_history");
        Vec::new()
      }
    };

    Self {
      patient_id: take(&mut map, BlackboardKey::PatientId),
      patient_name: take(&mut map, BlackboardKey::PatientName),
      patient_phone: take(&mut map, BlackboardKey::PatientPhone),
      user_message: take(&mut map, BlackboardKey::UserMessage),
      conversation_history,
      health_data: take(&mut map, BlackboardKey::HealthData),
      health_data_summary: take(&mut map, BlackboardKey::HealthDataSummary),
      risk_assessment: take(&mut map, BlackboardKey::RiskAssessment),
      education_content: take(&mut map, BlackboardKey::EducationContent),
      care_plan: take(&mut map, BlackboardKey::CarePlan),
      health_report: take(&mut map, BlackboardKey::HealthReport),
      extra: map,
    }
  }

  /// Serialise the whole board as a single blob for session state.
  pub fn to_value(&self) -> Result<Value> { Ok(serde_json::to_value(self)?) }

  fn text_slot(&self, key: BlackboardKey) -> Option<&Option<String>> {
    match key {
      BlackboardKey::PatientName => Some(&self.patient_name),
      BlackboardKey::PatientPhone => Some(&self.patient_phone),
      BlackboardKey::UserMessage => Some(&self.user_message),
      BlackboardKey::HealthDataSummary => Some(&self.health_data_summary),
      BlackboardKey::RiskAssessment => Some(&self.risk_assessment),
      BlackboardKey::EducationContent => Some(&self.education_content),
      BlackboardKey::CarePlan => Some(&self.care_plan),
      BlackboardKey::HealthReport => Some(&self.health_report),
      BlackboardKey::PatientId
      | BlackboardKey::ConversationHistory
      | BlackboardKey::HealthData => None,
    }
  }

  fn text_slot_mut(&mut self, key: BlackboardKey) -> Option<&mut Option<String>> {
    match key {
      BlackboardKey::PatientName => Some(&mut self.patient_name),
      BlackboardKey::PatientPhone => Some(&mut self.patient_phone),
      BlackboardKey::UserMessage => Some(&mut self.user_message),
      BlackboardKey::HealthDataSummary => Some(&mut self.health_data_summary),
      BlackboardKey::RiskAssessment => Some(&mut self.risk_assessment),
      BlackboardKey::EducationContent => Some(&mut self.education_content),
      BlackboardKey::CarePlan => Some(&mut self.care_plan),
      BlackboardKey::HealthReport => Some(&mut self.health_report),
      BlackboardKey::PatientId
      | BlackboardKey::ConversationHistory
      | BlackboardKey::HealthData => None,
    }
  }

  /// The text stored under `key`, if it is a text slot and set.
  pub fn text(&self, key: BlackboardKey) -> Option<&str> {
    self.text_slot(key).and_then(|slot| slot.as_deref())
  }

  /// Store `value` under a text key. Returns `false` (and changes nothing)
  /// for keys that do not hold text.
  pub fn set_text(&mut self, key: BlackboardKey, value: impl Into<String>) -> bool {
    match self.text_slot_mut(key) {
      Some(slot) => {
        *slot = Some(value.into());
        true
      }
      None => false,
    }
  }

  /// Reset a slot to its empty state.
  pub fn clear(&mut self, key: BlackboardKey) {
    match key {
      BlackboardKey::PatientId => self.patient_id = None,
      BlackboardKey::ConversationHistory => self.conversation_history.clear(),
      BlackboardKey::HealthData => self.health_data = None,
      text => {
        if let Some(slot) = self.text_slot_mut(text) {
          *slot = None;
        }
      }
    }
  }

  /// Whether `key` holds a non-empty value. Whitespace-only text counts as
  /// empty.
  pub fn is_populated(&self, key: BlackboardKey) -> bool {
    match key {
      BlackboardKey::PatientId => {
        self.patient_id.as_ref().is_some_and(|id| !id.as_str().trim().is_empty())
      }
      BlackboardKey::ConversationHistory => !self.conversation_history.is_empty(),
      BlackboardKey::HealthData => match &self.health_data {
        Some(HealthData::Records(map)) => !map.is_empty(),
        Some(HealthData::Unavailable(text)) => !text.trim().is_empty(),
        None => false,
      },
      text => self.text(text).is_some_and(|t| !t.trim().is_empty()),
    }
  }

  fn value_of(&self, key: BlackboardKey) -> Option<Value> {
    match key {
      BlackboardKey::PatientId => {
        self.patient_id.as_ref().map(|id| Value::String(id.to_string()))
      }
      BlackboardKey::ConversationHistory => {
        if self.conversation_history.is_empty() {
          None
        } else {
          serde_json::to_value(&self.conversation_history).ok()
        }
      }
      BlackboardKey::HealthData => self.health_data.as_ref().map(HealthData::to_value),
      text => self.text(text).map(|t| Value::String(t.to_owned())),
    }
  }

  /// A read-only view of just the listed keys, as handed to the generator.
  /// Unset keys are left out.
  pub fn snapshot(&self, keys: &[BlackboardKey]) -> Map<String, Value> {
    keys
      .iter()
      .filter_map(|&key| self.value_of(key).map(|v| (key.to_string(), v)))
      .collect()
  }
}
