//! Health records and assessments.
//!
//! Neither table is ever updated. The "current" value of a category (or the
//! "latest" assessment of a kind) is a view computed at read time from the
//! newest row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::patient::PatientId;

// ─── Category ────────────────────────────────────────────────────────────────

/// The kind of health data a record holds. The snake_case form is the
/// `data_type` column value.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HealthCategory {
  VitalSigns,
  LabResults,
  Medications,
  Conditions,
}

/// One recorded payload for a category. The payload is arbitrary JSON as
/// supplied by the patient or extracted from their documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
  pub patient_id:  PatientId,
  pub category:    HealthCategory,
  pub payload:     serde_json::Value,
  /// Server-assigned; never changes after creation.
  pub recorded_at: DateTime<Utc>,
}

// ─── Assessment ──────────────────────────────────────────────────────────────

/// The pipeline output an assessment row stores.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssessmentKind {
  RiskAssessment,
  EducationContent,
  CarePlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
  pub patient_id: PatientId,
  pub kind:       AssessmentKind,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}
