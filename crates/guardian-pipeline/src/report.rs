//! The consolidated health report written at the end of every run.

use std::{fmt::Write as _, path::Path};

use chrono::{DateTime, SecondsFormat, Utc};
use guardian_core::patient::PatientId;
use serde::Serialize;

use crate::{
  Result,
  blackboard::{Blackboard, BlackboardKey},
  retry::LoopReport,
};

const SECTIONS: [(&str, BlackboardKey); 4] = [
  ("Health Status Summary", BlackboardKey::HealthDataSummary),
  ("Risk Assessment", BlackboardKey::RiskAssessment),
  ("Health Education", BlackboardKey::EducationContent),
  ("Care Plan", BlackboardKey::CarePlan),
];

const DISCLAIMER: &str = "This report is generated automatically and is not a \
  substitute for professional medical advice. Contact your healthcare provider \
  with any questions, and seek immediate care in an emergency.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
  pub title: String,
  /// `None` when the producing stage left nothing on the board.
  pub body:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
  pub patient_id:   Option<PatientId>,
  pub generated_at: DateTime<Utc>,
  pub sections:     Vec<ReportSection>,
  /// Ids of stages whose loop ended without valid output.
  pub incomplete:   Vec<String>,
}

impl HealthReport {
  /// Build the report from whatever the board holds, complete or not.
  pub fn assemble(board: &Blackboard, stages: &[LoopReport]) -> Self {
    let sections = SECTIONS
      .iter()
      .map(|&(title, key)| ReportSection {
        title: title.to_owned(),
        body:  board
          .text(key)
          .map(str::trim)
          .filter(|t| !t.is_empty())
          .map(str::to_owned),
      })
      .collect();

    let incomplete = stages
      .iter()
      .filter(|r| !r.escalated())
      .map(|r| r.stage.clone())
      .collect();

    Self {
      patient_id: board.patient_id.clone(),
      generated_at: Utc::now(),
      sections,
      incomplete,
    }
  }

  pub fn is_complete(&self) -> bool { self.incomplete.is_empty() }

  pub fn to_markdown(&self) -> String {
    let mut out = String::from("# Health Report\n\n");

    if let Some(id) = &self.patient_id {
      let _ = writeln!(out, "**Patient:** {id}  ");
    }
    let _ = writeln!(
      out,
      "**Generated:** {}\n",
      self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    if !self.is_complete() {
      let _ = writeln!(
        out,
        "> Some sections may be incomplete. Stages without validated output: {}.\n",
        self.incomplete.join(", ")
      );
    }

    for section in &self.sections {
      let _ = writeln!(out, "## {}\n", section.title);
      match &section.body {
        Some(body) => {
          let _ = writeln!(out, "{body}\n");
        }
        None => out.push_str("_No content was produced for this section._\n\n"),
      }
    }

    let _ = writeln!(out, "---\n\n_{DISCLAIMER}_");
    out
  }
}

/// Write `content` to `path`, replacing any existing file.
pub async fn write_report(path: impl AsRef<Path>, content: &str) -> Result<()> {
  let path = path.as_ref();
  tokio::fs::write(path, content).await?;
  tracing::info!(path = %path.display(), bytes = content.len(), "report written");
  Ok(())
}
