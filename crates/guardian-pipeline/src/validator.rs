//! Output validators for the retry loop.
//!
//! A validator is a named predicate over the blackboard. The loop only asks
//! "accept or retry?", so stronger checks can be swapped in without touching
//! loop mechanics.

use std::{fmt, sync::Arc};

use crate::blackboard::{Blackboard, BlackboardKey};

type Check = dyn Fn(&Blackboard) -> bool + Send + Sync;

#[derive(Clone)]
pub struct Validator {
  name:  String,
  check: Arc<Check>,
}

impl fmt::Debug for Validator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Validator").field("name", &self.name).finish_non_exhaustive()
  }
}

impl Validator {
  pub fn new(
    name: impl Into<String>,
    check: impl Fn(&Blackboard) -> bool + Send + Sync + 'static,
  ) -> Self {
    Self { name: name.into(), check: Arc::new(check) }
  }

  /// Accepts once `key` holds a non-blank value. Says nothing about quality.
  pub fn presence(key: BlackboardKey) -> Self {
    Self::new(format!("{key}_present"), move |board| board.is_populated(key))
  }

  /// Presence plus [`review_content`] over the text under `key`.
  pub fn content(key: BlackboardKey, min_words: usize) -> Self {
    Self::new(format!("{key}_content"), move |board| {
      board
        .text(key)
        .is_some_and(|text| review_content(text, min_words).is_valid())
    })
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn check(&self, board: &Blackboard) -> bool { (self.check)(board) }
}

// ─── Content heuristics ──────────────────────────────────────────────────────

/// Findings of [`review_content`]. Empty means the text passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentReview {
  pub flags: Vec<String>,
}

impl ContentReview {
  pub fn is_valid(&self) -> bool { self.flags.is_empty() }
}

/// Surface checks on generated medical text: long enough to be useful, and
/// any mention of an emergency comes with an instruction to seek immediate
/// care. These are length and wording heuristics, not a safety review.
pub fn review_content(text: &str, min_words: usize) -> ContentReview {
  let mut flags = Vec::new();
  let lower = text.to_lowercase();

  if text.trim().is_empty() {
    flags.push("content is empty".to_owned());
  } else if text.split_whitespace().count() < min_words {
    flags.push(format!("content is shorter than {min_words} words"));
  }
  if lower.contains("emergency") && !lower.contains("seek immediate") {
    flags.push("emergency mentioned without advice to seek immediate care".to_owned());
  }

  ContentReview { flags }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn presence_accepts_non_blank_text() {
    let v = Validator::presence(BlackboardKey::RiskAssessment);
    let mut board = Blackboard::new();
    assert!(!v.check(&board));
    board.set_text(BlackboardKey::RiskAssessment, " ");
    assert!(!v.check(&board));
    board.set_text(BlackboardKey::RiskAssessment, "low risk");
    assert!(v.check(&board));
    assert_eq!(v.name(), "risk_assessment_present");
  }

  #[test]
  fn content_requires_length() {
    let v = Validator::content(BlackboardKey::CarePlan, 5);
    let mut board = Blackboard::new();
    board.set_text(BlackboardKey::CarePlan, "walk more");
    assert!(!v.check(&board));
    board.set_text(BlackboardKey::CarePlan, "walk thirty minutes every single day");
    assert!(v.check(&board));
  }

  #[test]
  fn emergency_needs_escalation_advice() {
    let flagged = review_content("This could be an emergency.", 1);
    assert_eq!(flagged.flags.len(), 1);

    let ok = review_content("If this is an emergency, seek immediate care.", 1);
    assert!(ok.is_valid());
  }
}
