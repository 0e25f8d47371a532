//! The retry-validation loop.
//!
//! ```text
//!            ┌──────── validator rejects, budget left ────────┐
//!            ▼                                                │
//!   Running(i) ── stage.run ── validator.check ──────────────┘
//!            │                        │
//!            │ accepts                │ rejects, budget spent
//!            ▼                        ▼
//!   Terminated(Escalated)   Terminated(Incomplete)
//! ```
//!
//! Exhausting the budget is not an error: the pipeline moves on with
//! whatever the blackboard holds. The outcome is reported so callers can tell
//! the two terminations apart.

use std::time::Duration;

use serde::Serialize;

use crate::{
  Error, Result,
  blackboard::Blackboard,
  stage::Stage,
  validator::Validator,
};

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

// ─── Outcome ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
  /// The validator accepted the stage output.
  Escalated,
  /// The iteration budget ran out without acceptance.
  Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
  Running { iteration: u32 },
  Terminated { outcome: LoopOutcome, iterations: u32 },
}

/// What happened to one stage's loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopReport {
  pub stage:      String,
  pub output_key: String,
  pub outcome:    LoopOutcome,
  /// Generation attempts made, including failed ones.
  pub iterations: u32,
  /// Stage errors (generation failures, timeouts) in attempt order.
  pub errors:     Vec<String>,
}

impl LoopReport {
  pub fn escalated(&self) -> bool { self.outcome == LoopOutcome::Escalated }
}

// ─── Loop ────────────────────────────────────────────────────────────────────

pub struct RetryLoop<T> {
  stage:          T,
  validator:      Validator,
  max_iterations: u32,
  timeout:        Option<Duration>,
}

impl<T: Stage> RetryLoop<T> {
  pub fn new(stage: T, validator: Validator) -> Self {
    Self {
      stage,
      validator,
      max_iterations: DEFAULT_MAX_ITERATIONS,
      timeout: None,
    }
  }

  /// Set the iteration budget. Values below 1 are raised to 1.
  pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
    self.max_iterations = max_iterations.max(1);
    self
  }

  /// Bound each stage attempt. A timed-out attempt counts as a failure.
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn stage(&self) -> &T { &self.stage }

  pub fn max_iterations(&self) -> u32 { self.max_iterations }

  /// Drive the stage until the validator accepts or the budget is spent.
  ///
  /// The output key is cleared first so a value left over from an earlier
  /// turn cannot pass validation on its own.
  pub async fn run(&self, board: &mut Blackboard) -> LoopReport {
    let stage_id = self.stage.id();
    let output_key = self.stage.output_key();
    board.clear(output_key);

    let mut errors = Vec::new();
    let mut state = LoopState::Running { iteration: 1 };

    let (outcome, iterations) = loop {
      state = match state {
        LoopState::Running { iteration } => {
          tracing::debug!(stage = stage_id, iteration, "running stage");

          if let Err(e) = self.attempt(board).await {
            tracing::warn!(stage = stage_id, iteration, error = %e, "stage attempt failed");
            errors.push(e.to_string());
          }

          if self.validator.check(board) {
            LoopState::Terminated { outcome: LoopOutcome::Escalated, iterations: iteration }
          } else if iteration >= self.max_iterations {
            LoopState::Terminated { outcome: LoopOutcome::Incomplete, iterations: iteration }
          } else {
            tracing::debug!(
              stage = stage_id,
              validator = self.validator.name(),
              "output rejected; retrying"
            );
            LoopState::Running { iteration: iteration + 1 }
          }
        }
        LoopState::Terminated { outcome, iterations } => break (outcome, iterations),
      };
    };

    match outcome {
      LoopOutcome::Escalated => {
        tracing::info!(stage = stage_id, iterations, "stage output accepted");
      }
      LoopOutcome::Incomplete => {
        tracing::warn!(stage = stage_id, iterations, "stage gave up without valid output");
      }
    }

    LoopReport {
      stage: stage_id.to_owned(),
      output_key: output_key.to_string(),
      outcome,
      iterations,
      errors,
    }
  }

  async fn attempt(&self, board: &mut Blackboard) -> Result<()> {
    match self.timeout {
      Some(after) => tokio::time::timeout(after, self.stage.run(board))
        .await
        .map_err(|_| Error::Timeout { stage: self.stage.id().to_owned(), after })?,
      None => self.stage.run(board).await,
    }
  }
}
