//! The text-generation collaborator.
//!
//! The pipeline treats generation as an opaque blocking round-trip: a
//! request goes in, text comes out. Whatever the collaborator does in
//! between (model calls, nested web searches) is invisible here, and no
//! streaming or partial-result contract is assumed.

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Result;

/// Everything a stage hands to the generator for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
  /// Id of the calling stage, e.g. `"assess"`.
  pub stage:       String,
  pub instruction: String,
  /// Blackboard snapshot restricted to the keys the stage reads.
  pub context:     Map<String, Value>,
}

pub trait Generator: Send + Sync {
  /// Produce text for `request`. Failures surface as
  /// [`Error::Generation`](crate::Error::Generation); the calling loop counts
  /// them as a failed attempt.
  fn generate(
    &self,
    request: GenerationRequest,
  ) -> impl Future<Output = Result<String>> + Send + '_;
}
