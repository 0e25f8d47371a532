//! Pipeline stages.
//!
//! A stage reads some keys from the blackboard, calls the generator once and
//! writes one output key back. It does not judge its own output; that is the
//! retry loop's validator's job.

use std::{future::Future, sync::Arc};

use guardian_core::{patient::PatientId, store::HealthRepository};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  blackboard::{Blackboard, BlackboardKey, HealthData},
  generator::{GenerationRequest, Generator},
};

// ─── Trait ───────────────────────────────────────────────────────────────────

pub trait Stage: Send + Sync {
  /// Short identifier used in logs and reports, e.g. `"monitor"`.
  fn id(&self) -> &str;

  /// The key this stage populates.
  fn output_key(&self) -> BlackboardKey;

  /// Run one attempt. The returned future completes when the generation
  /// collaborator has answered.
  fn run<'a>(
    &'a self,
    board: &'a mut Blackboard,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

// ─── Instructions ────────────────────────────────────────────────────────────

pub const MONITOR_INSTRUCTION: &str = "\
Summarise the patient's current health status from `health_data`: vital signs, \
lab results, medications and conditions, with any concerning trends. If \
`health_data` says nothing is on file, say so and list what the patient should \
provide.";

pub const ASSESS_INSTRUCTION: &str = "\
Using `health_data_summary`, assess the patient's health risks and likely \
complications. Give a severity for each risk and the monitoring it calls for.";

pub const EDUCATE_INSTRUCTION: &str = "\
Using `health_data_summary` and `risk_assessment`, write patient-friendly \
education on the patient's conditions and medications, lifestyle changes, \
warning signs and when to seek care.";

pub const PLAN_INSTRUCTION: &str = "\
Using every prior output, write a care plan: medication schedule, lifestyle \
goals, monitoring schedule, when to contact a provider and an emergency action \
plan.";

// ─── GenerationStage ─────────────────────────────────────────────────────────

/// A stage that sends an instruction plus a blackboard snapshot to the
/// generator and stores the reply under its output key.
pub struct GenerationStage<G> {
  id:          String,
  instruction: String,
  inputs:      Vec<BlackboardKey>,
  output_key:  BlackboardKey,
  generator:   Arc<G>,
}

impl<G: Generator> GenerationStage<G> {
  pub fn new(
    id: impl Into<String>,
    instruction: impl Into<String>,
    inputs: impl IntoIterator<Item = BlackboardKey>,
    output_key: BlackboardKey,
    generator: Arc<G>,
  ) -> Self {
    debug_assert!(output_key.is_text(), "stage output must be a text key");
    Self {
      id: id.into(),
      instruction: instruction.into(),
      inputs: inputs.into_iter().collect(),
      output_key,
      generator,
    }
  }

  pub fn inputs(&self) -> &[BlackboardKey] { &self.inputs }
}

impl<G: Generator> Stage for GenerationStage<G> {
  fn id(&self) -> &str { &self.id }

  fn output_key(&self) -> BlackboardKey { self.output_key }

  async fn run(&self, board: &mut Blackboard) -> Result<()> {
    let request = GenerationRequest {
      stage:       self.id.clone(),
      instruction: self.instruction.clone(),
      context:     board.snapshot(&self.inputs),
    };

    let text = self.generator.generate(request).await?;

    if !board.set_text(self.output_key, text) {
      return Err(Error::NotATextKey(self.output_key.to_string()));
    }
    Ok(())
  }
}

// ─── MonitorStage ────────────────────────────────────────────────────────────

/// The first stage: fetches the patient's latest records into
/// `health_data`, then summarises them.
pub struct MonitorStage<G, S> {
  inner: GenerationStage<G>,
  store: Arc<S>,
}

impl<G: Generator, S: HealthRepository> MonitorStage<G, S> {
  pub fn new(inner: GenerationStage<G>, store: Arc<S>) -> Self { Self { inner, store } }
}

impl<G: Generator, S: HealthRepository> Stage for MonitorStage<G, S> {
  fn id(&self) -> &str { self.inner.id() }

  fn output_key(&self) -> BlackboardKey { self.inner.output_key() }

  async fn run(&self, board: &mut Blackboard) -> Result<()> {
    let data = match board.patient_id.clone() {
      Some(id) => fetch_health_data(self.store.as_ref(), id).await,
      None => HealthData::unavailable(),
    };
    board.health_data = Some(data);
    self.inner.run(board).await
  }
}

// ─── Health-data fetch ───────────────────────────────────────────────────────

/// Latest record per category for `patient_id`, tagged with the id, or the
/// "please provide data" sentinel when nothing is on file.
///
/// A storage failure is logged and treated as "no data yet".
pub async fn fetch_health_data<S: HealthRepository>(
  store: &S,
  patient_id: PatientId,
) -> HealthData {
  match store.latest_health_records(patient_id.clone()).await {
    Ok(records) if !records.is_empty() => {
      let mut map = Map::new();
      map.insert("patient_id".to_owned(), Value::String(patient_id.to_string()));
      for (category, payload) in records {
        map.insert(category.to_string(), payload);
      }
      HealthData::Records(map)
    }
    Ok(_) => HealthData::unavailable(),
    Err(e) => {
      tracing::warn!(%patient_id, error = %e, "health data read failed; treating as unavailable");
      HealthData::unavailable()
    }
  }
}
