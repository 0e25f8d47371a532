//! The four-stage orchestrator.
//!
//! Monitor, assess, educate and plan run strictly in sequence, each inside
//! its own retry loop. A stage that ends incomplete does not stop the run:
//! later stages see whatever the board holds and the gap is reported in
//! [`PipelineRun::status`].

use std::sync::Arc;

use guardian_core::{record::AssessmentKind, store::HealthRepository};

use crate::{
  blackboard::BlackboardKey,
  config::{PipelineConfig, ValidationMode},
  generator::Generator,
  identity::IdentityResolver,
  report::HealthReport,
  retry::{LoopReport, RetryLoop},
  session::{Session, SessionService},
  stage::{
    ASSESS_INSTRUCTION, EDUCATE_INSTRUCTION, GenerationStage, MONITOR_INSTRUCTION,
    MonitorStage, PLAN_INSTRUCTION, Stage,
  },
  validator::Validator,
};

// ─── Run result ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
  /// Every stage escalated.
  Complete,
  /// These stages exhausted their budget.
  Incomplete { stages: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
  /// One report per stage, in execution order.
  pub stages:  Vec<LoopReport>,
  pub report:  HealthReport,
  /// Whether the final flush of the board reached the repository.
  pub durable: bool,
}

impl PipelineRun {
  pub fn status(&self) -> RunStatus {
    let stages: Vec<String> = self
      .stages
      .iter()
      .filter(|r| !r.escalated())
      .map(|r| r.stage.clone())
      .collect();

    if stages.is_empty() {
      RunStatus::Complete
    } else {
      RunStatus::Incomplete { stages }
    }
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

pub struct Pipeline<G, S> {
  store:    Arc<S>,
  sessions: SessionService<S>,
  config:   PipelineConfig,
  monitor:  RetryLoop<MonitorStage<G, S>>,
  assess:   RetryLoop<GenerationStage<G>>,
  educate:  RetryLoop<GenerationStage<G>>,
  plan:     RetryLoop<GenerationStage<G>>,
}

impl<G: Generator, S: HealthRepository> Pipeline<G, S> {
  pub fn new(store: Arc<S>, generator: Arc<G>, config: PipelineConfig) -> Self {
    use BlackboardKey::*;

    let monitor = GenerationStage::new(
      "monitor",
      MONITOR_INSTRUCTION,
      [PatientId, UserMessage, ConversationHistory, HealthData],
      HealthDataSummary,
      Arc::clone(&generator),
    );
    let assess = GenerationStage::new(
      "assess",
      ASSESS_INSTRUCTION,
      [PatientId, HealthDataSummary, HealthData],
      RiskAssessment,
      Arc::clone(&generator),
    );
    let educate = GenerationStage::new(
      "educate",
      EDUCATE_INSTRUCTION,
      [PatientId, HealthDataSummary, RiskAssessment],
      EducationContent,
      Arc::clone(&generator),
    );
    let plan = GenerationStage::new(
      "plan",
      PLAN_INSTRUCTION,
      [PatientId, HealthDataSummary, RiskAssessment, EducationContent],
      CarePlan,
      generator,
    );

    Self {
      sessions: SessionService::new(Arc::clone(&store), config.app_name.clone()),
      monitor: Self::wrap(&config, MonitorStage::new(monitor, Arc::clone(&store))),
      assess: Self::wrap(&config, assess),
      educate: Self::wrap(&config, educate),
      plan: Self::wrap(&config, plan),
      store,
      config,
    }
  }

  fn wrap<T: Stage>(config: &PipelineConfig, stage: T) -> RetryLoop<T> {
    let key = stage.output_key();
    let validator = match config.validation {
      ValidationMode::Presence => Validator::presence(key),
      ValidationMode::Content => Validator::content(key, config.min_words),
    };
    RetryLoop::new(stage, validator)
      .with_max_iterations(config.max_iterations)
      .with_timeout(config.stage_timeout())
  }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  pub fn sessions(&self) -> &SessionService<S> { &self.sessions }

  pub fn identity(&self) -> IdentityResolver<S> { IdentityResolver::new(Arc::clone(&self.store)) }

  /// Run all four stages over the session's board, then assemble and store
  /// the report.
  pub async fn run(&self, session: &mut Session) -> PipelineRun {
    tracing::info!(
      session_id = %session.key.session_id,
      patient_id = ?session.board.patient_id,
      "pipeline run started"
    );

    let mut stages = Vec::with_capacity(4);

    let report = self.monitor.run(&mut session.board).await;
    self.commit(session, self.monitor.stage().output_key(), &report).await;
    stages.push(report);

    for stage in [&self.assess, &self.educate, &self.plan] {
      let report = stage.run(&mut session.board).await;
      self.commit(session, stage.stage().output_key(), &report).await;
      stages.push(report);
    }

    let report = HealthReport::assemble(&session.board, &stages);
    session.board.health_report = Some(report.to_markdown());
    let durable = self.sessions.flush(session).await;

    let run = PipelineRun { stages, report, durable };
    match run.status() {
      RunStatus::Complete => tracing::info!(durable, "pipeline run complete"),
      RunStatus::Incomplete { stages } => {
        tracing::warn!(durable, ?stages, "pipeline run finished with incomplete stages");
      }
    }
    run
  }

  /// Post-stage bookkeeping: log the validated output as an assessment and
  /// checkpoint the board.
  async fn commit(&self, session: &Session, key: BlackboardKey, report: &LoopReport) {
    if report.escalated()
      && self.config.persist_assessments
      && let Some(kind) = assessment_kind(key)
      && let Some(patient_id) = session.board.patient_id.clone()
      && let Some(content) = session.board.text(key)
    {
      if let Err(e) = self
        .store
        .append_assessment(patient_id, kind, content.to_owned())
        .await
      {
        tracing::warn!(stage = %report.stage, error = %e, "assessment not persisted");
      }
    }

    if self.config.checkpoint_each_stage && !self.sessions.flush(session).await {
      tracing::warn!(stage = %report.stage, "checkpoint flush failed");
    }
  }
}

fn assessment_kind(key: BlackboardKey) -> Option<AssessmentKind> {
  match key {
    BlackboardKey::RiskAssessment => Some(AssessmentKind::RiskAssessment),
    BlackboardKey::EducationContent => Some(AssessmentKind::EducationContent),
    BlackboardKey::CarePlan => Some(AssessmentKind::CarePlan),
    _ => None,
  }
}
