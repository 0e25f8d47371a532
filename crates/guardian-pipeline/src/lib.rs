//! The Health Guardian analysis pipeline.
//!
//! Four stages (monitor → assess → educate → plan) each run inside a
//! [`RetryLoop`] that re-invokes the stage until a [`Validator`] accepts its
//! output or the iteration budget runs out. Stages share a typed
//! [`Blackboard`] that is hydrated from and flushed to the repository's
//! session state, so a conversation can resume across turns.
//!
//! Everything here is generic over [`guardian_core::store::HealthRepository`]
//! and over the text [`Generator`]; the entry point decides which concrete
//! backend and collaborator to plug in.

#![allow(async_fn_in_trait)]

pub mod blackboard;
pub mod config;
pub mod error;
pub mod generator;
pub mod identity;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod session;
pub mod stage;
pub mod validator;

pub use blackboard::{Blackboard, BlackboardKey, HealthData};
pub use config::{PipelineConfig, ValidationMode};
pub use error::{Error, Result};
pub use generator::{GenerationRequest, Generator};
pub use identity::{IdentityResolver, Resolution};
pub use pipeline::{Pipeline, PipelineRun, RunStatus};
pub use report::{HealthReport, write_report};
pub use retry::{LoopOutcome, LoopReport, RetryLoop};
pub use session::{Session, SessionService};
pub use stage::{GenerationStage, MonitorStage, Stage};
pub use validator::Validator;
