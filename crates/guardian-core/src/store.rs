//! The `HealthRepository` trait.
//!
//! The trait is implemented by storage backends (e.g. `guardian-store-sqlite`).
//! The pipeline layer depends on this abstraction, not on any concrete
//! backend.

use std::{collections::BTreeMap, future::Future};

use crate::{
  conversation::{ConversationMessage, Role},
  patient::{Patient, PatientId},
  record::{Assessment, AssessmentKind, HealthCategory, HealthRecord},
  session::{SessionKey, SessionState},
};

/// Latest payload per category. Categories with no records are absent.
pub type LatestRecords = BTreeMap<HealthCategory, serde_json::Value>;

/// Abstraction over a Health Guardian repository backend.
///
/// Pure storage: no business logic beyond idempotent upserts. Health records,
/// assessments and conversation messages are append-only.
///
/// "Not found" is a normal outcome and is reported as `Ok(None)` or an empty
/// collection. `Err` is reserved for storage failures.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait HealthRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Patients ──────────────────────────────────────────────────────────

  /// Ensure a patient row with this id exists. Supplied fields overwrite,
  /// `None` fields keep their stored value. Always bumps `updated_at`.
  fn upsert_patient_info(
    &self,
    id: PatientId,
    name: Option<String>,
    phone: Option<String>,
  ) -> impl Future<Output = Result<Patient, Self::Error>> + Send + '_;

  /// Retrieve a patient by id. Returns `None` if not found.
  fn get_patient(
    &self,
    id: PatientId,
  ) -> impl Future<Output = Result<Option<Patient>, Self::Error>> + Send + '_;

  /// Find the first patient, in storage order, whose name or phone matches.
  ///
  /// With both fields given the match is `name = name OR phone = phone`;
  /// with one, only that column is compared; with neither, `None`. When
  /// several rows match the earliest inserted wins. That tie-break is an
  /// artefact of storage order, not a policy.
  fn find_patient(
    &self,
    name: Option<String>,
    phone: Option<String>,
  ) -> impl Future<Output = Result<Option<Patient>, Self::Error>> + Send + '_;

  /// Allocate the next `PAT` id and insert a patient with it, atomically.
  ///
  /// Concurrent callers never receive the same id.
  fn create_patient(
    &self,
    name: Option<String>,
    phone: Option<String>,
  ) -> impl Future<Output = Result<Patient, Self::Error>> + Send + '_;

  // ── Health records ────────────────────────────────────────────────────

  /// Ensure the patient exists (as [`Self::upsert_patient_info`] with no
  /// fields), then append a record. `recorded_at` is set by the store.
  fn append_health_record(
    &self,
    patient_id: PatientId,
    category: HealthCategory,
    payload: serde_json::Value,
  ) -> impl Future<Output = Result<HealthRecord, Self::Error>> + Send + '_;

  /// The most recently recorded payload for one category.
  fn latest_health_record(
    &self,
    patient_id: PatientId,
    category: HealthCategory,
  ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>> + Send + '_;

  /// The most recently recorded payload for every category that has at least
  /// one record.
  fn latest_health_records(
    &self,
    patient_id: PatientId,
  ) -> impl Future<Output = Result<LatestRecords, Self::Error>> + Send + '_;

  // ── Assessments ───────────────────────────────────────────────────────

  fn append_assessment(
    &self,
    patient_id: PatientId,
    kind: AssessmentKind,
    content: String,
  ) -> impl Future<Output = Result<Assessment, Self::Error>> + Send + '_;

  /// The newest content for `(patient_id, kind)`, ignoring older rows.
  fn latest_assessment(
    &self,
    patient_id: PatientId,
    kind: AssessmentKind,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  // ── Conversation transcript ───────────────────────────────────────────

  /// Append a message stamped with the current time.
  fn append_conversation_message(
    &self,
    patient_id: PatientId,
    session_id: String,
    role: Role,
    content: String,
  ) -> impl Future<Output = Result<ConversationMessage, Self::Error>> + Send + '_;

  /// All messages of one session, oldest first.
  fn conversation_history(
    &self,
    patient_id: PatientId,
    session_id: String,
  ) -> impl Future<Output = Result<Vec<ConversationMessage>, Self::Error>> + Send + '_;

  /// Distinct session ids this patient has ever written to.
  fn list_session_ids(
    &self,
    patient_id: PatientId,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Session state ─────────────────────────────────────────────────────

  fn get_session_state(
    &self,
    key: SessionKey,
  ) -> impl Future<Output = Result<Option<SessionState>, Self::Error>> + Send + '_;

  /// Replace the whole state blob for `key`, creating the row if needed.
  /// Last write wins; nothing is merged.
  fn put_session_state(
    &self,
    key: SessionKey,
    state: serde_json::Value,
  ) -> impl Future<Output = Result<SessionState, Self::Error>> + Send + '_;
}
