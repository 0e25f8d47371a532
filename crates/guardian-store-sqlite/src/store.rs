//! [`SqliteStore`], the SQLite implementation of [`HealthRepository`].

use std::path::Path;

use chrono::Utc;
use guardian_core::{
  conversation::{ConversationMessage, Role},
  patient::{Patient, PatientId, next_patient_id},
  record::{Assessment, AssessmentKind, HealthCategory, HealthRecord},
  session::{SessionKey, SessionState},
  store::{HealthRepository, LatestRecords},
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    PATIENT_COLUMNS, RawMessage, RawPatient, RawSession, decode_category,
    decode_json, encode_dt, encode_json,
  },
  schema::SCHEMA,
};

/// How many times id allocation is retried after losing a unique-constraint
/// race to another process writing the same file.
const MAX_ALLOCATION_ATTEMPTS: u32 = 5;

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// Synchronous helpers run inside `Connection::call` closures, so several
// statements can share one transaction on the connection thread.

fn upsert_patient_row(
  conn:  &rusqlite::Connection,
  id:    &str,
  name:  Option<&str>,
  phone: Option<&str>,
  now:   &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO patients (patient_id, name, phone, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?4)
     ON CONFLICT(patient_id) DO UPDATE SET
       name       = COALESCE(excluded.name,  patients.name),
       phone      = COALESCE(excluded.phone, patients.phone),
       updated_at = excluded.updated_at",
    rusqlite::params![id, name, phone, now],
  )?;
  Ok(())
}

/// Insert a bare patient row if absent; an existing row is left untouched.
fn ensure_patient_row(
  conn: &rusqlite::Connection,
  id:   &str,
  now:  &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO patients (patient_id, created_at, updated_at)
     VALUES (?1, ?2, ?2)",
    rusqlite::params![id, now],
  )?;
  Ok(())
}

fn select_patient(
  conn: &rusqlite::Connection,
  id:   &str,
) -> rusqlite::Result<Option<RawPatient>> {
  conn
    .query_row(
      &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?1"),
      rusqlite::params![id],
      RawPatient::from_row,
    )
    .optional()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Health Guardian repository backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Run raw SQL against the database, for arranging rows the public API
  /// cannot produce.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
    let sql = sql.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── HealthRepository impl ───────────────────────────────────────────────────

impl HealthRepository for SqliteStore {
  type Error = Error;

  // ── Patients ──────────────────────────────────────────────────────────────

  async fn upsert_patient_info(
    &self,
    id:    PatientId,
    name:  Option<String>,
    phone: Option<String>,
  ) -> Result<Patient> {
    let id_str  = id.into_inner();
    let now_str = encode_dt(Utc::now());

    let (id_str, raw) = self
      .conn
      .call(move |conn| {
        upsert_patient_row(conn, &id_str, name.as_deref(), phone.as_deref(), &now_str)?;
        let raw = select_patient(conn, &id_str)?;
        Ok((id_str, raw))
      })
      .await?;

    raw
      .ok_or(Error::PatientVanished(id_str))?
      .into_patient()
  }

  async fn get_patient(&self, id: PatientId) -> Result<Option<Patient>> {
    let id_str = id.into_inner();

    let raw = self
      .conn
      .call(move |conn| Ok(select_patient(conn, &id_str)?))
      .await?;

    raw.map(RawPatient::into_patient).transpose()
  }

  async fn find_patient(
    &self,
    name:  Option<String>,
    phone: Option<String>,
  ) -> Result<Option<Patient>> {
    if name.is_none() && phone.is_none() {
      return Ok(None);
    }

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {PATIENT_COLUMNS} FROM patients
               WHERE (?1 IS NOT NULL AND name  = ?1)
                  OR (?2 IS NOT NULL AND phone = ?2)
               ORDER BY rowid
               LIMIT 1"
            ),
            rusqlite::params![name, phone],
            RawPatient::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawPatient::into_patient).transpose()
  }

  async fn create_patient(
    &self,
    name:  Option<String>,
    phone: Option<String>,
  ) -> Result<Patient> {
    let (allocated, raw) = self
      .conn
      .call(move |conn| {
        let mut attempt = 1;
        loop {
          // IMMEDIATE takes the write lock before the scan, so no other
          // writer can insert between reading the max and inserting max+1.
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

          let existing: Vec<String> = {
            let mut stmt = tx.prepare("SELECT patient_id FROM patients")?;
            stmt
              .query_map([], |row| row.get(0))?
              .collect::<rusqlite::Result<Vec<_>>>()?
          };
          let next = next_patient_id(existing.iter().map(String::as_str));
          let now  = encode_dt(Utc::now());

          let inserted = tx.execute(
            "INSERT INTO patients (patient_id, name, phone, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![next.as_str(), name.as_deref(), phone.as_deref(), now],
          );

          match inserted {
            Ok(_) => {
              let raw = select_patient(&tx, next.as_str())?;
              tx.commit()?;
              return Ok((next.into_inner(), raw));
            }
            Err(e) if is_unique_violation(&e) && attempt < MAX_ALLOCATION_ATTEMPTS => {
              attempt += 1;
            }
            Err(e) => return Err(e.into()),
          }
        }
      })
      .await?;

    let patient = raw
      .ok_or_else(|| Error::PatientVanished(allocated.clone()))?
      .into_patient()?;
    tracing::info!(patient_id = %patient.patient_id, "allocated new patient id");
    Ok(patient)
  }

  // ── Health records ────────────────────────────────────────────────────────

  async fn append_health_record(
    &self,
    patient_id: PatientId,
    category:   HealthCategory,
    payload:    serde_json::Value,
  ) -> Result<HealthRecord> {
    let recorded_at = Utc::now();
    let id_str      = patient_id.as_str().to_owned();
    let type_str    = category.as_ref().to_owned();
    let json_str    = encode_json(&payload)?;
    let at_str      = encode_dt(recorded_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        upsert_patient_row(&tx, &id_str, None, None, &at_str)?;
        tx.execute(
          "INSERT INTO health_data (patient_id, data_type, data_json, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, type_str, json_str, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(HealthRecord { patient_id, category, payload, recorded_at })
  }

  async fn latest_health_record(
    &self,
    patient_id: PatientId,
    category:   HealthCategory,
  ) -> Result<Option<serde_json::Value>> {
    let id_str   = patient_id.into_inner();
    let type_str = category.as_ref().to_owned();

    let json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT data_json FROM health_data
             WHERE patient_id = ?1 AND data_type = ?2
             ORDER BY recorded_at DESC, id DESC
             LIMIT 1",
            rusqlite::params![id_str, type_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    json.as_deref().map(decode_json).transpose()
  }

  async fn latest_health_records(&self, patient_id: PatientId) -> Result<LatestRecords> {
    let id_str = patient_id.into_inner();

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT data_type, data_json FROM health_data
           WHERE patient_id = ?1
           ORDER BY recorded_at DESC, id DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Rows are newest first, so the first hit per category is the current one.
    let mut latest = LatestRecords::new();
    for (data_type, data_json) in rows {
      let category = match decode_category(&data_type) {
        Ok(c) => c,
        Err(e) => {
          tracing::warn!(%data_type, error = %e, "skipping record with unknown category");
          continue;
        }
      };
      if !latest.contains_key(&category) {
        latest.insert(category, decode_json(&data_json)?);
      }
    }
    Ok(latest)
  }

  // ── Assessments ───────────────────────────────────────────────────────────

  async fn append_assessment(
    &self,
    patient_id: PatientId,
    kind:       AssessmentKind,
    content:    String,
  ) -> Result<Assessment> {
    let created_at = Utc::now();
    let id_str     = patient_id.as_str().to_owned();
    let kind_str   = kind.as_ref().to_owned();
    let at_str     = encode_dt(created_at);
    let body       = content.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_patient_row(&tx, &id_str, &at_str)?;
        tx.execute(
          "INSERT INTO assessments (patient_id, assessment_type, content, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, kind_str, body, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(Assessment { patient_id, kind, content, created_at })
  }

  async fn latest_assessment(
    &self,
    patient_id: PatientId,
    kind:       AssessmentKind,
  ) -> Result<Option<String>> {
    let id_str   = patient_id.into_inner();
    let kind_str = kind.as_ref().to_owned();

    let content = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT content FROM assessments
             WHERE patient_id = ?1 AND assessment_type = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            rusqlite::params![id_str, kind_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(content)
  }

  // ── Conversation transcript ───────────────────────────────────────────────

  async fn append_conversation_message(
    &self,
    patient_id: PatientId,
    session_id: String,
    role:       Role,
    content:    String,
  ) -> Result<ConversationMessage> {
    let timestamp = Utc::now();
    let id_str    = patient_id.as_str().to_owned();
    let sess_str  = session_id.clone();
    let role_str  = role.as_ref().to_owned();
    let body      = content.clone();
    let at_str    = encode_dt(timestamp);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_patient_row(&tx, &id_str, &at_str)?;
        tx.execute(
          "INSERT INTO conversations
             (patient_id, session_id, message_type, message_content, timestamp)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, sess_str, role_str, body, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(ConversationMessage { patient_id, session_id, role, content, timestamp })
  }

  async fn conversation_history(
    &self,
    patient_id: PatientId,
    session_id: String,
  ) -> Result<Vec<ConversationMessage>> {
    let id_str = patient_id.into_inner();

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT patient_id, session_id, message_type, message_content, timestamp
           FROM conversations
           WHERE patient_id = ?1 AND session_id = ?2
           ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, session_id], |row| {
            Ok(RawMessage {
              patient_id:      row.get(0)?,
              session_id:      row.get(1)?,
              message_type:    row.get(2)?,
              message_content: row.get(3)?,
              timestamp:       row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn list_session_ids(&self, patient_id: PatientId) -> Result<Vec<String>> {
    let id_str = patient_id.into_inner();

    let ids = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT session_id FROM conversations
           WHERE patient_id = ?1
           GROUP BY session_id
           ORDER BY MIN(id)",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(ids)
  }

  // ── Session state ─────────────────────────────────────────────────────────

  async fn get_session_state(&self, key: SessionKey) -> Result<Option<SessionState>> {
    let (app, user, session) =
      (key.app_name.clone(), key.user_id.clone(), key.session_id.clone());

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT state_json, create_time, update_time FROM sessions
             WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
            rusqlite::params![app, user, session],
            |row| {
              Ok(RawSession {
                state_json:  row.get(0)?,
                create_time: row.get(1)?,
                update_time: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(|r| r.into_state(key)).transpose()
  }

  async fn put_session_state(
    &self,
    key:   SessionKey,
    state: serde_json::Value,
  ) -> Result<SessionState> {
    let (app, user, session) =
      (key.app_name.clone(), key.user_id.clone(), key.session_id.clone());
    let json_str = encode_json(&state)?;
    let now_str  = encode_dt(Utc::now());

    let raw: RawSession = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO sessions
             (app_name, user_id, session_id, state_json, create_time, update_time)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)
           ON CONFLICT(app_name, user_id, session_id) DO UPDATE SET
             state_json  = excluded.state_json,
             update_time = excluded.update_time",
          rusqlite::params![app, user, session, json_str, now_str],
        )?;
        let raw = tx.query_row(
          "SELECT state_json, create_time, update_time FROM sessions
           WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
          rusqlite::params![app, user, session],
          |row| {
            Ok(RawSession {
              state_json:  row.get(0)?,
              create_time: row.get(1)?,
              update_time: row.get(2)?,
            })
          },
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_state(key)
  }
}
