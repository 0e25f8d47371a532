//! Session hydration and persistence.
//!
//! A [`Session`] pairs a session key with its blackboard. The service loads
//! it from the repository, appends transcript lines, and writes the whole
//! board back as one blob. Storage failures never abort a turn: they are
//! logged and reported as `false` or as an empty result.

use std::sync::Arc;

use guardian_core::{
  conversation::Role,
  patient::PatientId,
  session::SessionKey,
  store::HealthRepository,
};

use crate::blackboard::{Blackboard, HistoryEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
  pub key:   SessionKey,
  pub board: Blackboard,
}

impl Session {
  /// The patient this session's transcript is filed under: the board's
  /// resolved id, else the session's user id.
  pub fn patient_id(&self) -> PatientId {
    self
      .board
      .patient_id
      .clone()
      .unwrap_or_else(|| PatientId::new(self.key.user_id.clone()))
  }

  /// The id new transcript lines may be written under: the board's resolved
  /// id, else the user id if it is a well-formed patient id.
  fn filing_id(&self) -> Option<PatientId> {
    self
      .board
      .patient_id
      .clone()
      .or_else(|| PatientId::parse(&self.key.user_id).ok())
  }
}

pub struct SessionService<S> {
  store:    Arc<S>,
  app_name: String,
}

impl<S> Clone for SessionService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), app_name: self.app_name.clone() }
  }
}

impl<S: HealthRepository> SessionService<S> {
  pub fn new(store: Arc<S>, app_name: impl Into<String>) -> Self {
    Self { store, app_name: app_name.into() }
  }

  pub fn app_name(&self) -> &str { &self.app_name }

  pub fn key(&self, user_id: &str, session_id: &str) -> SessionKey {
    SessionKey::new(self.app_name.clone(), user_id, session_id)
  }

  /// Load the persisted board for `(user_id, session_id)` and its transcript.
  ///
  /// A missing blob yields an empty board; unreadable keys inside a blob are
  /// dropped one by one. When the blob names
  /// no patient and `user_id` is a well-formed patient id, that id is used.
  pub async fn open(&self, user_id: &str, session_id: &str) -> Session {
    let key = self.key(user_id, session_id);

    let mut board = match self.store.get_session_state(key.clone()).await {
      Ok(Some(state)) => Blackboard::from_value(state.state),
      Ok(None) => Blackboard::new(),
      Err(e) => {
        tracing::warn!(%session_id, error = %e, "session state read failed; starting fresh");
        Blackboard::new()
      }
    };

    if board.patient_id.is_none()
      && let Ok(id) = PatientId::parse(user_id)
    {
      board.patient_id = Some(id);
    }

    let mut session = Session { key, board };
    let patient_id = session.patient_id();
    match self
      .store
      .conversation_history(patient_id, session_id.to_owned())
      .await
    {
      Ok(messages) => {
        session.board.conversation_history =
          messages.into_iter().map(HistoryEntry::from).collect();
      }
      Err(e) => {
        tracing::warn!(%session_id, error = %e, "conversation history read failed");
      }
    }

    tracing::debug!(
      %session_id,
      messages = session.board.conversation_history.len(),
      "session hydrated"
    );
    session
  }

  /// Persist the whole board. Returns whether the write succeeded.
  pub async fn flush(&self, session: &Session) -> bool {
    let blob = match session.board.to_value() {
      Ok(blob) => blob,
      Err(e) => {
        tracing::warn!(session_id = %session.key.session_id, error = %e, "board did not serialise");
        return false;
      }
    };

    match self.store.put_session_state(session.key.clone(), blob).await {
      Ok(_) => true,
      Err(e) => {
        tracing::warn!(session_id = %session.key.session_id, error = %e, "session flush failed");
        false
      }
    }
  }

  /// Append a transcript line, mirror it into the board and flush.
  ///
  /// Returns `true` only if both the append and the flush succeeded. Nothing
  /// is written while the session names no well-formed patient id, so a
  /// stray user id never becomes a patient row.
  pub async fn record_message(
    &self,
    session: &mut Session,
    role: Role,
    content: impl Into<String>,
  ) -> bool {
    let Some(patient_id) = session.filing_id() else {
      tracing::warn!(
        session_id = %session.key.session_id,
        user_id = %session.key.user_id,
        "no patient resolved; message not recorded"
      );
      return false;
    };

    let appended = match self
      .store
      .append_conversation_message(
        patient_id,
        session.key.session_id.clone(),
        role,
        content.into(),
      )
      .await
    {
      Ok(message) => {
        session.board.conversation_history.push(message.into());
        true
      }
      Err(e) => {
        tracing::warn!(session_id = %session.key.session_id, error = %e, "message append failed");
        false
      }
    };

    let flushed = self.flush(session).await;
    appended && flushed
  }

  /// Session ids the patient has written to. Empty on storage failure.
  pub async fn list_sessions(&self, patient_id: PatientId) -> Vec<String> {
    self
      .store
      .list_session_ids(patient_id.clone())
      .await
      .unwrap_or_else(|e| {
        tracing::warn!(%patient_id, error = %e, "session listing failed");
        Vec::new()
      })
  }
}
