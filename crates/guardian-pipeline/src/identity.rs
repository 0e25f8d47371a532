//! Patient identity resolution.
//!
//! Maps whatever identity a turn carries (a held id, a name, a phone
//! number) to a stable `PatientId`, creating a patient when nothing matches.

use std::sync::Arc;

use guardian_core::{
  patient::{Patient, PatientId},
  store::HealthRepository,
};

use crate::{Error, Result, blackboard::Blackboard};

/// How a patient id was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// The caller already held an id; it was used unchanged.
  Held(PatientId),
  /// An existing patient matched the supplied name or phone.
  Found(Patient),
  /// No match; a new patient was allocated.
  Created(Patient),
}

impl Resolution {
  pub fn patient_id(&self) -> &PatientId {
    match self {
      Self::Held(id) => id,
      Self::Found(p) | Self::Created(p) => &p.patient_id,
    }
  }

  pub fn is_new(&self) -> bool { matches!(self, Self::Created(_)) }
}

pub struct IdentityResolver<S> {
  store: Arc<S>,
}

impl<S: HealthRepository> IdentityResolver<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Resolve an identity, creating a patient when nothing matches.
  ///
  /// Blank strings count as absent. With no held id and neither name nor
  /// phone this fails with [`Error::MissingIdentity`].
  pub async fn resolve_or_create(
    &self,
    held: Option<&PatientId>,
    name: Option<&str>,
    phone: Option<&str>,
  ) -> Result<Resolution> {
    if let Some(id) = held.filter(|id| !id.as_str().trim().is_empty()) {
      return Ok(Resolution::Held(id.clone()));
    }

    let name = non_blank(name);
    let phone = non_blank(phone);
    if name.is_none() && phone.is_none() {
      return Err(Error::MissingIdentity);
    }

    let found = self
      .store
      .find_patient(name.clone(), phone.clone())
      .await
      .map_err(Error::store)?;

    if let Some(patient) = found {
      tracing::debug!(patient_id = %patient.patient_id, "identity matched existing patient");
      return Ok(Resolution::Found(patient));
    }

    let patient = self
      .store
      .create_patient(name, phone)
      .await
      .map_err(Error::store)?;
    tracing::info!(patient_id = %patient.patient_id, "registered new patient");
    Ok(Resolution::Created(patient))
  }

  /// Resolve from the board's own identity slots and write the id back.
  pub async fn resolve_into(&self, board: &mut Blackboard) -> Result<Resolution> {
    let resolution = self
      .resolve_or_create(
        board.patient_id.as_ref(),
        board.patient_name.as_deref(),
        board.patient_phone.as_deref(),
      )
      .await?;
    board.patient_id = Some(resolution.patient_id().clone());
    Ok(resolution)
  }
}

fn non_blank(value: Option<&str>) -> Option<String> {
  value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}
