//! Patient identity.
//!
//! A patient is identified by a `PAT`-prefixed, zero-padded sequence number
//! (`PAT001`, `PAT002`, … `PAT1000`). Ids are assigned once and never reused;
//! name and phone are mutable contact details.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix shared by every well-formed patient id.
pub const PATIENT_ID_PREFIX: &str = "PAT";

/// Minimum width of the numeric suffix. Longer suffixes are allowed once the
/// sequence passes 999.
pub const PATIENT_ID_MIN_DIGITS: usize = 3;

// ─── PatientId ───────────────────────────────────────────────────────────────

/// A patient identifier as stored in the repository.
///
/// The wrapped string is kept verbatim: ids read back from storage or from a
/// persisted blackboard are used unchanged even if they do not follow the
/// `PAT\d{3,}` pattern. Use [`PatientId::parse`] when well-formedness matters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
  /// Wrap an id without validating it.
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// Parse a well-formed id, rejecting anything that is not `PAT\d{3,}`.
  pub fn parse(id: &str) -> Result<Self> {
    match digits_of(id) {
      Some(_) => Ok(Self(id.to_owned())),
      None => Err(Error::MalformedIdentifier(id.to_owned())),
    }
  }

  /// The numeric suffix, or `None` if the id is malformed or the suffix does
  /// not fit in a `u64`.
  pub fn sequence(&self) -> Option<u64> { digits_of(&self.0)?.parse().ok() }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for PatientId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for PatientId {
  fn from(s: String) -> Self { Self(s) }
}

impl AsRef<str> for PatientId {
  fn as_ref(&self) -> &str { &self.0 }
}

/// The digit suffix of a `PAT\d{3,}` id, of any length.
fn digits_of(id: &str) -> Option<&str> {
  let digits = id.strip_prefix(PATIENT_ID_PREFIX)?;
  if digits.len() < PATIENT_ID_MIN_DIGITS
    || !digits.bytes().all(|b| b.is_ascii_digit())
  {
    return None;
  }
  Some(digits)
}

/// Suffix with leading zeros removed, so that numeric order is
/// `(len, lexical)` order.
fn significant(digits: &str) -> &str { digits.trim_start_matches('0') }

/// Decimal `digits + 1`, carrying into a new leading digit when needed.
fn increment(digits: &str) -> String {
  let mut out = digits.as_bytes().to_vec();
  for b in out.iter_mut().rev() {
    if *b == b'9' {
      *b = b'0';
    } else {
      *b += 1;
      return String::from_utf8_lossy(&out).into_owned();
    }
  }
  let mut carried = String::with_capacity(out.len() + 1);
  carried.push('1');
  carried.push_str(&String::from_utf8_lossy(&out));
  carried
}

/// Compute the next id to allocate given every id currently in storage.
///
/// Takes `max(suffix) + 1` over the well-formed ids (not `count + 1`), so
/// gaps are never refilled. Malformed ids are skipped. With no well-formed
/// ids the sequence starts at 1. Suffixes are compared as digit strings, so
/// there is no upper bound and no overflow.
pub fn next_patient_id<'a>(existing: impl IntoIterator<Item = &'a str>) -> PatientId {
  let max = existing
    .into_iter()
    .filter_map(digits_of)
    .map(significant)
    .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
    .unwrap_or("");

  let next = increment(max);
  PatientId(format!(
    "{PATIENT_ID_PREFIX}{next:0>width$}",
    width = PATIENT_ID_MIN_DIGITS
  ))
}

// ─── Patient ─────────────────────────────────────────────────────────────────

/// A patient row. `name` and `phone` are optional and coalesced on upsert:
/// a supplied value overwrites, an absent one preserves the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
  pub patient_id: PatientId,
  pub name:       Option<String>,
  pub phone:      Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
