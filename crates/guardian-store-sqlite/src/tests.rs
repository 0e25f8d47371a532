//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::HashSet;

use guardian_core::{
  conversation::Role,
  patient::PatientId,
  record::{AssessmentKind, HealthCategory},
  session::SessionKey,
  store::HealthRepository,
};
use serde_json::json;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn pid(s: &str) -> PatientId { PatientId::new(s) }

// ─── Patients ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_patient_is_pat001() {
  let s = store().await;
  let p = s.create_patient(Some("Ada".into()), None).await.unwrap();
  assert_eq!(p.patient_id.as_str(), "PAT001");
  assert_eq!(p.name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn allocation_is_strictly_increasing() {
  let s = store().await;
  let mut last = 0;
  for _ in 0..5 {
    let p = s.create_patient(None, None).await.unwrap();
    let seq = p.patient_id.sequence().unwrap();
    assert!(seq > last);
    last = seq;
  }
  assert_eq!(last, 5);
}

#[tokio::test]
async fn allocation_uses_max_not_count() {
  let s = store().await;
  s.upsert_patient_info(pid("PAT001"), None, None).await.unwrap();
  s.upsert_patient_info(pid("PAT003"), None, None).await.unwrap();

  let p = s.create_patient(None, None).await.unwrap();
  assert_eq!(p.patient_id.as_str(), "PAT004");
}

#[tokio::test]
async fn allocation_skips_malformed_ids() {
  let s = store().await;
  s.upsert_patient_info(pid("PATabc"), None, None).await.unwrap();
  s.upsert_patient_info(pid("walk-in"), None, None).await.unwrap();
  s.upsert_patient_info(pid("PAT002"), None, None).await.unwrap();

  let p = s.create_patient(None, None).await.unwrap();
  assert_eq!(p.patient_id.as_str(), "PAT003");
}

#[tokio::test]
async fn allocation_past_u64_keeps_store_usable() {
  let s = store().await;
  s.upsert_patient_info(pid("PAT18446744073709551615"), None, None)
    .await
    .unwrap();

  let p = s.create_patient(Some("Ada".into()), None).await.unwrap();
  assert_eq!(p.patient_id.as_str(), "PAT18446744073709551616");

  let again = s.get_patient(pid("PAT18446744073709551615")).await.unwrap();
  assert!(again.is_some());
}

#[tokio::test]
async fn concurrent_allocations_never_collide() {
  let s = store().await;

  let handles: Vec<_> = (0..20)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move { s.create_patient(None, None).await.unwrap() })
    })
    .collect();

  let mut ids = HashSet::new();
  for h in handles {
    let p = h.await.unwrap();
    assert!(ids.insert(p.patient_id));
  }
  assert_eq!(ids.len(), 20);
  assert!(ids.contains(&pid("PAT020")));
}

#[tokio::test]
async fn upsert_coalesces_fields() {
  let s = store().await;
  let first = s
    .upsert_patient_info(pid("PAT001"), Some("Ada".into()), Some("555-0100".into()))
    .await
    .unwrap();

  let second = s
    .upsert_patient_info(pid("PAT001"), None, Some("555-0199".into()))
    .await
    .unwrap();

  assert_eq!(second.name.as_deref(), Some("Ada"));
  assert_eq!(second.phone.as_deref(), Some("555-0199"));
  assert_eq!(second.created_at, first.created_at);
  assert!(second.updated_at >= first.updated_at);
}

#[tokio::test]
async fn get_patient_missing_returns_none() {
  let s = store().await;
  assert!(s.get_patient(pid("PAT404")).await.unwrap().is_none());
}

#[tokio::test]
async fn find_patient_on_empty_store_is_none() {
  let s = store().await;
  let found = s.find_patient(None, Some("555-0000".into())).await.unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn find_patient_matches_name_or_phone() {
  let s = store().await;
  s.create_patient(Some("Ada".into()), Some("555-0100".into())).await.unwrap();
  let grace = s
    .create_patient(Some("Grace".into()), Some("555-0200".into()))
    .await
    .unwrap();

  let by_phone = s.find_patient(None, Some("555-0200".into())).await.unwrap();
  assert_eq!(by_phone.unwrap().patient_id, grace.patient_id);

  let by_name = s.find_patient(Some("Grace".into()), None).await.unwrap();
  assert_eq!(by_name.unwrap().patient_id, grace.patient_id);

  // Name misses, phone hits.
  let either = s
    .find_patient(Some("Nobody".into()), Some("555-0200".into()))
    .await
    .unwrap();
  assert_eq!(either.unwrap().patient_id, grace.patient_id);

  assert!(s.find_patient(None, None).await.unwrap().is_none());
}

#[tokio::test]
async fn find_patient_returns_first_in_storage_order() {
  let s = store().await;
  let first = s.create_patient(Some("Sam".into()), None).await.unwrap();
  s.create_patient(Some("Sam".into()), None).await.unwrap();

  let found = s.find_patient(Some("Sam".into()), None).await.unwrap().unwrap();
  assert_eq!(found.patient_id, first.patient_id);
}

// ─── Health records ──────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_health_record_returns_newest_payload() {
  let s = store().await;
  let p = pid("PAT001");

  s.append_health_record(p.clone(), HealthCategory::VitalSigns, json!({"bp": "120/80"}))
    .await
    .unwrap();
  let got = s
    .latest_health_record(p.clone(), HealthCategory::VitalSigns)
    .await
    .unwrap();
  assert_eq!(got, Some(json!({"bp": "120/80"})));

  s.append_health_record(p.clone(), HealthCategory::VitalSigns, json!({"bp": "135/85"}))
    .await
    .unwrap();
  let got = s
    .latest_health_record(p, HealthCategory::VitalSigns)
    .await
    .unwrap();
  assert_eq!(got, Some(json!({"bp": "135/85"})));
}

#[tokio::test]
async fn latest_health_record_breaks_timestamp_ties_by_insertion() {
  let s = store().await;
  s.execute_batch(
    "INSERT INTO patients (patient_id, created_at, updated_at)
       VALUES ('PAT001', '2025-01-01T10:00:00.000000Z', '2025-01-01T10:00:00.000000Z');
     INSERT INTO health_data (patient_id, data_type, data_json, recorded_at) VALUES
       ('PAT001', 'vital_signs', '{\"bp\":\"150/95\"}', '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 'vital_signs', '{\"bp\":\"128/82\"}', '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 'vital_signs', '{\"bp\":\"90/60\"}',  '2024-12-31T10:00:00.000000Z');",
  )
  .await
  .unwrap();

  let one = s
    .latest_health_record(pid("PAT001"), HealthCategory::VitalSigns)
    .await
    .unwrap();
  assert_eq!(one, Some(json!({"bp": "128/82"})));

  let all = s.latest_health_records(pid("PAT001")).await.unwrap();
  assert_eq!(all[&HealthCategory::VitalSigns], json!({"bp": "128/82"}));
}

#[tokio::test]
async fn append_health_record_creates_patient() {
  let s = store().await;
  s.append_health_record(pid("PAT007"), HealthCategory::Medications, json!(["metformin"]))
    .await
    .unwrap();

  let patient = s.get_patient(pid("PAT007")).await.unwrap();
  assert!(patient.is_some());
}

#[tokio::test]
async fn latest_health_record_missing_category_is_none() {
  let s = store().await;
  let p = pid("PAT001");
  s.append_health_record(p.clone(), HealthCategory::Conditions, json!(["asthma"]))
    .await
    .unwrap();

  let got = s.latest_health_record(p, HealthCategory::LabResults).await.unwrap();
  assert!(got.is_none());
}

#[tokio::test]
async fn latest_health_records_omits_empty_categories() {
  let s = store().await;
  let p = pid("PAT001");

  s.append_health_record(p.clone(), HealthCategory::VitalSigns, json!({"hr": 70}))
    .await
    .unwrap();
  s.append_health_record(p.clone(), HealthCategory::LabResults, json!({"a1c": 6.1}))
    .await
    .unwrap();
  s.append_health_record(p.clone(), HealthCategory::VitalSigns, json!({"hr": 64}))
    .await
    .unwrap();

  let all = s.latest_health_records(p).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[&HealthCategory::VitalSigns], json!({"hr": 64}));
  assert_eq!(all[&HealthCategory::LabResults], json!({"a1c": 6.1}));
  assert!(!all.contains_key(&HealthCategory::Medications));
}

#[tokio::test]
async fn latest_health_records_unknown_patient_is_empty() {
  let s = store().await;
  assert!(s.latest_health_records(pid("PAT999")).await.unwrap().is_empty());
}

// ─── Assessments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn latest_assessment_ignores_older_entries() {
  let s = store().await;
  let p = pid("PAT001");

  s.append_assessment(p.clone(), AssessmentKind::RiskAssessment, "moderate".into())
    .await
    .unwrap();
  s.append_assessment(p.clone(), AssessmentKind::CarePlan, "walk daily".into())
    .await
    .unwrap();
  s.append_assessment(p.clone(), AssessmentKind::RiskAssessment, "low".into())
    .await
    .unwrap();

  let risk = s
    .latest_assessment(p.clone(), AssessmentKind::RiskAssessment)
    .await
    .unwrap();
  assert_eq!(risk.as_deref(), Some("low"));

  let plan = s.latest_assessment(p.clone(), AssessmentKind::CarePlan).await.unwrap();
  assert_eq!(plan.as_deref(), Some("walk daily"));

  let edu = s
    .latest_assessment(p, AssessmentKind::EducationContent)
    .await
    .unwrap();
  assert!(edu.is_none());
}

#[tokio::test]
async fn latest_assessment_breaks_timestamp_ties_by_insertion() {
  let s = store().await;
  s.execute_batch(
    "INSERT INTO patients (patient_id, created_at, updated_at)
       VALUES ('PAT001', '2025-01-01T10:00:00.000000Z', '2025-01-01T10:00:00.000000Z');
     INSERT INTO assessments (patient_id, assessment_type, content, created_at) VALUES
       ('PAT001', 'care_plan', 'older',  '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 'care_plan', 'newer',  '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 'care_plan', 'stale',  '2024-12-31T10:00:00.000000Z');",
  )
  .await
  .unwrap();

  let plan = s.latest_assessment(pid("PAT001"), AssessmentKind::CarePlan).await.unwrap();
  assert_eq!(plan.as_deref(), Some("newer"));
}

// ─── Conversations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn conversation_history_is_in_insertion_order() {
  let s = store().await;
  let p = pid("PAT001");

  for (i, role) in [Role::User, Role::Agent, Role::User, Role::Agent]
    .into_iter()
    .enumerate()
  {
    s.append_conversation_message(p.clone(), "s1".into(), role, format!("m{i}"))
      .await
      .unwrap();
  }
  s.append_conversation_message(p.clone(), "s2".into(), Role::User, "other".into())
    .await
    .unwrap();

  let history = s.conversation_history(p, "s1".into()).await.unwrap();
  let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(contents, ["m0", "m1", "m2", "m3"]);
  assert_eq!(history[1].role, Role::Agent);
  assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn conversation_history_breaks_timestamp_ties_by_insertion() {
  let s = store().await;
  s.execute_batch(
    "INSERT INTO patients (patient_id, created_at, updated_at)
       VALUES ('PAT001', '2025-01-01T10:00:00.000000Z', '2025-01-01T10:00:00.000000Z');
     INSERT INTO conversations
       (patient_id, session_id, message_type, message_content, timestamp) VALUES
       ('PAT001', 's1', 'user',  'second', '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 's1', 'agent', 'third',  '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 's1', 'user',  'fourth', '2025-01-01T10:00:00.000000Z'),
       ('PAT001', 's1', 'user',  'first',  '2025-01-01T09:59:59.000000Z');",
  )
  .await
  .unwrap();

  let history = s.conversation_history(pid("PAT001"), "s1".into()).await.unwrap();
  let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
  assert_eq!(contents, ["first", "second", "third", "fourth"]);
  assert_eq!(history[2].role, Role::Agent);
}

#[tokio::test]
async fn list_session_ids_is_distinct() {
  let s = store().await;
  let p = pid("PAT001");

  for session in ["a", "b", "a", "c", "b"] {
    s.append_conversation_message(p.clone(), session.into(), Role::User, "hi".into())
      .await
      .unwrap();
  }
  s.append_conversation_message(pid("PAT002"), "z".into(), Role::User, "hi".into())
    .await
    .unwrap();

  let ids = s.list_session_ids(p).await.unwrap();
  assert_eq!(ids, ["a", "b", "c"]);
}

// ─── Session state ───────────────────────────────────────────────────────────

#[tokio::test]
async fn session_state_missing_returns_none() {
  let s = store().await;
  let key = SessionKey::new("app", "PAT001", "s1");
  assert!(s.get_session_state(key).await.unwrap().is_none());
}

#[tokio::test]
async fn put_session_state_overwrites_whole_blob() {
  let s = store().await;
  let key = SessionKey::new("app", "PAT001", "s1");

  let first = s
    .put_session_state(key.clone(), json!({"a": 1, "b": 2}))
    .await
    .unwrap();
  let second = s
    .put_session_state(key.clone(), json!({"c": 3}))
    .await
    .unwrap();

  assert_eq!(second.create_time, first.create_time);

  let loaded = s.get_session_state(key).await.unwrap().unwrap();
  assert_eq!(loaded.state, json!({"c": 3}));
}

#[tokio::test]
async fn session_state_is_keyed_by_app_user_and_session() {
  let s = store().await;
  s.put_session_state(SessionKey::new("app", "PAT001", "s1"), json!({"n": 1}))
    .await
    .unwrap();
  s.put_session_state(SessionKey::new("app", "PAT001", "s2"), json!({"n": 2}))
    .await
    .unwrap();
  s.put_session_state(SessionKey::new("other", "PAT001", "s1"), json!({"n": 3}))
    .await
    .unwrap();

  let loaded = s
    .get_session_state(SessionKey::new("app", "PAT001", "s1"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(loaded.state, json!({"n": 1}));
}
