//! SQL schema for the Health Guardian SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Patient ids are allocated by the store (PAT001, PAT002, ...) and never
-- reused. Rowid order is storage order for first-match lookups.
CREATE TABLE IF NOT EXISTS patients (
    patient_id  TEXT PRIMARY KEY,
    name        TEXT,
    phone       TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS health_data (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id  TEXT NOT NULL REFERENCES patients(patient_id),
    data_type   TEXT NOT NULL,   -- 'vital_signs' | 'lab_results' | 'medications' | 'conditions'
    data_json   TEXT NOT NULL,
    recorded_at TEXT NOT NULL    -- RFC 3339 UTC, fixed width; server-assigned
);

-- Append-only.
CREATE TABLE IF NOT EXISTS assessments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id      TEXT NOT NULL REFERENCES patients(patient_id),
    assessment_type TEXT NOT NULL,   -- 'risk_assessment' | 'education_content' | 'care_plan'
    content         TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

-- Append-only transcript.
CREATE TABLE IF NOT EXISTS conversations (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id      TEXT NOT NULL REFERENCES patients(patient_id),
    session_id      TEXT NOT NULL,
    message_type    TEXT NOT NULL,   -- 'user' | 'agent'
    message_content TEXT NOT NULL,
    timestamp       TEXT NOT NULL
);

-- Whole-blob session state; last write wins.
CREATE TABLE IF NOT EXISTS sessions (
    app_name    TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    session_id  TEXT NOT NULL,
    state_json  TEXT NOT NULL,
    create_time TEXT NOT NULL,
    update_time TEXT NOT NULL,
    UNIQUE (app_name, user_id, session_id)
);

CREATE INDEX IF NOT EXISTS patients_name_idx      ON patients(name);
CREATE INDEX IF NOT EXISTS patients_phone_idx     ON patients(phone);
CREATE INDEX IF NOT EXISTS health_data_latest_idx ON health_data(patient_id, data_type, recorded_at);
CREATE INDEX IF NOT EXISTS assessments_latest_idx ON assessments(patient_id, assessment_type, created_at);
CREATE INDEX IF NOT EXISTS conversations_session_idx ON conversations(patient_id, session_id, timestamp);

PRAGMA user_version = 1;
";
