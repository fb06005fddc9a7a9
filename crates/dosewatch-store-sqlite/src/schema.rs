//! SQL schema for the dosewatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    contact     TEXT NOT NULL UNIQUE,  -- messaging address, E.164
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS medicines (
    record_id   TEXT PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    times_json  TEXT NOT NULL,         -- JSON array of canonical 'HH:MM'
    start_date  TEXT NOT NULL,         -- ISO 8601 calendar date
    end_date    TEXT NOT NULL,
    notes       TEXT NOT NULL DEFAULT '',
    recorded_at TEXT NOT NULL          -- ISO 8601 UTC; server-assigned
);

CREATE INDEX IF NOT EXISTS medicines_subject_idx ON medicines(subject_id);
CREATE INDEX IF NOT EXISTS medicines_end_idx     ON medicines(end_date);

PRAGMA user_version = 1;
";
