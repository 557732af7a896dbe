//! SQL schema for the vector index database.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per embedded result row. Rows are only replaced by an upsert of
-- the same doc_id or removed by retention eviction.
CREATE TABLE IF NOT EXISTS result_documents (
    doc_id     TEXT PRIMARY KEY,   -- '{turn_id}_row_{row_index}'
    turn_id    TEXT NOT NULL,
    row_index  INTEGER NOT NULL,
    text       TEXT NOT NULL,
    dimension  INTEGER NOT NULL,
    embedding  BLOB NOT NULL,      -- little-endian f32 x dimension
    stored_at  TEXT NOT NULL       -- RFC 3339 UTC, fixed microsecond width
);

CREATE INDEX IF NOT EXISTS result_documents_turn_idx   ON result_documents(turn_id);
CREATE INDEX IF NOT EXISTS result_documents_stored_idx ON result_documents(stored_at);

PRAGMA user_version = 1;
";
