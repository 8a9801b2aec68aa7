use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS aggregates (
    aggregate_id BLOB PRIMARY KEY CHECK (length(aggregate_id) = 16),
    owner_key TEXT NOT NULL UNIQUE,
    original_ref BLOB CHECK (original_ref IS NULL OR length(original_ref) = 16),
    can_add INTEGER NOT NULL DEFAULT 1,
    can_delete INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS records (
    record_id BLOB PRIMARY KEY CHECK (length(record_id) = 16),
    aggregate_id BLOB NOT NULL REFERENCES aggregates (aggregate_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    datasource TEXT,
    replacement TEXT,
    hide_component INTEGER NOT NULL DEFAULT 0,
    sort_key INTEGER NOT NULL,
    can_write INTEGER NOT NULL DEFAULT 1,
    can_delete INTEGER NOT NULL DEFAULT 1,
    read_only INTEGER NOT NULL DEFAULT 0,
    locked_by TEXT,
    UNIQUE (aggregate_id, name COLLATE NOCASE)
);
CREATE INDEX IF NOT EXISTS idx_records_aggregate ON records (aggregate_id, sort_key);

CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    path TEXT NOT NULL
);
";
