//! SQLite schema and migrations for the history store.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    // WAL lets readers proceed while a save is in flight
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    if current_version(conn) < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

/// Highest applied schema version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    current_version(conn) >= SCHEMA_VERSION
}

fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS performance_records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            theorem_category TEXT NOT NULL,
            strategy TEXT NOT NULL,
            methods TEXT NOT NULL,
            domain TEXT NOT NULL DEFAULT '',
            success INTEGER NOT NULL,
            confidence REAL NOT NULL,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            recorded_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_category ON performance_records(theorem_category)",
        [],
    )?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}
