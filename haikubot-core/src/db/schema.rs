//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: reply ledger
    r#"
    CREATE TABLE IF NOT EXISTS replies (
        event_id         TEXT PRIMARY KEY,
        meter            TEXT NOT NULL,
        reply_id         TEXT NOT NULL,
        relays_accepted  INTEGER NOT NULL,
        replied_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_replies_replied_at ON replies(replied_at);
    "#,
    // Version 2: ingestion watermark (single row)
    r#"
    CREATE TABLE IF NOT EXISTS watermark (
        id               INTEGER PRIMARY KEY CHECK (id = 1),
        created_at       INTEGER NOT NULL,
        updated_at       DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
