//! Database migrations
//!
//! Schema changes are applied in order and recorded in `schema_version`.
//! To add one: bump `SCHEMA_VERSION`, write `migrate_vN` and call it from
//! `run_migrations`.

use rusqlite::Connection;
use tracing::{debug, error, info};

use super::connection::DatabaseError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(DatabaseError::Migration(format!(
            "database schema version {current_version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    if current_version == SCHEMA_VERSION {
        debug!(version = current_version, "Database schema is up to date");
        return Ok(());
    }

    info!(
        from_version = current_version,
        to_version = SCHEMA_VERSION,
        "Running database migrations"
    );

    if current_version < 1 {
        if let Err(e) = migrate_v1(conn) {
            error!(version = 1, error = %e, "Migration V001 (sessions) failed");
            return Err(e);
        }
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!(version = SCHEMA_VERSION, "Database migrations complete");
    Ok(())
}

/// Get current schema version
pub fn get_schema_version(conn: &Connection) -> Result<i32, DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// V001: one row per session, uploads kept as a JSON array
fn migrate_v1(conn: &Connection) -> Result<(), DatabaseError> {
    debug!("Applying migration V001: sessions");

    conn.execute_batch(
        "
        BEGIN;

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN (
                'created', 'audio_uploaded', 'processing', 'transcribing', 'transcribed',
                'reframing', 'reframed', 'generating_audio', 'completed', 'error'
            )),
            audio_files TEXT NOT NULL DEFAULT '[]',
            transcript TEXT,
            reframed_text TEXT,
            generated_audio_url TEXT,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_owner_created
            ON sessions(owner_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

        COMMIT;
        ",
    )?;

    Ok(())
}
