//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks the
//! current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS reminders (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            scheduled_time TEXT NOT NULL,
            creator_id TEXT NOT NULL,
            updated_by TEXT,
            creator_role TEXT NOT NULL,
            send_email INTEGER NOT NULL DEFAULT 0,
            target_email TEXT,
            email_subject TEXT,
            email_body TEXT,
            for_client INTEGER NOT NULL DEFAULT 0,
            sent INTEGER NOT NULL DEFAULT 0,
            sent_at TEXT,
            email_status TEXT NOT NULL DEFAULT 'queued',
            last_error TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            category TEXT,
            subcategory TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reminders_due
            ON reminders(deleted, send_email, sent, scheduled_time);
        CREATE INDEX IF NOT EXISTS idx_reminders_creator ON reminders(creator_id);

        CREATE TABLE IF NOT EXISTS checklist_items (
            id TEXT PRIMARY KEY,
            creator_id TEXT NOT NULL,
            text TEXT NOT NULL,
            deadline TEXT,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checklist_creator ON checklist_items(creator_id);

        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL UNIQUE,
            doc TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_client ON conversations(client_id);

        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            folder TEXT NOT NULL,
            file_name TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            content_type TEXT NOT NULL,
            uploaded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id);

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#,
}];

/// Apply any migrations newer than the current schema version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("create _migrations: {e}")))?;

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("read version: {e}")))?;
    let current: i64 = match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get(0)
            .map_err(|e| DatabaseError::Migration(e.to_string()))?,
        None => 0,
    };

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| DatabaseError::Migration(format!("{}: {e}", migration.name)))?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("record {}: {e}", migration.name)))?;
        tracing::info!(version = migration.version, name = migration.name, "Migration applied");
    }

    Ok(())
}
