//! Database migrations
//!
//! This module manages SQLite schema migrations for chatsift.
//! Migrations are versioned, additive and applied automatically on database connection.

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: Initial schema
const MIGRATION_V1: &str = r#"
    -- Tracked group chats
    CREATE TABLE IF NOT EXISTS chat (
        id INTEGER PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        enabled BOOLEAN NOT NULL
    );

    -- Observed users
    CREATE TABLE IF NOT EXISTS peer (
        id INTEGER PRIMARY KEY NOT NULL,
        full_name TEXT NOT NULL,
        username TEXT NOT NULL
    );

    -- Active participation of a peer in a chat
    CREATE TABLE IF NOT EXISTS membership (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL REFERENCES chat(id),
        peer_id INTEGER NOT NULL REFERENCES peer(id),
        UNIQUE(chat_id, peer_id)
    );

    CREATE INDEX IF NOT EXISTS idx_membership_peer_id ON membership(peer_id);

    -- Indexed messages, id is "<chat_id>_<msg_id>"
    CREATE TABLE IF NOT EXISTS message (
        id TEXT PRIMARY KEY NOT NULL,
        chat_id INTEGER NOT NULL REFERENCES chat(id),
        from_id INTEGER NOT NULL REFERENCES peer(id),
        msg_id INTEGER NOT NULL,
        text TEXT NOT NULL CHECK (text <> ''),
        timestamp INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_message_chat_id_msg_id ON message(chat_id, msg_id, text);
"#;

/// Migration 2: Soft-delete marker
const MIGRATION_V2: &str = r#"
    ALTER TABLE message ADD COLUMN deleted BOOLEAN NOT NULL DEFAULT 0;

    DROP INDEX IF EXISTS idx_message_chat_id_msg_id;
    CREATE INDEX IF NOT EXISTS idx_message ON message(chat_id, from_id, msg_id, text, timestamp, deleted);
"#;

/// Get the current schema version (0 when nothing has been applied)
async fn get_current_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (version,): (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

/// Record a migration as applied
async fn record_migration(pool: &SqlitePool, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    // Apply migrations in order
    if current_version < 1 {
        tracing::info!("Applying migration v1: Initial schema");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Soft-delete marker");
        sqlx::raw_sql(MIGRATION_V2).execute(pool).await?;
        record_migration(pool, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone, serde::Serialize)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}
