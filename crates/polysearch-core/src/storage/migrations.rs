//! Database migrations
//!
//! This module manages the SQLite schema of an index table and its FTS5
//! shadow. Migrations are versioned per index table and applied
//! automatically on database connection.

use sqlx::SqlitePool;

use crate::search::IndexTable;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// SQL for creating the migrations tracking table
const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _polysearch_migrations (
        index_table TEXT NOT NULL,
        version INTEGER NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (index_table, version)
    );
"#;

/// Migration 1: Index table and its external-content FTS5 table
fn migration_v1(table: &IndexTable) -> String {
    format!(
        r#"
    CREATE TABLE IF NOT EXISTS {table} (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_type TEXT NOT NULL CHECK (length(trim(owner_type)) > 0),
        owner_id INTEGER NOT NULL,
        indexed_text TEXT NOT NULL DEFAULT '',
        parent_id INTEGER,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (owner_type, owner_id)
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS {fts} USING fts5(
        indexed_text,
        content='{table}',
        content_rowid='id'
    );

    -- Triggers to keep the FTS index in sync
    CREATE TRIGGER IF NOT EXISTS {table}_ai AFTER INSERT ON {table} BEGIN
        INSERT INTO {fts}(rowid, indexed_text)
        VALUES (NEW.id, NEW.indexed_text);
    END;

    CREATE TRIGGER IF NOT EXISTS {table}_ad AFTER DELETE ON {table} BEGIN
        INSERT INTO {fts}({fts}, rowid, indexed_text)
        VALUES ('delete', OLD.id, OLD.indexed_text);
    END;

    CREATE TRIGGER IF NOT EXISTS {table}_au AFTER UPDATE ON {table} BEGIN
        INSERT INTO {fts}({fts}, rowid, indexed_text)
        VALUES ('delete', OLD.id, OLD.indexed_text);
        INSERT INTO {fts}(rowid, indexed_text)
        VALUES (NEW.id, NEW.indexed_text);
    END;
"#,
        table = table.name(),
        fts = table.fts_name(),
    )
}

/// Migration 2: Lookup indexes for scoped and type-restricted searches
fn migration_v2(table: &IndexTable) -> String {
    format!(
        r#"
    CREATE INDEX IF NOT EXISTS idx_{table}_parent_id ON {table}(parent_id);
    CREATE INDEX IF NOT EXISTS idx_{table}_owner_type ON {table}(owner_type);
"#,
        table = table.name(),
    )
}

/// Get the current schema version of an index table
async fn get_current_version(pool: &SqlitePool, table: &IndexTable) -> anyhow::Result<i32> {
    // Ensure migrations table exists
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (version,): (Option<i32>,) =
        sqlx::query_as("SELECT MAX(version) FROM _polysearch_migrations WHERE index_table = ?")
            .bind(table.name())
            .fetch_one(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

/// Record that a migration has been applied
async fn record_migration(pool: &SqlitePool, table: &IndexTable, version: i32) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO _polysearch_migrations (index_table, version) VALUES (?, ?)")
        .bind(table.name())
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations for an index table
pub async fn run_migrations(pool: &SqlitePool, table: &IndexTable) -> anyhow::Result<()> {
    let current_version = get_current_version(pool, table).await?;

    tracing::info!(
        index_table = %table,
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking database migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Database is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: Index table and FTS5 index");
        sqlx::raw_sql(&migration_v1(table)).execute(pool).await?;
        record_migration(pool, table, 1).await?;
    }

    if current_version < 2 {
        tracing::info!("Applying migration v2: Parent and owner type indexes");
        sqlx::raw_sql(&migration_v2(table)).execute(pool).await?;
        record_migration(pool, table, 2).await?;
    }

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Get migration status information
pub async fn migration_status(pool: &SqlitePool, table: &IndexTable) -> anyhow::Result<MigrationStatus> {
    let current_version = get_current_version(pool, table).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version in the database
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}
