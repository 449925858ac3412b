//! Storage layer - SQLite with FTS5
//!
//! Provides database management and index table migrations.
//!
//! # Architecture
//!
//! - `database`: Connection pool management and initialization
//! - `migrations`: Per-index-table schema versioning and automatic migration
//!
//! # Usage
//!
//! ```ignore
//! use polysearch_core::storage::{Database, DatabaseConfig};
//!
//! // Create an in-memory database for testing
//! let db = Database::in_memory().await?;
//!
//! // Or open a file database for a custom index table
//! let db = Database::new(DatabaseConfig::with_path("search.db").index_table(table)).await?;
//! ```

pub mod database;
pub mod migrations;

// Re-export commonly used types
pub use database::{Database, DatabaseConfig, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
