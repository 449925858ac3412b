//! Polysearch Core Library
//!
//! This crate provides ranked full-text search over a single SQLite index
//! table shared by records of many owner types, including:
//! - Query normalization into FTS5 prefix expressions
//! - Safe filter assembly (type whitelist, parent scoping, caller fragments)
//! - Ranked execution with offset/limit or page pagination
//! - Rehydration of hits into domain records in rank order
//! - Storage (SQLite + FTS5, versioned migrations)

pub mod config;
pub mod error;
pub mod search;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::search::{
        FulltextRow, Hits, Identified, IndexRepository, IndexTable, LoaderRegistry, OwnerRef,
        RecordLoader, SearchOptions, SearchOutput, SearchService,
    };
    pub use crate::storage::{Database, DatabaseConfig};
}
