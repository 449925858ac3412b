//! Search domain module
//!
//! Ranked full-text search over one denormalized index table shared by
//! records of many owner types.
//!
//! # Architecture
//!
//! - **Query**: `SearchExpression` turns free text into an FTS5 prefix query
//! - **Conditions**: `ConditionBuilder` adds the type whitelist, parent scope
//!   and caller fragments
//! - **Executor**: `SearchExecutor` runs the ranked, paginated statement
//! - **Rehydration**: `LoaderRegistry` and `rehydrate` load records per type
//!   and restore rank order
//! - **Service**: `SearchService` ties it together per call
//! - **Repository**: `IndexRepository` writes and removes index rows
//!
//! # Example
//!
//! ```ignore
//! use polysearch_core::search::{LoaderRegistry, SearchOptions, SearchService};
//!
//! let registry = LoaderRegistry::new()
//!     .register("Article", ArticleLoader::new(pool.clone()))
//!     .register("Comment", CommentLoader::new(pool.clone()));
//! let service = SearchService::new(pool, table, registry);
//!
//! // Ten most relevant articles under parent 7
//! let options = SearchOptions::new().only("Article").parent_id(7);
//! let output = service.search("database engine", &options).await?;
//! ```

pub mod condition;
pub mod entity;
pub mod executor;
pub mod options;
pub mod query;
pub mod rehydrate;
pub mod repository;
pub mod service;

// Re-export main types
pub use condition::{
    ConditionBuilder, ParentScope, RawFragments, TypeWhitelist, camelize, coerce_integer,
};
pub use entity::{DEFAULT_INDEX_TABLE, FulltextRow, IndexTable, OwnerRef, SearchHit};
pub use executor::{RankedRows, SearchExecutor};
pub use options::{DEFAULT_LIMIT, DEFAULT_PER_PAGE, PageInfo, Pagination, SearchOptions};
pub use query::SearchExpression;
pub use rehydrate::{Identified, LoaderRegistry, RecordLoader, rehydrate};
pub use repository::{IndexRepository, IndexedRowLoader};
pub use service::{Hits, SearchOutput, SearchService};
