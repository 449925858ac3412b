//! Search façade
//!
//! Normalizes options, runs the ranked query and rehydrates the hits.

use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Instant;
use tracing::info;

use super::condition::ConditionBuilder;
use super::entity::{IndexTable, OwnerRef};
use super::executor::{RankedRows, SearchExecutor};
use super::options::{DEFAULT_PER_PAGE, PageInfo, Pagination, SearchOptions};
use super::query::SearchExpression;
use super::rehydrate::{Identified, LoaderRegistry, rehydrate};
use crate::error::Result;

/// Search results in either output mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "items", rename_all = "snake_case")]
pub enum Hits<T> {
    /// Loaded domain records in rank order
    Records(Vec<T>),
    /// Owner references in rank order
    Refs(Vec<OwnerRef>),
}

impl<T> Hits<T> {
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Refs(refs) => refs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Option<&[T]> {
        match self {
            Self::Records(records) => Some(records),
            Self::Refs(_) => None,
        }
    }

    pub fn refs(&self) -> Option<&[OwnerRef]> {
        match self {
            Self::Records(_) => None,
            Self::Refs(refs) => Some(refs),
        }
    }

    pub fn into_records(self) -> Option<Vec<T>> {
        match self {
            Self::Records(records) => Some(records),
            Self::Refs(_) => None,
        }
    }

    pub fn into_refs(self) -> Option<Vec<OwnerRef>> {
        match self {
            Self::Records(_) => None,
            Self::Refs(refs) => Some(refs),
        }
    }
}

/// Result of one search call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutput<T> {
    pub hits: Hits<T>,
    /// Present when the search paginated by page
    pub page: Option<PageInfo>,
}

/// Full-text search over one index table
#[derive(Debug, Clone)]
pub struct SearchService<T> {
    executor: SearchExecutor,
    registry: LoaderRegistry<T>,
    default_per_page: u32,
}

impl<T> SearchService<T>
where
    T: Identified + Clone + Send,
{
    /// Create a service searching `table` and loading records via `registry`
    pub fn new(pool: SqlitePool, table: IndexTable, registry: LoaderRegistry<T>) -> Self {
        Self {
            executor: SearchExecutor::new(pool, table),
            registry,
            default_per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Page size used when page mode is requested without one
    pub fn with_default_per_page(mut self, per_page: u32) -> Self {
        self.default_per_page = per_page.max(1);
        self
    }

    pub fn table(&self) -> &IndexTable {
        self.executor.table()
    }

    pub fn registry(&self) -> &LoaderRegistry<T> {
        &self.registry
    }

    /// Search and return records or owner references, per `active_record`
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchOutput<T>> {
        let started = Instant::now();
        let rows = self.raw_search(query, options).await?;

        let hits = if options.active_record {
            Hits::Records(rehydrate(&self.registry, &rows.hits).await?)
        } else {
            Hits::Refs(rows.hits.into_iter().map(|hit| hit.owner).collect())
        };

        info!(
            query = %query,
            hits = hits.len(),
            total = rows.page.map(|page| page.total_entries),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(SearchOutput {
            hits,
            page: rows.page,
        })
    }

    /// Ranked hits with their relevancy, without loading records
    pub async fn raw_search(&self, query: &str, options: &SearchOptions) -> Result<RankedRows> {
        let expression = SearchExpression::parse(query);
        let pagination = options.pagination(self.default_per_page);

        if expression.is_empty() {
            return Ok(RankedRows {
                hits: Vec::new(),
                page: match pagination {
                    Pagination::Page { page, per_page } => Some(PageInfo {
                        current_page: page,
                        per_page,
                        total_entries: 0,
                    }),
                    Pagination::Offset { .. } => None,
                },
            });
        }

        let conditions = ConditionBuilder::new(
            self.executor.table(),
            &expression,
            &options.only,
            options.parent_id.as_ref(),
            &options.fragments,
        );
        self.executor.execute(&conditions, pagination).await
    }
}
