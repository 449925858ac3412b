//! Ranked query execution
//!
//! Runs the filtered full-text query against the index table and returns hits
//! ordered by relevancy, with a total count when paginating by page.

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use super::condition::ConditionBuilder;
use super::entity::{IndexTable, OwnerRef, SearchHit};
use super::options::{PageInfo, Pagination};
use crate::error::Result;

/// Ordered hits of one search, plus page metadata in page mode
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRows {
    pub hits: Vec<SearchHit>,
    pub page: Option<PageInfo>,
}

/// Executes ranked searches against one index table
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    pool: SqlitePool,
    table: IndexTable,
}

impl SearchExecutor {
    pub fn new(pool: SqlitePool, table: IndexTable) -> Self {
        Self { pool, table }
    }

    pub fn table(&self) -> &IndexTable {
        &self.table
    }

    /// Run the ranked query and, in page mode, the matching count
    pub async fn execute(
        &self,
        conditions: &ConditionBuilder<'_>,
        pagination: Pagination,
    ) -> Result<RankedRows> {
        let mut query = self.ranked_query(conditions, pagination);
        debug!(sql = query.sql(), "Executing ranked search");

        let rows = query.build().fetch_all(&self.pool).await?;
        let hits = rows
            .iter()
            .map(|row| -> Result<SearchHit> {
                Ok(SearchHit {
                    owner: OwnerRef::new(
                        row.try_get::<String, _>("owner_type")?,
                        row.try_get::<i64, _>("owner_id")?,
                    ),
                    relevancy: row.try_get::<f64, _>("relevancy")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let page = match pagination {
            Pagination::Page { page, per_page } => Some(PageInfo {
                current_page: page,
                per_page,
                total_entries: self.count(conditions).await?,
            }),
            Pagination::Offset { .. } => None,
        };

        Ok(RankedRows { hits, page })
    }

    /// Number of rows matching the filter, ignoring limit and offset
    ///
    /// With a caller `GROUP BY` this is the number of groups.
    pub async fn count(&self, conditions: &ConditionBuilder<'_>) -> Result<u64> {
        let mut query = QueryBuilder::new("");
        conditions.push_ranked_source(&mut query);
        query.push(" SELECT COUNT(*) FROM (");
        self.push_ranked_select(&mut query, conditions);
        query.push(")");
        debug!(sql = query.sql(), "Counting search matches");

        let total: i64 = query.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    pub(crate) fn ranked_query(
        &self,
        conditions: &ConditionBuilder<'_>,
        pagination: Pagination,
    ) -> QueryBuilder<'static, Sqlite> {
        let table = self.table.name();
        let mut query = QueryBuilder::new("");
        conditions.push_ranked_source(&mut query);
        query.push(" ");
        self.push_ranked_select(&mut query, conditions);
        query.push(format!(
            " ORDER BY relevancy DESC, {table}.indexed_text ASC, {table}.id ASC"
        ));

        let offset = i64::try_from(pagination.offset()).unwrap_or(i64::MAX);
        match pagination.limit() {
            Some(limit) => {
                query
                    .push(" LIMIT ")
                    .push_bind(i64::from(limit))
                    .push(" OFFSET ")
                    .push_bind(offset);
            }
            // SQLite only accepts OFFSET after a LIMIT; -1 means no limit
            None if offset > 0 => {
                query.push(" LIMIT -1 OFFSET ").push_bind(offset);
            }
            None => {}
        }
        query
    }

    /// Outer select over the ranked source, with caller fragments applied
    fn push_ranked_select(&self, query: &mut QueryBuilder<'_, Sqlite>, conditions: &ConditionBuilder<'_>) {
        let table = self.table.name();
        query.push(format!(
            "SELECT {table}.owner_type, {table}.owner_id, {table}.relevancy AS relevancy"
        ));
        conditions.push_select_extra(query);
        conditions.push_from(query);
        conditions.push_where(query);
        conditions.push_grouping(query);
    }
}
