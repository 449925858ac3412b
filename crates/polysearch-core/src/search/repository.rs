//! Index row persistence
//!
//! Write path used by the collaborators that own indexed records, plus a
//! loader that rehydrates hits as their own index rows.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

use super::entity::{FulltextRow, IndexTable, OwnerRef};
use super::rehydrate::{Identified, LoaderRegistry, RecordLoader};
use crate::error::Result;

/// Repository for the rows of one index table
#[derive(Debug, Clone)]
pub struct IndexRepository {
    pool: SqlitePool,
    table: IndexTable,
}

impl IndexRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: SqlitePool, table: IndexTable) -> Self {
        Self { pool, table }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn table(&self) -> &IndexTable {
        &self.table
    }

    /// Insert or refresh the index row of a record
    pub async fn index(&self, row: &FulltextRow) -> Result<()> {
        row.validate()?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (owner_type, owner_id, indexed_text, parent_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(owner_type, owner_id) DO UPDATE SET
                indexed_text = excluded.indexed_text,
                parent_id = excluded.parent_id,
                updated_at = CURRENT_TIMESTAMP
            "#,
            table = self.table.name()
        ))
        .bind(&row.owner_type)
        .bind(row.owner_id)
        .bind(&row.indexed_text)
        .bind(row.parent_id)
        .execute(&self.pool)
        .await?;

        info!(owner = %row.owner(), parent_id = ?row.parent_id, "Record indexed");
        Ok(())
    }

    /// Drop the index row of a record; returns whether one existed
    pub async fn remove(&self, owner: &OwnerRef) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE owner_type = ? AND owner_id = ?",
            self.table.name()
        ))
        .bind(&owner.owner_type)
        .bind(owner.owner_id)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(owner = %owner, "Record removed from index");
        }
        Ok(removed)
    }

    /// Drop every index row of an owner type
    pub async fn remove_all(&self, owner_type: &str) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE owner_type = ?", self.table.name()))
            .bind(owner_type)
            .execute(&self.pool)
            .await?;

        info!(owner_type = %owner_type, removed = result.rows_affected(), "Owner type removed from index");
        Ok(result.rows_affected())
    }

    /// Get the index row of a record
    pub async fn get(&self, owner: &OwnerRef) -> Result<Option<FulltextRow>> {
        let row = sqlx::query_as::<_, FulltextRow>(&format!(
            "SELECT owner_type, owner_id, indexed_text, parent_id FROM {} \
             WHERE owner_type = ? AND owner_id = ?",
            self.table.name()
        ))
        .bind(&owner.owner_type)
        .bind(owner.owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Get the index rows of several records of one type, in no particular order
    pub async fn get_many(&self, owner_type: &str, ids: &[i64]) -> Result<Vec<FulltextRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT owner_type, owner_id, indexed_text, parent_id FROM {} WHERE owner_type = ",
            self.table.name()
        ));
        query.push_bind(owner_type).push(" AND owner_id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows = query.build_query_as::<FulltextRow>().fetch_all(&self.pool).await?;
        debug!(owner_type = %owner_type, requested = ids.len(), found = rows.len(), "Fetched index rows");
        Ok(rows)
    }

    /// Number of indexed records
    pub async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table.name()))
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Distinct owner types present in the index, sorted
    pub async fn owner_types(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT owner_type FROM {} ORDER BY owner_type",
            self.table.name()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(owner_type,)| owner_type).collect())
    }

    /// Registry loading every owner type currently indexed as plain index rows
    pub async fn row_registry(&self) -> Result<LoaderRegistry<FulltextRow>> {
        let registry = self
            .owner_types()
            .await?
            .into_iter()
            .fold(LoaderRegistry::new(), |registry, owner_type| {
                let loader = IndexedRowLoader::new(self.clone(), owner_type.clone());
                registry.register(owner_type, loader)
            });
        Ok(registry)
    }
}

impl Identified for FulltextRow {
    fn id(&self) -> i64 {
        self.owner_id
    }
}

/// Loads the index rows of one owner type
#[derive(Debug, Clone)]
pub struct IndexedRowLoader {
    repository: IndexRepository,
    owner_type: String,
}

impl IndexedRowLoader {
    pub fn new(repository: IndexRepository, owner_type: impl Into<String>) -> Self {
        Self {
            repository,
            owner_type: owner_type.into(),
        }
    }
}

#[async_trait]
impl RecordLoader<FulltextRow> for IndexedRowLoader {
    async fn load(&self, ids: &[i64]) -> Result<Vec<FulltextRow>> {
        self.repository.get_many(&self.owner_type, ids).await
    }
}
