//! Index row and search hit types
//!
//! Defines the persisted index row, the polymorphic owner reference and the
//! ephemeral ranked hit produced by a single search.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::error::{Error, Result};

/// Default physical name of the index table
pub const DEFAULT_INDEX_TABLE: &str = "fulltext_rows";

/// Validated physical name of the index table
///
/// The name is interpolated into SQL, so it is checked once when resolved and
/// never accepted raw afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexTable(String);

impl IndexTable {
    /// Create a table name, rejecting anything that isn't a plain identifier
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Config(format!(
                "Invalid index table name '{}': use letters, digits and underscores only",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Name of the content table
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Name of the FTS5 virtual table shadowing the content table
    pub fn fts_name(&self) -> String {
        format!("{}_fts", self.0)
    }
}

impl Default for IndexTable {
    fn default() -> Self {
        Self(DEFAULT_INDEX_TABLE.to_string())
    }
}

impl fmt::Display for IndexTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IndexTable {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<IndexTable> for String {
    fn from(table: IndexTable) -> Self {
        table.0
    }
}

/// Reference to an indexed domain object of some logical type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: i64,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: i64) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

/// One row of the index table, binding a domain object to its searchable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FulltextRow {
    pub owner_type: String,
    pub owner_id: i64,
    pub indexed_text: String,
    pub parent_id: Option<i64>,
}

impl FulltextRow {
    /// Create a new index row without a parent
    pub fn new(owner_type: impl Into<String>, owner_id: i64, indexed_text: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
            indexed_text: indexed_text.into(),
            parent_id: None,
        }
    }

    /// Set the parent used for scoped searches
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Reference to the owning domain object
    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type.clone(), self.owner_id)
    }

    /// Check the invariants enforced before a row is written
    pub fn validate(&self) -> Result<()> {
        if self.owner_type.trim().is_empty() {
            return Err(Error::Validation("owner_type can't be blank".to_string()));
        }
        Ok(())
    }
}

/// A ranked row produced by one search execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub owner: OwnerRef,
    /// Match score for this query; higher is more relevant
    pub relevancy: f64,
}
