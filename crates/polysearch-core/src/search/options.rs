//! Search options and their normalization
//!
//! Callers describe a search with [`SearchOptions`]. Before execution the
//! options are normalized: pagination values out of range are corrected, never
//! rejected, and exactly one [`Pagination`] strategy is chosen.

use serde::{Deserialize, Serialize};

use super::condition::{ParentScope, RawFragments, TypeWhitelist};

/// Rows returned when no limit is given (or a negative one)
pub const DEFAULT_LIMIT: u32 = 10;

/// Page size used in page mode when none is given
pub const DEFAULT_PER_PAGE: u32 = 30;

/// Options accepted by a search call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Rehydrate domain objects (true) or return raw owner references
    pub active_record: bool,
    pub parent_id: Option<ParentScope>,
    pub only: TypeWhitelist,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    #[serde(flatten)]
    pub fragments: RawFragments,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            active_record: true,
            parent_id: None,
            only: TypeWhitelist::default(),
            limit: None,
            offset: None,
            page: None,
            per_page: None,
            fragments: RawFragments::default(),
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return raw owner references instead of loading records
    pub fn raw(mut self) -> Self {
        self.active_record = false;
        self
    }

    pub fn active_record(mut self, active_record: bool) -> Self {
        self.active_record = active_record;
        self
    }

    pub fn parent_id(mut self, parent: impl Into<ParentScope>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn only(mut self, types: impl Into<TypeWhitelist>) -> Self {
        self.only = types.into();
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Switch to page based pagination; overrides limit and offset
    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.fragments.select = Some(select.into());
        self
    }

    pub fn joins(mut self, joins: impl Into<String>) -> Self {
        self.fragments.joins = Some(joins.into());
        self
    }

    pub fn where_clause(mut self, condition: impl Into<String>) -> Self {
        self.fragments.where_clause = Some(condition.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.fragments.group = Some(group.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.fragments.having = Some(having.into());
        self
    }

    /// Resolve the pagination strategy
    ///
    /// A page number selects page mode; otherwise offset/limit mode applies.
    pub fn pagination(&self, default_per_page: u32) -> Pagination {
        match self.page {
            Some(page) => Pagination::Page {
                page: clamp_positive(page).unwrap_or(1),
                per_page: self
                    .per_page
                    .and_then(clamp_positive)
                    .unwrap_or(default_per_page.max(1)),
            },
            None => Pagination::Offset {
                offset: self
                    .offset
                    .map(|offset| u32::try_from(offset.max(0)).unwrap_or(u32::MAX))
                    .unwrap_or(0),
                limit: match self.limit {
                    None => Some(DEFAULT_LIMIT),
                    Some(0) => None,
                    Some(limit) if limit < 0 => Some(DEFAULT_LIMIT),
                    Some(limit) => Some(u32::try_from(limit).unwrap_or(u32::MAX)),
                },
            },
        }
    }
}

fn clamp_positive(value: i64) -> Option<u32> {
    if value < 1 {
        None
    } else {
        Some(u32::try_from(value).unwrap_or(u32::MAX))
    }
}

/// Normalized pagination strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pagination {
    /// Skip `offset` rows and return at most `limit` (unbounded when `None`)
    Offset { offset: u32, limit: Option<u32> },
    /// Return page `page` (1-based) of `per_page` rows and count all matches
    Page { page: u32, per_page: u32 },
}

impl Pagination {
    /// Rows to skip
    pub fn offset(&self) -> u64 {
        match *self {
            Self::Offset { offset, .. } => u64::from(offset),
            Self::Page { page, per_page } => u64::from(page - 1) * u64::from(per_page),
        }
    }

    /// Maximum rows to return, `None` meaning unlimited
    pub fn limit(&self) -> Option<u32> {
        match *self {
            Self::Offset { limit, .. } => limit,
            Self::Page { per_page, .. } => Some(per_page),
        }
    }

    /// Whether a total count is computed alongside the rows
    pub fn counts_total(&self) -> bool {
        matches!(self, Self::Page { .. })
    }
}

/// Pagination metadata reported in page mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub current_page: u32,
    pub per_page: u32,
    pub total_entries: u64,
}

impl PageInfo {
    pub fn total_pages(&self) -> u64 {
        self.total_entries.div_ceil(u64::from(self.per_page.max(1)))
    }

    pub fn has_next_page(&self) -> bool {
        u64::from(self.current_page) < self.total_pages()
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }
}
