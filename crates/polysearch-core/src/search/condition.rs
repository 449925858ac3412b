//! Filter predicate assembly
//!
//! Combines the full-text match with the owner type whitelist, parent scoping
//! and caller supplied SQL fragments. Whitelist and parent values are always
//! bound as parameters. Caller fragments are trusted and pushed verbatim.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use tracing::debug;

use super::entity::IndexTable;
use super::query::SearchExpression;

/// Owner types a search is restricted to
///
/// Candidates are camelized and validated on insertion. Anything that isn't a
/// plain identifier is dropped, so an empty whitelist means "all types".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TypeWhitelist {
    types: Vec<String>,
}

impl TypeWhitelist {
    /// Build a whitelist from raw candidates
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::default();
        let mut seen = HashSet::new();
        for candidate in candidates {
            let raw = candidate.as_ref();
            let name = camelize(raw);
            if !is_identifier(&name) {
                debug!(candidate = %raw, "Dropping invalid owner type from whitelist");
                continue;
            }
            if seen.insert(name.to_ascii_lowercase()) {
                whitelist.types.push(name);
            }
        }
        whitelist
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Validated type names in first-seen order
    pub fn types(&self) -> &[String] {
        &self.types
    }
}

impl From<TypeWhitelist> for Vec<String> {
    fn from(whitelist: TypeWhitelist) -> Self {
        whitelist.types
    }
}

impl From<&str> for TypeWhitelist {
    fn from(value: &str) -> Self {
        Self::new([value])
    }
}

impl From<String> for TypeWhitelist {
    fn from(value: String) -> Self {
        Self::new([value])
    }
}

impl<S: AsRef<str>> From<Vec<S>> for TypeWhitelist {
    fn from(value: Vec<S>) -> Self {
        Self::new(value)
    }
}

impl<S: AsRef<str>, const N: usize> From<[S; N]> for TypeWhitelist {
    fn from(value: [S; N]) -> Self {
        Self::new(value)
    }
}

/// Canonical type name form: `blog_post` becomes `BlogPost`
pub fn camelize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Restriction of a search to one or more parents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentScope {
    One(i64),
    Many(Vec<i64>),
}

impl ParentScope {
    /// Scope from string input using permissive integer coercion
    ///
    /// A single value yields an equality scope, several values a membership
    /// scope. Returns `None` when no values are given.
    pub fn coerce<I, S>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<i64> = values
            .into_iter()
            .map(|value| coerce_integer(value.as_ref()))
            .collect();
        match ids.len() {
            0 => None,
            1 => ids.pop().map(Self::One),
            _ => Some(Self::Many(ids)),
        }
    }
}

impl From<i64> for ParentScope {
    fn from(value: i64) -> Self {
        Self::One(value)
    }
}

impl From<Vec<i64>> for ParentScope {
    fn from(value: Vec<i64>) -> Self {
        Self::Many(value)
    }
}

impl From<&[i64]> for ParentScope {
    fn from(value: &[i64]) -> Self {
        Self::Many(value.to_vec())
    }
}

/// Parse the leading integer of a string, yielding 0 when there is none
///
/// `"12abc"` is 12, `"abc"` is 0, `"  -4"` is -4. Out of range values
/// saturate.
pub fn coerce_integer(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
        });
    if negative { -magnitude } else { magnitude }
}

/// Raw SQL pieces supplied by the caller
///
/// These are concatenated into the statement as-is. Their correctness and
/// safety are the caller's responsibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFragments {
    pub select: Option<String>,
    pub joins: Option<String>,
    pub where_clause: Option<String>,
    pub group: Option<String>,
    pub having: Option<String>,
}

fn present(fragment: &Option<String>) -> Option<&str> {
    fragment.as_deref().map(str::trim).filter(|f| !f.is_empty())
}

/// Writes the filter parts of a search statement into a query builder
#[derive(Debug, Clone, Copy)]
pub struct ConditionBuilder<'a> {
    table: &'a IndexTable,
    expression: &'a SearchExpression,
    whitelist: &'a TypeWhitelist,
    parent: Option<&'a ParentScope>,
    fragments: &'a RawFragments,
}

impl<'a> ConditionBuilder<'a> {
    pub fn new(
        table: &'a IndexTable,
        expression: &'a SearchExpression,
        whitelist: &'a TypeWhitelist,
        parent: Option<&'a ParentScope>,
        fragments: &'a RawFragments,
    ) -> Self {
        Self {
            table,
            expression,
            whitelist,
            parent,
            fragments,
        }
    }

    /// Name of the ranked derived table the outer query reads from
    pub fn ranked_source(&self) -> String {
        format!("{}_ranked", self.table.name())
    }

    /// `WITH` clause computing relevancy over the matching, filtered rows
    ///
    /// FTS5 ranking functions can't run in an aggregate query, so the match,
    /// whitelist and parent scope are evaluated here and materialized before
    /// caller fragments, grouping and ordering apply.
    pub fn push_ranked_source(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let table = self.table.name();
        let fts = self.table.fts_name();
        builder.push(format!(
            "WITH {} AS MATERIALIZED (SELECT {table}.*, -bm25({fts}) AS relevancy \
             FROM {table} JOIN {fts} ON {fts}.rowid = {table}.id",
            self.ranked_source()
        ));
        self.push_match_filters(builder);
        builder.push(")");
    }

    /// Append caller select expressions after the ranked columns
    pub fn push_select_extra(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(select) = present(&self.fragments.select) {
            builder.push(", ").push(select);
        }
    }

    /// `FROM` the ranked source, aliased as the index table, plus joins
    pub fn push_from(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(format!(" FROM {} AS {}", self.ranked_source(), self.table.name()));
        if let Some(joins) = present(&self.fragments.joins) {
            builder.push(" ").push(joins);
        }
    }

    /// Caller `WHERE` condition over the ranked rows
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(condition) = present(&self.fragments.where_clause) {
            builder.push(" WHERE (").push(condition).push(")");
        }
    }

    /// `GROUP BY` and `HAVING` as supplied
    pub fn push_grouping(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some(group) = present(&self.fragments.group) {
            builder.push(" GROUP BY ").push(group);
        }
        if let Some(having) = present(&self.fragments.having) {
            builder.push(" HAVING ").push(having);
        }
    }

    /// Match, whitelist and parent scope, all bound as parameters
    fn push_match_filters(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let table = self.table.name();
        builder
            .push(format!(" WHERE {} MATCH ", self.table.fts_name()))
            .push_bind(self.expression.to_fts5());

        if !self.whitelist.is_empty() {
            builder.push(format!(" AND {table}.owner_type IN ("));
            let mut types = builder.separated(", ");
            for owner_type in self.whitelist.types() {
                types.push_bind(owner_type.clone());
            }
            types.push_unseparated(")");
        }

        match self.parent {
            Some(ParentScope::One(parent_id)) => {
                builder
                    .push(format!(" AND {table}.parent_id = "))
                    .push_bind(*parent_id);
            }
            Some(ParentScope::Many(parent_ids)) if parent_ids.is_empty() => {
                builder.push(" AND 1 = 0");
            }
            Some(ParentScope::Many(parent_ids)) => {
                builder.push(format!(" AND {table}.parent_id IN ("));
                let mut ids = builder.separated(", ");
                for parent_id in parent_ids {
                    ids.push_bind(*parent_id);
                }
                ids.push_unseparated(")");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_sql(whitelist: &TypeWhitelist, parent: Option<&ParentScope>) -> String {
        let table = IndexTable::default();
        let expression = SearchExpression::parse("database");
        let fragments = RawFragments::default();
        let conditions = ConditionBuilder::new(&table, &expression, whitelist, parent, &fragments);
        let mut builder = QueryBuilder::<Sqlite>::new("");
        conditions.push_ranked_source(&mut builder);
        builder.sql().to_string()
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("article"), "Article");
        assert_eq!(camelize("blog_post"), "BlogPost");
        assert_eq!(camelize("Foo"), "Foo");
        assert_eq!(camelize("bar$"), "Bar$");
        assert_eq!(camelize("_"), "");
    }

    #[test]
    fn test_whitelist_drops_invalid_candidates() {
        let whitelist = TypeWhitelist::from(vec!["Foo", "bar$"]);
        assert_eq!(whitelist.types(), ["Foo"]);

        let whitelist = TypeWhitelist::from(["x'); DROP TABLE fulltext_rows; --", "'"]);
        assert!(whitelist.is_empty());
    }

    #[test]
    fn test_whitelist_collapses_duplicates_case_insensitively() {
        let whitelist = TypeWhitelist::new(["article", "Article", "ARTICLE", "blog_post", "BlogPost"]);
        assert_eq!(whitelist.types(), ["Article", "BlogPost"]);
    }

    #[test]
    fn test_single_type_whitelist() {
        assert_eq!(TypeWhitelist::from("comment").types(), ["Comment"]);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(coerce_integer("42"), 42);
        assert_eq!(coerce_integer("12abc"), 12);
        assert_eq!(coerce_integer("abc"), 0);
        assert_eq!(coerce_integer(""), 0);
        assert_eq!(coerce_integer("  -4"), -4);
        assert_eq!(coerce_integer("+9x"), 9);
        assert_eq!(coerce_integer("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_parent_scope_coercion() {
        assert_eq!(ParentScope::coerce(["7"]), Some(ParentScope::One(7)));
        assert_eq!(ParentScope::coerce(["7", "x"]), Some(ParentScope::Many(vec![7, 0])));
        assert_eq!(ParentScope::coerce(Vec::<String>::new()), None);
    }

    #[test]
    fn test_ranked_source_with_match_only() {
        let sql = source_sql(&TypeWhitelist::default(), None);
        assert_eq!(
            sql,
            "WITH fulltext_rows_ranked AS MATERIALIZED (SELECT fulltext_rows.*, \
             -bm25(fulltext_rows_fts) AS relevancy \
             FROM fulltext_rows JOIN fulltext_rows_fts ON fulltext_rows_fts.rowid = fulltext_rows.id \
             WHERE fulltext_rows_fts MATCH ?)"
        );
    }

    #[test]
    fn test_ranked_source_with_whitelist_and_parents() {
        let whitelist = TypeWhitelist::from(["Article", "Comment"]);
        let parent = ParentScope::Many(vec![1, 2, 3]);
        let sql = source_sql(&whitelist, Some(&parent));
        assert!(sql.ends_with(
            "WHERE fulltext_rows_fts MATCH ? \
             AND fulltext_rows.owner_type IN (?, ?) \
             AND fulltext_rows.parent_id IN (?, ?, ?))"
        ));
    }

    #[test]
    fn test_ranked_source_with_single_parent() {
        let sql = source_sql(&TypeWhitelist::default(), Some(&ParentScope::One(7)));
        assert!(sql.ends_with("MATCH ? AND fulltext_rows.parent_id = ?)"));
    }

    #[test]
    fn test_empty_parent_list_matches_nothing() {
        let sql = source_sql(&TypeWhitelist::default(), Some(&ParentScope::Many(vec![])));
        assert!(sql.ends_with(" AND 1 = 0)"));
    }

    #[test]
    fn test_caller_fragments_apply_to_ranked_rows() {
        let table = IndexTable::new("docs").unwrap();
        let expression = SearchExpression::parse("x");
        let whitelist = TypeWhitelist::from("Article");
        let fragments = RawFragments {
            select: Some("docs.parent_id".to_string()),
            joins: Some("JOIN people ON people.id = docs.owner_id".to_string()),
            where_clause: Some("people.active = 1".to_string()),
            group: Some("docs.parent_id".to_string()),
            having: Some("COUNT(*) > 1".to_string()),
        };
        let conditions = ConditionBuilder::new(&table, &expression, &whitelist, None, &fragments);
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT docs.owner_type");
        conditions.push_select_extra(&mut builder);
        conditions.push_from(&mut builder);
        conditions.push_where(&mut builder);
        conditions.push_grouping(&mut builder);
        assert_eq!(
            builder.sql(),
            "SELECT docs.owner_type, docs.parent_id \
             FROM docs_ranked AS docs \
             JOIN people ON people.id = docs.owner_id \
             WHERE (people.active = 1) \
             GROUP BY docs.parent_id HAVING COUNT(*) > 1"
        );
    }

    #[test]
    fn test_blank_fragments_are_ignored() {
        let table = IndexTable::default();
        let expression = SearchExpression::parse("x");
        let whitelist = TypeWhitelist::default();
        let fragments = RawFragments {
            where_clause: Some("   ".to_string()),
            group: Some(String::new()),
            ..Default::default()
        };
        let conditions = ConditionBuilder::new(&table, &expression, &whitelist, None, &fragments);
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT 1");
        conditions.push_where(&mut builder);
        conditions.push_grouping(&mut builder);
        assert_eq!(builder.sql(), "SELECT 1");
    }
}
