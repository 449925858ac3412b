//! Query normalization
//!
//! Turns free text into an FTS5 boolean expression where every whitespace
//! separated token matches as a prefix.

use std::fmt;

/// Normalized full-text match expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchExpression {
    terms: Vec<String>,
}

impl SearchExpression {
    /// Build an expression from raw user input
    ///
    /// Tokens without a single alphanumeric character are skipped: the FTS5
    /// tokenizer reduces them to nothing.
    pub fn parse(query: &str) -> Self {
        Self {
            terms: query
                .split_whitespace()
                .filter(|token| token.chars().any(char::is_alphanumeric))
                .map(str::to_string)
                .collect(),
        }
    }

    /// An empty expression matches nothing
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Tokens as typed by the user
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Render the expression in FTS5 query syntax
    ///
    /// Each term becomes a quoted prefix phrase, so operator characters in
    /// user input are matched literally instead of being parsed.
    pub fn to_fts5(&self) -> String {
        self.terms
            .iter()
            .map(|term| format!("\"{}\"*", term.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

impl fmt::Display for SearchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fts5())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_token_becomes_prefix() {
        let expr = SearchExpression::parse("database engine");
        assert_eq!(expr.terms(), ["database", "engine"]);
        assert_eq!(expr.to_fts5(), "\"database\"* OR \"engine\"*");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let expr = SearchExpression::parse("  data \t\n base  ");
        assert_eq!(expr.to_fts5(), "\"data\"* OR \"base\"*");
    }

    #[test]
    fn test_blank_query_matches_nothing() {
        assert!(SearchExpression::parse("").is_empty());
        assert!(SearchExpression::parse(" \t\n").is_empty());
        assert_eq!(SearchExpression::parse("   ").to_fts5(), "");
    }

    #[test]
    fn test_punctuation_only_tokens_are_skipped() {
        let expr = SearchExpression::parse("rust - && sqlite");
        assert_eq!(expr.terms(), ["rust", "sqlite"]);
        assert!(SearchExpression::parse("-- ** ()").is_empty());
    }

    #[test]
    fn test_quotes_and_operators_are_literal() {
        let expr = SearchExpression::parse("say\"hi NEAR(a b) -x");
        assert_eq!(
            expr.to_string(),
            "\"say\"\"hi\"* OR \"NEAR(a\"* OR \"b)\"* OR \"-x\"*"
        );
    }
}
