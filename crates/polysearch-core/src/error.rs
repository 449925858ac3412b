//! Error types for Polysearch

use thiserror::Error;

/// Result type alias using Polysearch's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Polysearch error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Rehydration errors (E001-E099)
    #[error("{owner_type} record(s) not found for id(s) {ids:?}. The search index references rows that no longer exist.")]
    RecordNotFound { owner_type: String, ids: Vec<i64> },

    #[error("No loader registered for owner type '{0}'. Register one before searching.")]
    UnregisteredType(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Validation failed: {0}")]
    Validation(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::RecordNotFound { .. } => "E001",
            Self::UnregisteredType(_) => "E002",
            Self::Database(_) => "E400",
            Self::Config(_) => "E600",
            Self::Validation(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::RecordNotFound { owner_type, ids } => Some(format!(
                "polysearch remove {} {}",
                owner_type,
                ids.first().copied().unwrap_or_default()
            )),
            Self::Config(_) => Some("polysearch config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error signals an index row pointing at a deleted record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}
