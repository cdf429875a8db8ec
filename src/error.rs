//! Error types for contrib-rank
//!
//! Domain variants mirror the precondition/lookup failures every ranking call can
//! raise. They are identical under all storage strategies: driver errors are
//! folded into [`RankError::Backend`] so callers never match on rusqlite or sqlx.

use uuid::Uuid;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, RankError>;

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error("invalid weights: text={text}, vector={vector} (at least one must be positive, none negative)")]
    InvalidWeights { text: f64, vector: f64 },

    #[error("invalid limit {0}: result cap must be a positive integer")]
    InvalidLimit(i64),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("repository not found: {0}")]
    RepositoryNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{strategy} backend error: {message}")]
    Backend {
        strategy: &'static str,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RankError {
    pub(crate) fn backend(strategy: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            strategy,
            message: message.into(),
        }
    }

    /// Short machine-readable code, used by the CLI's JSON error output.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidWeights { .. } => "invalid_weights",
            Self::InvalidLimit(_) => "invalid_limit",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::RepositoryNotFound(_) => "repository_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::Config(_) => "config",
            Self::Backend { .. } => "backend",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}

impl From<rusqlite::Error> for RankError {
    fn from(err: rusqlite::Error) -> Self {
        Self::backend("sqlite", err.to_string())
    }
}

impl From<sqlx::Error> for RankError {
    fn from(err: sqlx::Error) -> Self {
        Self::backend("postgres", err.to_string())
    }
}

impl From<serde_json::Error> for RankError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
