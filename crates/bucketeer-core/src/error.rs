//! Error types for the Bucketeer core.

/// Core error type for Bucketeer configuration and catalog handling.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The catalog document failed validation.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Tag generation could not produce a complete tag set.
    #[error("tag generation error: {0}")]
    Tags(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
