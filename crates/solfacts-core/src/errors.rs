//! Error types for the solfacts core library.

/// Top-level error enum for the solfacts core library.
///
/// `NotFound` and `InvalidArgument` are boundary conditions reported back to
/// callers inside failed responses. `CacheCorruption` is deliberately distinct
/// from `NotFound`: a missing artifact means "build fresh", a corrupted one
/// means "build fresh and say so".
#[derive(Debug, thiserror::Error)]
pub enum FactsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FactsResult<T> = Result<T, FactsError>;
