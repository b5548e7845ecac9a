use crate::currency::Currency;
use crate::worker::RequestKind;

#[derive(Debug, thiserror::Error)]
pub enum CoinCacheError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    WorkerUnavailable(#[from] WorkerUnavailable),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Failure raised by the transform worker for a single request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("no exchange rate from {from} to {to}")]
    MissingRate { from: Currency, to: Currency },

    #[error("exchange rate from {from} to {to} is not a finite positive number: {rate}")]
    NonFiniteRate { from: Currency, to: Currency, rate: f64 },

    #[error("expected a {expected:?} reply, got {actual:?}")]
    UnexpectedReply { expected: RequestKind, actual: RequestKind },
}

/// Returned by [`WorkerHandle::post_message`](crate::worker::WorkerHandle::post_message)
/// when no worker is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transform worker is not initialized")]
pub struct WorkerUnavailable;

pub type Result<T> = std::result::Result<T, CoinCacheError>;
