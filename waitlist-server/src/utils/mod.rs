//! Utilities: logging, request extraction, error re-exports

pub mod extract;
pub mod logger;

pub use extract::{Actor, parse_json, parse_optional_json};
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

/// Run a blocking queue operation off the async runtime
pub async fn blocking<T, E, F>(op: F) -> AppResult<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| AppError::internal(format!("Blocking task failed: {e}")))?
        .map_err(Into::into)
}
