use mb_core::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Runs `fut` under a deadline; elapsing maps to [`Error::Timeout`].
pub async fn with_timeout<T, F>(operation: impl Into<String>, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation: operation.into(),
            after,
        }),
    }
}
