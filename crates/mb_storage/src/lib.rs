use async_trait::async_trait;
use mb_core::{ArticleStore, Error, Result};
use std::sync::Arc;

pub mod backends;
pub mod retry;

pub use backends::*;
pub use retry::{RetryPolicy, RetryingStore};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self>
    where
        Self: Sized;
}

/// Names accepted by [`create_storage`].
pub fn available_backends() -> &'static [&'static str] {
    #[cfg(feature = "sqlite")]
    {
        &["sqlite", "memory"]
    }
    #[cfg(not(feature = "sqlite"))]
    {
        &["memory"]
    }
}

/// Opens the named backend and wraps it in a [`RetryingStore`].
///
/// `location` is the database path for `sqlite` (`sqlite:` prefixes are
/// accepted) and is ignored by `memory`.
pub async fn create_storage(
    kind: &str,
    location: Option<&str>,
    policy: RetryPolicy,
) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        "memory" => {
            let storage = <MemoryStorage as StorageBackend>::new().await?;
            Ok(Arc::new(RetryingStore::new(storage, policy)))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let storage = match location {
                Some(location) => SqliteStorage::open(location).await?,
                None => <SqliteStorage as StorageBackend>::new().await?,
            };
            Ok(Arc::new(RetryingStore::new(storage, policy)))
        }
        other => {
            let _ = location;
            Err(Error::Config(format!(
                "unknown storage backend '{}', expected one of: {}",
                other,
                available_backends().join(", ")
            )))
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::retry::{RetryPolicy, RetryingStore};
    pub use super::{create_storage, StorageBackend};
}
