use crate::backend::Backend;
use crate::retry::{retry_with_backoff, RetryConfig};
use async_trait::async_trait;
use keepsafe_core::store::{write_atomic, OBJECTS_DIR};
use keepsafe_core::{Error, RemoteFetcher, Result, StoreKey};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Pulls missing objects from a remote copy of the backup root.
pub struct BackendFetcher {
    backend: Arc<dyn Backend>,
    retry: RetryConfig,
}

impl BackendFetcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Remote location of an object, mirroring the local fan-out layout.
    pub fn remote_path(key: &StoreKey) -> String {
        format!("{}/{}/{}", OBJECTS_DIR, key.prefix(), key.to_hex())
    }
}

#[async_trait]
impl RemoteFetcher for BackendFetcher {
    async fn fetch_object(&self, key: &StoreKey, dest: &Path) -> Result<()> {
        let remote_path = Self::remote_path(key);

        // An absent object fails fast without a download attempt.
        if !retry_with_backoff(&self.retry, "object_exists", || self.backend.exists(&remote_path)).await? {
            return Err(Error::ObjectNotFound { key: key.to_hex() });
        }

        debug!("Downloading {}", remote_path);
        let data = retry_with_backoff(&self.retry, "fetch_object", || self.backend.read(&remote_path)).await?;
        write_atomic(dest, &data).await
    }
}
