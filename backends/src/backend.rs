use async_trait::async_trait;
use bytes::Bytes;
use keepsafe_core::Result;

/// Read access to a remote copy of a backup root.
///
/// Paths are `/`-separated and relative to the backup root, e.g.
/// `objects/ab/ab12...`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Fails with `Error::ObjectNotFound` when `path` does not exist.
    async fn read(&self, path: &str) -> Result<Bytes>;
}
