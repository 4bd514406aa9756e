use crate::{Error, Result, StoreKey};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub const OBJECTS_DIR: &str = "objects";

/// Source of objects that are missing from the local store, such as a
/// bucket mirroring `objects/`.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Downloads the object for `key` to `dest`, creating parent directories.
    async fn fetch_object(&self, key: &StoreKey, dest: &Path) -> Result<()>;
}

/// Content-addressed blob storage under `<backup_root>/objects/<xx>/<key>`.
///
/// Objects are written once and never modified; a second `put` for a key
/// that already exists is a no-op.
#[derive(Clone)]
pub struct ObjectStore {
    root: PathBuf,
    remote: Option<Arc<dyn RemoteFetcher>>,
}

impl ObjectStore {
    pub fn new<P: AsRef<Path>>(backup_root: P) -> Self {
        Self {
            root: backup_root.as_ref().join(OBJECTS_DIR),
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteFetcher>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, key: &StoreKey) -> PathBuf {
        self.root.join(key.prefix()).join(key.to_hex())
    }

    pub async fn contains(&self, key: &StoreKey) -> bool {
        fs::try_exists(self.object_path(key)).await.unwrap_or(false)
    }

    /// Stores `data` under `key`. Returns `false` when the key already existed.
    ///
    /// The blob is written to a temporary sibling and renamed into place, so
    /// readers never observe a partially written object.
    pub async fn put(&self, key: &StoreKey, data: &[u8]) -> Result<bool> {
        let path = self.object_path(key);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }

        write_atomic(&path, data).await?;
        debug!("Stored object {} ({} bytes)", key.short_string(), data.len());
        Ok(true)
    }

    /// Makes sure the object is present locally, asking the remote if needed.
    pub async fn ensure_local(&self, key: &StoreKey) -> Result<PathBuf> {
        let path = self.object_path(key);
        if fs::try_exists(&path).await? {
            return Ok(path);
        }

        match &self.remote {
            Some(remote) => {
                info!("Fetching object {} from remote", key.short_string());
                remote.fetch_object(key, &path).await?;
                if fs::try_exists(&path).await? {
                    Ok(path)
                } else {
                    Err(Error::ObjectNotFound { key: key.to_hex() })
                }
            }
            None => Err(Error::ObjectNotFound { key: key.to_hex() }),
        }
    }

    pub async fn read(&self, key: &StoreKey) -> Result<Vec<u8>> {
        let path = self.ensure_local(key).await?;
        Ok(fs::read(path).await?)
    }

    /// Number of objects currently in the store.
    pub async fn count(&self) -> Result<usize> {
        let mut count = 0;
        if !fs::try_exists(&self.root).await? {
            return Ok(0);
        }

        let mut fanout = fs::read_dir(&self.root).await?;
        while let Some(dir) = fanout.next_entry().await? {
            if !dir.file_type().await?.is_dir() {
                continue;
            }
            let mut objects = fs::read_dir(dir.path()).await?;
            while let Some(object) = objects.next_entry().await? {
                let name = object.file_name();
                if object.file_type().await?.is_file() && !name.to_string_lossy().starts_with('.') {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

/// Writes via a uniquely named temp file in the same directory, then renames.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Other(format!("No parent directory for {}", path.display())))?;
    fs::create_dir_all(parent).await?;

    let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
