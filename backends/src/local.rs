use crate::backend::Backend;
use async_trait::async_trait;
use bytes::Bytes;
use keepsafe_core::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A backup root reachable through the filesystem (mounted share, USB disk).
pub struct LocalBackend {
    base_path: PathBuf,
}

impl LocalBackend {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.base_path.clone(), |acc, part| acc.join(part))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        match fs::read(self.full_path(path)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::ObjectNotFound {
                key: path.to_string(),
            }),
            Err(e) => Err(Error::Backend(format!("Failed to read {}: {}", path, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_and_exists() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("objects/ab")).unwrap();
        std::fs::write(dir.path().join("objects/ab/ab01"), b"blob").unwrap();
        std::fs::write(dir.path().join("objects/ab/ab02"), b"blob2").unwrap();

        let backend = LocalBackend::new(dir.path());
        assert!(backend.exists("objects/ab/ab01").await.unwrap());
        assert!(!backend.exists("objects/ab/ffff").await.unwrap());
        assert_eq!(backend.read("objects/ab/ab01").await.unwrap(), Bytes::from_static(b"blob"));
        assert_eq!(backend.read("/objects/ab/ab02").await.unwrap(), Bytes::from_static(b"blob2"));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path());
        assert!(matches!(
            backend.read("objects/00/0000").await,
            Err(Error::ObjectNotFound { .. })
        ));
    }
}
