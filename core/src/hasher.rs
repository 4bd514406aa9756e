use crate::ContentHash;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

pub const BLOCK_SIZE: usize = 64 * 1024;

/// Streams `path` through SHA-256 in fixed-size blocks.
///
/// Returns `None` when the file cannot be opened or read; callers skip such
/// files instead of failing the run.
pub async fn hash_file(path: &Path) -> Option<ContentHash> {
    match try_hash_file(path).await {
        Ok(hash) => Some(hash),
        Err(e) => {
            debug!("Cannot hash {}: {}", path.display(), e);
            None
        }
    }
}

async fn try_hash_file(path: &Path) -> std::io::Result<ContentHash> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(ContentHash::new(hasher.finalize().into()))
}

pub fn hash_bytes(data: &[u8]) -> ContentHash {
    ContentHash::new(Sha256::digest(data).into())
}
