use crate::store::write_atomic;
use crate::{ContentHash, Result, Salt};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub timestamp: String,
    pub salt: Option<Salt>,
    pub encryption: Option<String>,
    #[serde(default)]
    pub comment: String,
    pub total_files: usize,
    pub compression_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub hash: ContentHash,
    /// Some extensions are never compressed, whatever the version flag says.
    #[serde(default)]
    pub compressed: bool,
}

/// Declarative record of one backup run: how to decode it and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    pub info: VersionInfo,
    /// Keyed by `/`-separated path relative to the scanned source root.
    pub files: BTreeMap<String, FileRecord>,
}

impl VersionManifest {
    pub fn new(timestamp: DateTime<Local>, comment: impl Into<String>, compression_enabled: bool) -> Self {
        Self {
            info: VersionInfo {
                timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
                salt: None,
                encryption: None,
                comment: comment.into(),
                total_files: 0,
                compression_enabled,
            },
            files: BTreeMap::new(),
        }
    }

    pub fn with_encryption(mut self, salt: Salt, algorithm: &str) -> Self {
        self.info.salt = Some(salt);
        self.info.encryption = Some(algorithm.to_string());
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.info.salt.is_some()
    }

    pub fn salt(&self) -> Option<&Salt> {
        self.info.salt.as_ref()
    }

    pub fn add_file(&mut self, rel_path: String, hash: ContentHash, compressed: bool) {
        self.files.insert(rel_path, FileRecord { hash, compressed });
    }

    pub fn summary(&self) -> String {
        let mut flags = Vec::new();
        if self.is_encrypted() {
            flags.push("encrypted");
        }
        if self.info.compression_enabled {
            flags.push("compressed");
        }
        format!(
            "{} - {} files{}{}",
            self.info.timestamp,
            self.files.len(),
            if flags.is_empty() { String::new() } else { format!(" [{}]", flags.join(", ")) },
            if self.info.comment.is_empty() { String::new() } else { format!(" \"{}\"", self.info.comment) },
        )
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json).await
    }
}
