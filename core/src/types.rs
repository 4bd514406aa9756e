use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::Error;

pub const SALT_LEN: usize = 16;

fn decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

/// SHA-256 of a file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short_string(&self) -> String {
        self.to_hex().chars().take(8).collect()
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s)
            .map(Self)
            .ok_or_else(|| Error::InvalidHash(s.to_string()))
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ContentHash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Random per-configuration salt for the password KDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    pub fn new(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Salt {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s)
            .map(Self)
            .ok_or_else(|| Error::InvalidSalt(s.to_string()))
    }
}

impl Serialize for Salt {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Salt::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Address of a stored object.
///
/// Derived from the content hash *and* the write configuration, so the same
/// bytes stored encrypted, compressed, or under another salt never share an
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey([u8; 32]);

impl StoreKey {
    pub fn derive(hash: &ContentHash, encrypted: bool, compressed: bool, salt: Option<&Salt>) -> Self {
        let mode_tag = format!(
            "{}_{}_{}",
            if encrypted { "enc" } else { "raw" },
            if compressed { "zip" } else { "nozip" },
            salt.map(Salt::to_hex).unwrap_or_default(),
        );

        let mut hasher = Sha256::new();
        hasher.update(hash.to_hex().as_bytes());
        hasher.update(mode_tag.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short_string(&self) -> String {
        self.to_hex().chars().take(8).collect()
    }

    /// First two hex characters, used as the fan-out directory.
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }
}

impl FromStr for StoreKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed(s)
            .map(Self)
            .ok_or_else(|| Error::InvalidHash(s.to_string()))
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Result of scanning a source tree. Paths are absolute.
#[derive(Debug, Clone, Default)]
pub struct ScanManifest {
    pub files: Vec<PathBuf>,
    pub total_size: u64,
    pub total_files: usize,
    pub hashes: BTreeMap<PathBuf, ContentHash>,
}

impl ScanManifest {
    pub fn push(&mut self, path: PathBuf, hash: ContentHash, size: u64) {
        self.hashes.insert(path.clone(), hash);
        self.files.push(path);
        self.total_size += size;
        self.total_files += 1;
    }

    pub fn hash_of(&self, path: &std::path::Path) -> Option<&ContentHash> {
        self.hashes.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &ContentHash)> {
        self.files
            .iter()
            .filter_map(|path| self.hashes.get(path).map(|hash| (path, hash)))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub version: String,
    pub copied: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_files: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreSummary {
    pub output_dir: PathBuf,
    pub restored: usize,
    pub errors: usize,
    pub total_files: usize,
    /// Files whose restored bytes did not hash back to the manifest entry.
    pub integrity_failures: Vec<String>,
    /// First few per-file error messages; the full list goes to the log.
    pub error_samples: Vec<String>,
}

impl RestoreSummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.integrity_failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifySummary {
    pub verified: usize,
    pub errors: usize,
    pub total_files: usize,
    pub integrity_failures: Vec<String>,
    pub error_samples: Vec<String>,
}

impl VerifySummary {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.integrity_failures.is_empty()
    }
}
