use crate::catalog::{validate_project, DirectoryCatalog, VersionCatalog, VersionRef};
use crate::codec::{self, should_compress};
use crate::crypto::Crypter;
use crate::hasher::{hash_bytes, hash_file};
use crate::manifest::{FileRecord, VersionManifest, MANIFEST_FILE, TIMESTAMP_FORMAT};
use crate::progress::{no_progress, ProgressEvent, SharedProgress};
use crate::store::{ObjectStore, RemoteFetcher};
use crate::{BackupSummary, Error, RestoreSummary, Result, Salt, ScanManifest, StoreKey, VerifySummary};
use chrono::Local;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// How many per-file error messages a summary carries.
pub const ERROR_SAMPLE_LIMIT: usize = 5;

/// Extension appended to files restored without full decoding.
pub const RAW_SUFFIX: &str = "raw";

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub source_root: PathBuf,
    pub project: String,
    pub comment: String,
    pub compress: bool,
    pub password: Option<String>,
    /// Reuse this salt instead of generating one. Ignored without a password.
    pub forced_salt: Option<Salt>,
}

impl BackupOptions {
    pub fn new(source_root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
            project: project.into(),
            comment: String::new(),
            compress: true,
            password: None,
            forced_salt: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_salt(mut self, salt: Option<Salt>) -> Self {
        self.forced_salt = salt;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub project: String,
    pub version: String,
    pub destination: PathBuf,
    pub password: Option<String>,
    /// When false, encrypted objects are written out still encrypted.
    pub decrypt: bool,
    /// When false, compressed objects are written out still compressed.
    pub decompress: bool,
}

impl RestoreOptions {
    pub fn new(project: impl Into<String>, version: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
            destination: destination.into(),
            password: None,
            decrypt: true,
            decompress: true,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn technical(mut self, decrypt: bool, decompress: bool) -> Self {
        self.decrypt = decrypt;
        self.decompress = decompress;
        self
    }

    /// Both transforms are reversed, so output equals the original files.
    pub fn is_clean(&self) -> bool {
        self.decrypt && self.decompress
    }
}

/// Creates, lists, restores and verifies versions under one backup root.
///
/// ```text
/// backup_root/
/// ├── objects/<xx>/<store key>        # deduplicated payloads
/// └── <project>/<timestamp>/manifest.json
/// ```
pub struct VersionManager {
    root: PathBuf,
    store: ObjectStore,
    catalog: Arc<dyn VersionCatalog>,
    progress: SharedProgress,
}

impl VersionManager {
    pub fn new<P: AsRef<Path>>(backup_root: P) -> Self {
        let root = backup_root.as_ref().to_path_buf();
        Self {
            store: ObjectStore::new(&root),
            catalog: Arc::new(DirectoryCatalog::new(&root)),
            progress: no_progress(),
            root,
        }
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteFetcher>) -> Self {
        self.store = self.store.with_remote(remote);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn VersionCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub async fn list_projects(&self) -> Result<Vec<String>> {
        self.catalog.list_projects().await
    }

    pub async fn list_versions(&self, project: Option<&str>, filter: Option<&str>) -> Result<Vec<VersionRef>> {
        self.catalog.list_versions(project, filter).await
    }

    pub async fn latest_version(&self, project: Option<&str>, filter: Option<&str>) -> Result<Option<VersionRef>> {
        self.catalog.latest(project, filter).await
    }

    pub async fn load_manifest(&self, project: &str, version: &str) -> Result<VersionManifest> {
        let path = self.catalog.find_manifest(project, version).await?;
        VersionManifest::load(&path).await
    }

    /// Salt of the newest encrypted version of `project`, if any.
    pub async fn latest_salt(&self, project: &str) -> Result<Option<Salt>> {
        for version in self.catalog.list_versions(Some(project), None).await?.iter().rev() {
            let manifest = VersionManifest::load(&version.manifest_path()).await?;
            if let Some(salt) = manifest.salt() {
                return Ok(Some(*salt));
            }
        }
        Ok(None)
    }

    /// Stores every scanned file and writes a new version manifest.
    ///
    /// Per-file failures are counted and logged; the run continues and the
    /// failed files are left out of the manifest.
    pub async fn create_backup(&self, scan: &ScanManifest, options: &BackupOptions) -> Result<BackupSummary> {
        validate_project(&options.project)?;
        let source_root = std::path::absolute(&options.source_root)?;
        let now = Local::now();
        let version_dir = self.create_version_dir(&options.project, &now.format(TIMESTAMP_FORMAT).to_string()).await?;
        let version = dir_name(&version_dir);

        let crypter = options
            .password
            .as_deref()
            .map(|password| Crypter::new(password, options.forced_salt));
        let salt = crypter.as_ref().map(Crypter::salt);

        let mut manifest = VersionManifest::new(now, options.comment.clone(), options.compress);
        if let Some(crypter) = &crypter {
            manifest = manifest.with_encryption(*crypter.salt(), crypter.algorithm());
        }
        manifest.info.total_files = scan.total_files;

        info!(
            "Backing up {} files into {}/{} (compression: {}, encryption: {})",
            scan.total_files,
            options.project,
            version,
            options.compress,
            crypter.is_some()
        );

        let total = scan.total_files as u64;
        let (mut copied, mut skipped, mut errors) = (0usize, 0usize, 0usize);

        for (path, hash) in scan.iter() {
            let Some(rel_path) = relative_key(path, &source_root) else {
                errors += 1;
                error!("{} is not a UTF-8 path under {}", path.display(), source_root.display());
                continue;
            };

            let compressed = should_compress(path, options.compress);
            let key = StoreKey::derive(hash, crypter.is_some(), compressed, salt);

            if self.store.contains(&key).await {
                skipped += 1;
                debug!("Dedup hit for {}", rel_path);
            } else {
                match self.store_file(path, &key, compressed, crypter.as_ref()).await {
                    Ok(true) => copied += 1,
                    Ok(false) => skipped += 1,
                    Err(e) => {
                        errors += 1;
                        error!("Failed to store {}: {}", path.display(), e);
                        continue;
                    }
                }
            }

            manifest.add_file(rel_path, *hash, compressed);
            self.progress.on_progress(&ProgressEvent::new(
                (copied + skipped) as u64,
                Some(total),
                file_label(path),
            ));
        }

        manifest.save(&version_dir.join(MANIFEST_FILE)).await?;
        info!(
            "Version {} written: {} copied, {} deduplicated, {} errors",
            version, copied, skipped, errors
        );

        Ok(BackupSummary {
            version,
            copied,
            skipped,
            errors,
            total_files: scan.total_files,
        })
    }

    async fn create_version_dir(&self, project: &str, timestamp: &str) -> Result<PathBuf> {
        let project_dir = self.root.join(project);
        fs::create_dir_all(&project_dir).await?;

        // Two runs within the same second get `_1`, `_2`, ... so neither
        // manifest is overwritten; the suffix keeps name order chronological.
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => timestamp.to_string(),
                n => format!("{}_{}", timestamp, n),
            };
            let dir = project_dir.join(name);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn store_file(&self, path: &Path, key: &StoreKey, compressed: bool, crypter: Option<&Crypter>) -> Result<bool> {
        let mut data = fs::read(path).await?;

        if compressed {
            data = codec::compress(&data)?;
        }
        if codec::is_padded(compressed, crypter.is_some()) {
            data = codec::pad(&data)?;
        }
        if let Some(crypter) = crypter {
            data = crypter.encrypt(&data)?;
        }

        self.store.put(key, &data).await
    }

    /// Rebuilds a version under `<destination>/<project>_<version>/`.
    ///
    /// A wrong password aborts the whole restore with
    /// [`Error::AuthenticationFailed`]. Missing objects, bad padding and
    /// decompression failures only skip the affected file.
    pub async fn restore_version(&self, options: &RestoreOptions) -> Result<RestoreSummary> {
        let manifest = self.load_manifest(&options.project, &options.version).await?;
        let crypter = self.crypter_for(&manifest, options.password.as_deref(), options.decrypt)?;

        let output_dir = options
            .destination
            .join(format!("{}_{}", options.project, options.version));
        fs::create_dir_all(&output_dir).await?;

        let total = manifest.files.len();
        info!(
            "Restoring {} files from {}/{} to {}",
            total,
            options.project,
            options.version,
            output_dir.display()
        );

        let mut summary = RestoreSummary {
            output_dir: output_dir.clone(),
            restored: 0,
            errors: 0,
            total_files: total,
            integrity_failures: Vec::new(),
            error_samples: Vec::new(),
        };

        for (index, (rel_path, record)) in manifest.files.iter().enumerate() {
            let result = self
                .restore_file(&manifest, rel_path, record, crypter.as_ref(), options, &output_dir)
                .await;

            match result {
                Ok(written) => {
                    summary.restored += 1;
                    if options.is_clean() && hash_file(&written).await != Some(record.hash) {
                        error!("ALARM: {} does not match its recorded hash {}", rel_path, record.hash.short_string());
                        summary.integrity_failures.push(rel_path.clone());
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!("Restore aborted at {}: {}", rel_path, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Failed to restore {}: {}", rel_path, e);
                    summary.errors += 1;
                    if summary.error_samples.len() < ERROR_SAMPLE_LIMIT {
                        summary.error_samples.push(format!("{}: {}", rel_path, e));
                    }
                }
            }

            self.progress
                .on_progress(&ProgressEvent::new(index as u64 + 1, Some(total as u64), rel_path.as_str()));
        }

        info!(
            "Restored {}/{} files ({} errors, {} integrity failures)",
            summary.restored,
            total,
            summary.errors,
            summary.integrity_failures.len()
        );
        Ok(summary)
    }

    async fn restore_file(
        &self,
        manifest: &VersionManifest,
        rel_path: &str,
        record: &FileRecord,
        crypter: Option<&Crypter>,
        options: &RestoreOptions,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let mut dest = output_path(output_dir, rel_path)?;
        let data = self
            .decode_object(manifest, rel_path, record, crypter, options.decompress)
            .await?;

        if !options.is_clean() {
            let name = format!("{}.{}", file_label(&dest), RAW_SUFFIX);
            dest.set_file_name(name);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&dest, &data).await?;

        debug!("Restored {} ({} bytes)", dest.display(), data.len());
        Ok(dest)
    }

    /// Reads an object and reverses as many transforms as allowed.
    ///
    /// Padding is stripped once the payload is no longer ciphertext, and only
    /// for objects that were padded when written (compressed or encrypted).
    async fn decode_object(
        &self,
        manifest: &VersionManifest,
        rel_path: &str,
        record: &FileRecord,
        crypter: Option<&Crypter>,
        decompress: bool,
    ) -> Result<Vec<u8>> {
        let encrypted = manifest.is_encrypted();
        let key = StoreKey::derive(&record.hash, encrypted, record.compressed, manifest.salt());
        let mut data = self.store.read(&key).await?;

        let mut sealed = encrypted;
        if let Some(crypter) = crypter {
            data = crypter.decrypt(&data).map_err(|_| Error::AuthenticationFailed {
                path: rel_path.to_string(),
            })?;
            sealed = false;
        }

        if sealed {
            return Ok(data);
        }
        if codec::is_padded(record.compressed, encrypted) {
            data = codec::unpad(&data)?;
        }
        if decompress && record.compressed {
            data = codec::decompress(&data, rel_path)?;
        }
        Ok(data)
    }

    fn crypter_for(&self, manifest: &VersionManifest, password: Option<&str>, decrypt: bool) -> Result<Option<Crypter>> {
        match manifest.salt() {
            Some(salt) if decrypt => {
                let password = password.ok_or(Error::PasswordRequired)?;
                Ok(Some(Crypter::new(password, Some(*salt))))
            }
            _ => Ok(None),
        }
    }

    /// Decodes every object of a version in memory and checks its hash.
    /// Nothing is written.
    pub async fn verify_version(&self, project: &str, version: &str, password: Option<&str>) -> Result<VerifySummary> {
        let manifest = self.load_manifest(project, version).await?;
        let crypter = self.crypter_for(&manifest, password, true)?;
        let total = manifest.files.len();

        let mut summary = VerifySummary {
            verified: 0,
            errors: 0,
            total_files: total,
            integrity_failures: Vec::new(),
            error_samples: Vec::new(),
        };

        for (index, (rel_path, record)) in manifest.files.iter().enumerate() {
            match self.decode_object(&manifest, rel_path, record, crypter.as_ref(), true).await {
                Ok(data) if hash_bytes(&data) == record.hash => summary.verified += 1,
                Ok(_) => {
                    error!("ALARM: {} does not match its recorded hash", rel_path);
                    summary.integrity_failures.push(rel_path.clone());
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Cannot verify {}: {}", rel_path, e);
                    summary.errors += 1;
                    if summary.error_samples.len() < ERROR_SAMPLE_LIMIT {
                        summary.error_samples.push(format!("{}: {}", rel_path, e));
                    }
                }
            }
            self.progress
                .on_progress(&ProgressEvent::new(index as u64 + 1, Some(total as u64), rel_path.as_str()));
        }

        Ok(summary)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `/`-joined path of `path` relative to `root`.
fn relative_key(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts = rel
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Joins a manifest path under `base`, refusing anything that could escape it.
fn output_path(base: &Path, rel_path: &str) -> Result<PathBuf> {
    let mut path = base.to_path_buf();
    for part in rel_path.split('/') {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(part),
            _ => return Err(Error::Other(format!("Unsafe path in manifest: {}", rel_path))),
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_key_uses_forward_slashes() {
        let root = Path::new("/src/project");
        assert_eq!(
            relative_key(Path::new("/src/project/a/b/c.txt"), root).as_deref(),
            Some("a/b/c.txt")
        );
        assert_eq!(relative_key(Path::new("/elsewhere/c.txt"), root), None);
        assert_eq!(relative_key(root, root), None);
    }

    #[test]
    fn test_output_path_rejects_escapes() {
        let base = Path::new("/restore/out");
        assert_eq!(output_path(base, "a/b.txt").unwrap(), base.join("a").join("b.txt"));
        assert!(output_path(base, "../etc/passwd").is_err());
        assert!(output_path(base, "a//b").is_err());
        assert!(output_path(base, "/abs").is_err());
        assert!(output_path(base, "./a").is_err());
    }

    #[test]
    fn test_restore_options_clean_mode() {
        let options = RestoreOptions::new("p", "v", "/tmp");
        assert!(options.is_clean());
        assert!(!options.clone().technical(false, true).is_clean());
        assert!(!options.technical(true, false).is_clean());
    }
}
