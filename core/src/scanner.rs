use crate::hasher::hash_file;
use crate::progress::{no_progress, ProgressEvent, SharedProgress};
use crate::{Error, Result, ScanManifest};
use std::path::Path;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Directory names that are never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".idea",
    "__pycache__",
    "node_modules",
    ".venv",
    "Cache",
    "Temp",
];

/// Temp, log and editor backup extensions.
pub const IGNORED_EXTENSIONS: &[&str] = &["tmp", "temp", "log", "bak", "swp", "swo"];

pub struct Scanner {
    progress: SharedProgress,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(no_progress())
    }
}

impl Scanner {
    pub fn new(progress: SharedProgress) -> Self {
        Self { progress }
    }

    /// Walks `root` and hashes every file that is not ignored.
    ///
    /// Files that cannot be read are left out of the manifest.
    pub async fn scan(&self, root: &Path) -> Result<ScanManifest> {
        if !root.is_dir() {
            return Err(Error::InvalidSource {
                path: root.display().to_string(),
            });
        }

        let root = std::path::absolute(root)?;
        info!("Scanning {}", root.display());

        let mut manifest = ScanManifest::default();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || is_ignored_file(entry.path()) {
                continue;
            }

            let Some(hash) = hash_file(entry.path()).await else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

            manifest.push(entry.path().to_path_buf(), hash, size);
            self.progress.on_progress(&ProgressEvent::new(
                manifest.total_files as u64,
                None,
                entry.file_name().to_string_lossy(),
            ));
        }

        info!(
            "Scan found {} files ({} bytes)",
            manifest.total_files, manifest.total_size
        );
        Ok(manifest)
    }
}

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

pub fn is_ignored_file(path: &Path) -> bool {
    let backup_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with('~'));

    backup_name
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| IGNORED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_bytes;
    use crate::progress::ProgressObserver;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_scan_skips_ignored_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("src/nested/data.txt"), b"data").unwrap();
        fs::write(root.join(".git/objects/blob"), b"git").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), b"js").unwrap();
        fs::write(root.join("run.LOG"), b"log").unwrap();
        fs::write(root.join("notes.txt~"), b"old").unwrap();

        let recorder = Arc::new(Recorder::default());
        let manifest = Scanner::new(recorder.clone()).scan(root).await.unwrap();

        assert_eq!(manifest.total_files, 2);
        assert_eq!(manifest.total_size, 16);
        let names: Vec<_> = manifest
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                std::path::PathBuf::from("src/main.rs"),
                std::path::PathBuf::from("src/nested/data.txt")
            ]
        );
        assert_eq!(manifest.hash_of(&manifest.files[1]), Some(&hash_bytes(b"data")));

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ProgressEvent::new(2, None, "data.txt"));
    }

    #[tokio::test]
    async fn test_scan_rejects_non_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        let scanner = Scanner::default();
        assert!(matches!(scanner.scan(&file).await, Err(Error::InvalidSource { .. })));
        assert!(matches!(
            scanner.scan(&dir.path().join("missing")).await,
            Err(Error::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_ignored_file_patterns() {
        assert!(is_ignored_file(Path::new("a/b.tmp")));
        assert!(is_ignored_file(Path::new("a/b.Bak")));
        assert!(is_ignored_file(Path::new("a/draft.md~")));
        assert!(!is_ignored_file(Path::new("a/b.txt")));
        assert!(!is_ignored_file(Path::new("a/Makefile")));
    }
}
