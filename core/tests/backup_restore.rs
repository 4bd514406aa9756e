use keepsafe_core::codec;
use keepsafe_core::{BackupOptions, Error, RestoreOptions, Scanner, VersionManager};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CONTENT: &[u8] = b"Secret data inside a file!";

struct Sandbox {
    _dir: TempDir,
    source: PathBuf,
    storage: PathBuf,
    restore: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        let storage = dir.path().join("storage");
        let restore = dir.path().join("restore");
        for p in [&source, &storage, &restore] {
            fs::create_dir_all(p).unwrap();
        }
        fs::write(source.join("secret.txt"), CONTENT).unwrap();
        Self {
            _dir: dir,
            source,
            storage,
            restore,
        }
    }

    fn write(&self, rel: &str, data: &[u8]) {
        let path = self.source.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    fn manager(&self) -> VersionManager {
        VersionManager::new(&self.storage)
    }

    async fn backup(&self, options: BackupOptions) -> keepsafe_core::BackupSummary {
        let scan = Scanner::default().scan(&self.source).await.unwrap();
        self.manager().create_backup(&scan, &options).await.unwrap()
    }

    fn options(&self) -> BackupOptions {
        BackupOptions::new(&self.source, "ProjectX")
    }

    fn object_files(&self) -> Vec<PathBuf> {
        let mut objects = Vec::new();
        for fanout in fs::read_dir(self.storage.join("objects")).unwrap() {
            for object in fs::read_dir(fanout.unwrap().path()).unwrap() {
                objects.push(object.unwrap().path());
            }
        }
        objects
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(files_under(&path));
            } else {
                files.push(path);
            }
        }
    }
    files
}

#[tokio::test]
async fn test_full_cycle_with_compression_and_password() {
    let sandbox = Sandbox::new();
    assert_eq!(CONTENT.len(), 26);

    let summary = sandbox
        .backup(sandbox.options().with_compression(true).with_password("123"))
        .await;
    assert_eq!((summary.copied, summary.skipped, summary.errors), (1, 0, 0));
    assert_eq!(sandbox.object_files().len(), 1);

    let manager = sandbox.manager();
    let version = manager.latest_version(Some("ProjectX"), None).await.unwrap().unwrap();
    assert_eq!(version.name, summary.version);

    let manifest = manager.load_manifest("ProjectX", &version.name).await.unwrap();
    assert_eq!(manifest.files.len(), 1);
    assert!(manifest.files["secret.txt"].compressed);
    assert!(manifest.info.salt.is_some());
    assert_eq!(manifest.info.encryption.as_deref(), Some("ChaCha20-Poly1305"));
    assert!(manifest.info.compression_enabled);

    let restored = manager
        .restore_version(&RestoreOptions::new("ProjectX", &version.name, &sandbox.restore).with_password("123"))
        .await
        .unwrap();
    assert!(restored.is_clean());
    assert_eq!(restored.restored, 1);

    let file = sandbox
        .restore
        .join(format!("ProjectX_{}", version.name))
        .join("secret.txt");
    assert_eq!(fs::read(file).unwrap(), CONTENT);
}

#[tokio::test]
async fn test_salt_change_isolation() {
    let sandbox = Sandbox::new();

    let first = sandbox.backup(sandbox.options().with_password("123")).await;
    let second = sandbox
        .backup(sandbox.options().with_password("123").with_salt(None))
        .await;

    assert_eq!(first.copied, 1);
    assert_eq!(second.copied, 1);
    assert_ne!(first.version, second.version);
    assert_eq!(sandbox.object_files().len(), 2);

    let versions = sandbox.manager().list_versions(Some("ProjectX"), None).await.unwrap();
    assert_eq!(versions.len(), 2);
}

#[tokio::test]
async fn test_identical_content_is_stored_once() {
    let sandbox = Sandbox::new();
    sandbox.write("copy/secret-again.txt", CONTENT);

    let first = sandbox.backup(sandbox.options().with_password("pw")).await;
    assert_eq!((first.copied, first.skipped), (1, 1));
    assert_eq!(sandbox.object_files().len(), 1);

    // Same password and salt on a later run: everything deduplicates.
    let salt = sandbox.manager().latest_salt("ProjectX").await.unwrap();
    assert!(salt.is_some());
    let second = sandbox
        .backup(sandbox.options().with_password("pw").with_salt(salt))
        .await;
    assert_eq!((second.copied, second.skipped), (0, 2));
    assert_eq!(sandbox.object_files().len(), 1);

    // Dedup also crosses projects.
    let scan = Scanner::default().scan(&sandbox.source).await.unwrap();
    let other = sandbox
        .manager()
        .create_backup(&scan, &BackupOptions::new(&sandbox.source, "Other").with_password("pw").with_salt(salt))
        .await
        .unwrap();
    assert_eq!(other.copied, 0);
}

#[tokio::test]
async fn test_plain_and_encrypted_copies_do_not_collide() {
    let sandbox = Sandbox::new();
    sandbox.backup(sandbox.options().with_compression(false)).await;
    sandbox.backup(sandbox.options().with_compression(true)).await;
    sandbox.backup(sandbox.options().with_password("pw")).await;
    assert_eq!(sandbox.object_files().len(), 3);

    let plain = sandbox
        .object_files()
        .into_iter()
        .find(|p| fs::read(p).unwrap() == CONTENT);
    assert!(plain.is_some(), "raw uncompressed objects are stored verbatim");
}

#[tokio::test]
async fn test_wrong_password_aborts_restore() {
    let sandbox = Sandbox::new();
    sandbox.write("a.txt", b"first file");
    sandbox.write("b.txt", b"second file");
    let summary = sandbox.backup(sandbox.options().with_password("right")).await;

    let err = sandbox
        .manager()
        .restore_version(&RestoreOptions::new("ProjectX", &summary.version, &sandbox.restore).with_password("wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AuthenticationFailed { .. }));
    assert!(files_under(&sandbox.restore).is_empty());
}

#[tokio::test]
async fn test_encrypted_restore_requires_password() {
    let sandbox = Sandbox::new();
    let summary = sandbox.backup(sandbox.options().with_password("pw")).await;

    let err = sandbox
        .manager()
        .restore_version(&RestoreOptions::new("ProjectX", &summary.version, &sandbox.restore))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PasswordRequired));
}

#[tokio::test]
async fn test_unknown_version_is_caller_error() {
    let sandbox = Sandbox::new();
    let err = sandbox
        .manager()
        .restore_version(&RestoreOptions::new("ProjectX", "1999-01-01_00-00-00", &sandbox.restore))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::VersionNotFound { .. }));
}

#[tokio::test]
async fn test_non_compressible_files_stay_uncompressed() {
    let sandbox = Sandbox::new();
    let jpeg = vec![0xffu8, 0xd8, 0xff, 0xe0, 1, 2, 3, 4];
    sandbox.write("photos/cat.JPG", &jpeg);

    let summary = sandbox
        .backup(sandbox.options().with_compression(true).with_password("pw"))
        .await;
    let manager = sandbox.manager();
    let manifest = manager.load_manifest("ProjectX", &summary.version).await.unwrap();

    assert!(!manifest.files["photos/cat.JPG"].compressed);
    assert!(manifest.files["secret.txt"].compressed);

    let restored = manager
        .restore_version(&RestoreOptions::new("ProjectX", &summary.version, &sandbox.restore).with_password("pw"))
        .await
        .unwrap();
    assert!(restored.is_clean());
    assert_eq!(fs::read(restored.output_dir.join("photos/cat.JPG")).unwrap(), jpeg);
}

#[tokio::test]
async fn test_technical_restore_keeps_stored_form() {
    let sandbox = Sandbox::new();
    let summary = sandbox
        .backup(sandbox.options().with_compression(true).with_password("pw"))
        .await;
    let manager = sandbox.manager();

    let sealed = manager
        .restore_version(
            &RestoreOptions::new("ProjectX", &summary.version, sandbox.restore.join("sealed"))
                .technical(false, false),
        )
        .await
        .unwrap();
    let blob = fs::read(sealed.output_dir.join("secret.txt.raw")).unwrap();
    // nonce + one padded block + tag
    assert_eq!(blob.len(), 12 + 256 + 16);
    assert!(!sealed.output_dir.join("secret.txt").exists());

    let zipped = manager
        .restore_version(
            &RestoreOptions::new("ProjectX", &summary.version, sandbox.restore.join("zipped"))
                .with_password("pw")
                .technical(true, false),
        )
        .await
        .unwrap();
    let stream = fs::read(zipped.output_dir.join("secret.txt.raw")).unwrap();
    assert_eq!(codec::decompress(&stream, "secret.txt").unwrap(), CONTENT);
}

#[tokio::test]
async fn test_corrupted_object_is_a_soft_failure() {
    let sandbox = Sandbox::new();
    sandbox.write("other.txt", b"another file that stays intact");
    let summary = sandbox
        .backup(sandbox.options().with_compression(true))
        .await;
    let manager = sandbox.manager();

    // Break the object holding secret.txt: valid padding, garbage zlib stream.
    let target = sandbox
        .object_files()
        .into_iter()
        .find(|p| codec::decompress(&codec::unpad(&fs::read(p).unwrap()).unwrap(), "x").unwrap() == CONTENT)
        .unwrap();
    fs::write(&target, codec::pad(b"not a zlib stream").unwrap()).unwrap();

    let restored = manager
        .restore_version(&RestoreOptions::new("ProjectX", &summary.version, &sandbox.restore))
        .await
        .unwrap();
    assert_eq!(restored.restored, 1);
    assert_eq!(restored.errors, 1);
    assert_eq!(restored.error_samples.len(), 1);
    assert!(restored.error_samples[0].starts_with("secret.txt"));
    assert_eq!(fs::read(restored.output_dir.join("other.txt")).unwrap(), b"another file that stays intact");
}

#[tokio::test]
async fn test_hash_mismatch_raises_integrity_alarm() {
    let sandbox = Sandbox::new();
    let summary = sandbox
        .backup(sandbox.options().with_compression(false))
        .await;

    let objects = sandbox.object_files();
    assert_eq!(objects.len(), 1);
    fs::write(&objects[0], b"tampered bytes").unwrap();

    let manager = sandbox.manager();
    let restored = manager
        .restore_version(&RestoreOptions::new("ProjectX", &summary.version, &sandbox.restore))
        .await
        .unwrap();
    assert_eq!(restored.restored, 1);
    assert_eq!(restored.integrity_failures, vec!["secret.txt".to_string()]);

    let verified = manager.verify_version("ProjectX", &summary.version, None).await.unwrap();
    assert_eq!(verified.verified, 0);
    assert_eq!(verified.integrity_failures.len(), 1);
}

#[tokio::test]
async fn test_verify_clean_version() {
    let sandbox = Sandbox::new();
    sandbox.write("nested/deep/file.md", b"# title\n");
    let summary = sandbox
        .backup(sandbox.options().with_password("pw"))
        .await;

    let manager = sandbox.manager();
    let verified = manager
        .verify_version("ProjectX", &summary.version, Some("pw"))
        .await
        .unwrap();
    assert!(verified.is_clean());
    assert_eq!(verified.verified, 2);

    assert!(matches!(
        manager.verify_version("ProjectX", &summary.version, Some("nope")).await,
        Err(Error::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
async fn test_unreadable_file_is_counted_and_left_out() {
    let sandbox = Sandbox::new();
    sandbox.write("a.txt", b"first");
    sandbox.write("b.txt", b"second");

    let scan = Scanner::default().scan(&sandbox.source).await.unwrap();
    assert_eq!(scan.total_files, 3);
    fs::remove_file(sandbox.source.join("b.txt")).unwrap();

    let manager = sandbox.manager();
    let summary = manager.create_backup(&scan, &sandbox.options()).await.unwrap();
    assert_eq!((summary.copied, summary.skipped, summary.errors), (2, 0, 1));
    assert_eq!(summary.total_files, 3);

    let manifest = manager.load_manifest("ProjectX", &summary.version).await.unwrap();
    let paths: Vec<_> = manifest.files.keys().cloned().collect();
    assert_eq!(paths, vec!["a.txt".to_string(), "secret.txt".to_string()]);
    assert_eq!(manifest.info.total_files, 3);
    assert_eq!(sandbox.object_files().len(), 2);
}

#[tokio::test]
async fn test_bad_project_names_are_rejected_before_writing() {
    let sandbox = Sandbox::new();
    let scan = Scanner::default().scan(&sandbox.source).await.unwrap();
    let manager = sandbox.manager();

    for project in ["objects", "../escaped", "", "a/b"] {
        let err = manager
            .create_backup(&scan, &BackupOptions::new(&sandbox.source, project))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProject { .. }), "{project}: {err}");
    }

    assert!(!sandbox.storage.join("objects").exists());
    assert!(!sandbox.storage.join("../escaped").exists());
    assert!(files_under(&sandbox.storage).is_empty());
    assert!(matches!(
        manager.load_manifest("../escaped", "v1").await,
        Err(Error::InvalidProject { .. })
    ));
}
