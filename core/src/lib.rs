pub mod catalog;
pub mod codec;
pub mod crypto;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod progress;
pub mod repository;
pub mod scanner;
pub mod store;
pub mod types;

pub use catalog::{DirectoryCatalog, VersionCatalog, VersionRef};
pub use crypto::Crypter;
pub use error::{Error, Result};
pub use manifest::VersionManifest;
pub use progress::{NoProgress, ProgressEvent, ProgressObserver};
pub use repository::{BackupOptions, RestoreOptions, VersionManager};
pub use scanner::Scanner;
pub use store::{ObjectStore, RemoteFetcher};
pub use types::*;
