use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source is not a readable directory: {path}")]
    InvalidSource { path: String },

    /// Project names must be a single plain path component other than the store directory.
    #[error("Invalid project name: '{project}'")]
    InvalidProject { project: String },

    #[error("Project not found: {project}")]
    ProjectNotFound { project: String },

    #[error("Version not found: {project}/{version}")]
    VersionNotFound { project: String, version: String },

    #[error("Version is encrypted and no password was given")]
    PasswordRequired,

    /// The AEAD tag did not verify: wrong password, wrong salt or a tampered object.
    #[error("Authentication failed for {path}: wrong password or corrupted object")]
    AuthenticationFailed { path: String },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decompression failed for {path}: {reason}")]
    Decompression { path: String, reason: String },

    #[error("Invalid padding: {0}")]
    Padding(String),

    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Invalid salt: {0}")]
    InvalidSalt(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that make every following file fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::AuthenticationFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
