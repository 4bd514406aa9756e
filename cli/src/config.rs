use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use keepsafe_backends::{Backend, BackendFetcher, LocalBackend, S3Backend, S3Config};
use keepsafe_core::RemoteFetcher;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Optional `config.toml`. Command-line flags take precedence.
///
/// ```toml
/// backup_root = "/mnt/backups"
/// compress = true
///
/// [remote]
/// kind = "s3"
/// bucket = "my-backups"
/// endpoint = "https://s3.example.com"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub backup_root: Option<PathBuf>,
    pub compress: Option<bool>,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RemoteConfig {
    Local {
        path: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: String,
        endpoint: Option<String>,
        region: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    },
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "keepsafe", "keepsafe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads `explicit` (which must exist) or the default file if present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn backup_root(&self, flag: Option<&Path>) -> Result<PathBuf> {
        flag.map(Path::to_path_buf)
            .or_else(|| self.backup_root.clone())
            .ok_or_else(|| anyhow!("Backup root required (--root, KEEPSAFE_ROOT or backup_root in config)"))
    }

    pub async fn remote_fetcher(&self) -> Result<Option<Arc<dyn RemoteFetcher>>> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };

        let backend: Arc<dyn Backend> = match remote.clone() {
            RemoteConfig::Local { path } => Arc::new(LocalBackend::new(path)),
            RemoteConfig::S3 {
                bucket,
                prefix,
                endpoint,
                region,
                access_key,
                secret_key,
            } => Arc::new(
                S3Backend::new(S3Config {
                    bucket,
                    prefix,
                    endpoint,
                    region,
                    access_key,
                    secret_key,
                })
                .await?,
            ),
        };

        let fetcher: Arc<dyn RemoteFetcher> = Arc::new(BackendFetcher::new(backend));
        Ok(Some(fetcher))
    }
}
