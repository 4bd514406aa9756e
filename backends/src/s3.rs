use crate::backend::Backend;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use bytes::Bytes;
use keepsafe_core::{Error, Result};
use tracing::debug;

/// Connection settings for an S3-compatible bucket holding a backup root.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: String,
    /// Custom endpoint for S3-compatible services; enables path-style URLs.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Backend {
    pub async fn new(config: S3Config) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "keepsafe-config",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(Error::Backend(
                    "Both access_key and secret_key are required for static credentials".to_string(),
                ))
            }
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.endpoint.is_some())
            .build();

        debug!("S3 backend for bucket {} (prefix '{}')", config.bucket, config.prefix);
        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    fn full_key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

#[async_trait]
impl Backend for S3Backend {
    async fn exists(&self, path: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(path))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(Error::Backend(format!("Failed to check {}: {}", path, service)))
                }
            }
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(path))
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    Error::ObjectNotFound { key: path.to_string() }
                } else {
                    Error::Backend(format!("Failed to read {}: {}", path, service))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Backend(format!("Failed to read body of {}: {}", path, e)))?;

        Ok(data.into_bytes())
    }
}
