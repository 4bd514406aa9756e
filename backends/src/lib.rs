pub mod backend;
pub mod fetcher;
pub mod local;
pub mod retry;
pub mod s3;

pub use backend::Backend;
pub use fetcher::BackendFetcher;
pub use local::LocalBackend;
pub use retry::{retry_with_backoff, RetryConfig, Retryable};
pub use s3::{S3Backend, S3Config};
