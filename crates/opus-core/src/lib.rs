use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod expr;

pub use expr::{
    parse_category_expression, parse_general_expression, EmptyPolicy, ExpressionParser,
    ParseError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("failed to parse category expression: {0}")]
    Expression(#[from] ParseError),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("parse failed: {0}")]
    Parse(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Accept only absolute `http`/`https` URLs.
pub fn validate_http_url(raw: &str) -> Result<url::Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidUrl("source URL cannot be empty".to_string()));
    }
    let u = url::Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
    match u.scheme() {
        "http" | "https" => Ok(u),
        other => Err(Error::InvalidUrl(format!(
            "unsupported URL scheme: {other} (only http and https are supported)"
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    /// User metadata (stored as `x-amz-meta-*`).
    pub metadata: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
}

/// S3-compatible object storage, reduced to what the download tool needs.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
    async fn put_object(&self, req: PutObjectRequest) -> Result<StoredObject>;
}
