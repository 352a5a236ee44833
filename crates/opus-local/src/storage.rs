//! Download a URL into S3-compatible object storage (MinIO, AWS, R2, ...).
//!
//! Env:
//! - `OPUS_MCP_S3_ENDPOINT` (e.g. `localhost:9000` or `https://s3.example.com`)
//! - `OPUS_MCP_S3_ACCESS_KEY`, `OPUS_MCP_S3_SECRET_KEY`
//! - `OPUS_MCP_S3_REGION` (default `us-east-1`)
//! - `OPUS_MCP_S3_USE_SSL` (default true; only used when the endpoint has no scheme)

use crate::{flag_is_set, non_empty, Error, Result};
use opus_core::{validate_http_url, ObjectStore, PutObjectRequest, StoredObject};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const DEFAULT_BUCKET: &str = "opus-mcp-articles";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 100 * 1024 * 1024;
/// Hard ceiling on `DownloadRequest::max_bytes`; larger requests are clamped.
pub const MAX_DOWNLOAD_BYTES: u64 = 1024 * 1024 * 1024;
/// `Content-Length` is untrusted, so the body buffer never reserves more than this up front.
const PREALLOC_LIMIT: u64 = 8 << 20;

#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub use_ssl: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"***")
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

impl StorageConfig {
    /// `None` when the endpoint or either key is unset.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let endpoint = non_empty(get("OPUS_MCP_S3_ENDPOINT"))?;
        let access_key = non_empty(get("OPUS_MCP_S3_ACCESS_KEY"))?;
        let secret_key = non_empty(get("OPUS_MCP_S3_SECRET_KEY"))?;
        let region = non_empty(get("OPUS_MCP_S3_REGION")).unwrap_or_else(|| "us-east-1".to_string());
        let use_ssl = match get("OPUS_MCP_S3_USE_SSL") {
            Some(v) if !v.trim().is_empty() => flag_is_set(Some(&v)),
            _ => true,
        };
        Some(Self {
            endpoint,
            access_key,
            secret_key,
            region,
            use_ssl,
        })
    }

    /// Endpoint as a URL, adding the scheme implied by `use_ssl` when missing.
    pub fn endpoint_url(&self) -> String {
        let ep = self.endpoint.trim().trim_end_matches('/');
        if ep.contains("://") {
            ep.to_string()
        } else if self.use_ssl {
            format!("https://{ep}")
        } else {
            format!("http://{ep}")
        }
    }
}

/// [`ObjectStore`] over the `rust-s3` client, path-style addressing.
#[derive(Debug, Clone)]
pub struct S3Store {
    cfg: StorageConfig,
}

impl S3Store {
    pub fn new(cfg: StorageConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.cfg
    }

    fn bucket(&self, name: &str) -> Result<Box<s3::Bucket>> {
        let region = s3::Region::Custom {
            region: self.cfg.region.clone(),
            endpoint: self.cfg.endpoint_url(),
        };
        let creds = s3::creds::Credentials::new(
            Some(&self.cfg.access_key),
            Some(&self.cfg.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Storage(format!("invalid credentials: {e}")))?;
        let bucket = s3::Bucket::new(name, region, creds)
            .map_err(|e| Error::Storage(format!("failed to create S3 client: {e}")))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.bucket(bucket)?
            .exists()
            .await
            .map_err(|e| Error::Storage(format!("failed to check if bucket exists: {e}")))
    }

    async fn put_object(&self, req: PutObjectRequest) -> Result<StoredObject> {
        let mut bucket = self.bucket(&req.bucket)?;
        for (k, v) in &req.metadata {
            bucket.add_header(&format!("x-amz-meta-{k}"), v);
        }
        let resp = bucket
            .put_object_with_content_type(&req.key, &req.bytes, &req.content_type)
            .await
            .map_err(|e| Error::Storage(format!("failed to upload file to S3: {e}")))?;
        if !(200..300).contains(&resp.status_code()) {
            return Err(Error::Storage(format!(
                "failed to upload file to S3: HTTP {}",
                resp.status_code()
            )));
        }
        let etag = resp
            .headers()
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("etag"))
            .map(|(_, v)| v.trim_matches('"').to_string());
        Ok(StoredObject {
            bucket: req.bucket,
            key: req.key,
            size: req.bytes.len() as u64,
            etag,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub source_url: String,
    pub bucket: String,
    pub object_name: String,
    pub timeout: Duration,
    pub max_bytes: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DownloadReport {
    pub source_url: String,
    pub bucket: String,
    pub object: String,
    pub size: u64,
    pub etag: Option<String>,
    pub sha256: String,
    pub content_type: String,
    pub elapsed_ms: u128,
}

/// Last path segment of the source URL, used as the `original-name` metadata.
fn original_name(u: &url::Url) -> String {
    u.path_segments()
        .and_then(|mut s| s.rfind(|seg| !seg.is_empty()))
        .unwrap_or("/")
        .to_string()
}

/// Fetch `req.source_url` and store it as `req.bucket/req.object_name`.
///
/// `progress(bytes_so_far, content_length)` is called after every received chunk.
/// Downloads larger than `req.max_bytes` (itself capped at [`MAX_DOWNLOAD_BYTES`]) fail
/// instead of being stored truncated.
pub async fn download_url_to_store(
    http: &reqwest::Client,
    store: &dyn ObjectStore,
    req: &DownloadRequest,
    mut progress: impl FnMut(u64, Option<u64>),
) -> Result<DownloadReport> {
    use futures_util::StreamExt;

    let source = validate_http_url(&req.source_url)?;
    let bucket = req.bucket.trim();
    if bucket.is_empty() {
        return Err(Error::InvalidInput("bucket name cannot be empty".to_string()));
    }
    let object = req.object_name.trim();
    if object.is_empty() {
        return Err(Error::InvalidInput("object name cannot be empty".to_string()));
    }

    if !store.bucket_exists(bucket).await? {
        return Err(Error::Storage(format!("bucket '{bucket}' does not exist")));
    }

    tracing::info!(source_url = %source, bucket, object, store = store.name(), "starting download to object storage");
    let t0 = Instant::now();
    let resp = http
        .get(source.clone())
        .timeout(req.timeout)
        .send()
        .await
        .map_err(|e| Error::Fetch(format!("failed to download file from URL: {e}")))?;
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        return Err(Error::Fetch(format!(
            "HTTP request failed with status {}",
            status.as_u16()
        )));
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let max_bytes = req.max_bytes.min(MAX_DOWNLOAD_BYTES);
    let total = resp.content_length();
    if let Some(n) = total.filter(|n| *n > max_bytes) {
        return Err(Error::Fetch(format!(
            "download is {n} bytes, over the {max_bytes} byte limit"
        )));
    }
    tracing::info!(content_type = %content_type, content_length = ?total, "download started");

    let mut hasher = Sha256::new();
    let mut bytes = Vec::with_capacity(total.unwrap_or(0).min(PREALLOC_LIMIT) as usize);
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::Fetch(format!("download interrupted: {e}")))?;
        if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(Error::Fetch(format!(
                "download exceeded the {max_bytes} byte limit"
            )));
        }
        hasher.update(&chunk);
        bytes.extend_from_slice(&chunk);
        progress(bytes.len() as u64, total);
    }
    let sha256 = hex::encode(hasher.finalize());

    let metadata = BTreeMap::from([
        ("source-url".to_string(), source.to_string()),
        (
            "download-date".to_string(),
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ),
        ("original-name".to_string(), original_name(&source)),
        ("sha256".to_string(), sha256.clone()),
    ]);
    let stored = store
        .put_object(PutObjectRequest {
            bucket: bucket.to_string(),
            key: object.to_string(),
            content_type: content_type.clone(),
            metadata,
            bytes,
        })
        .await?;

    let elapsed_ms = t0.elapsed().as_millis();
    tracing::info!(
        bucket = %stored.bucket,
        object = %stored.key,
        size = stored.size,
        etag = ?stored.etag,
        elapsed_ms = elapsed_ms as u64,
        "uploaded file to object storage"
    );

    Ok(DownloadReport {
        source_url: source.to_string(),
        bucket: stored.bucket,
        object: stored.key,
        size: stored.size,
        etag: stored.etag,
        sha256,
        content_type,
        elapsed_ms,
    })
}
