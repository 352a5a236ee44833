//! MCP tool surface.
//!
//! Every tool returns a JSON envelope (`schema_version`, `kind`, `ok`, `elapsed_ms`,
//! `request`, and `error` on failure) as structured content plus a text copy. Tool
//! failures are `ok=false` payloads; protocol errors are reserved for server faults.

use crate::config::ServerConfig;
use opus_core::ObjectStore;
use opus_local::arxiv::{resolve_pdf_source, ArxivClient, CategoryFeedRequest};
use opus_local::ratelimit::RateLimiter;
use opus_local::storage::{
    download_url_to_store, DownloadRequest, S3Store, DEFAULT_BUCKET, DEFAULT_MAX_DOWNLOAD_BYTES,
    MAX_DOWNLOAD_BYTES,
};
use opus_local::taxonomy::fetch_taxonomy;
use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod envelope;
#[cfg(feature = "http")]
pub(crate) mod http;

use envelope::*;

const SCHEMA_VERSION: u64 = 1;

const DEFAULT_FETCH_SIZE: usize = 10;
const MAX_FETCH_SIZE: usize = 200;
const DEFAULT_FEED_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_DOWNLOAD_TIMEOUT_MS: u64 = 120_000;
/// Bounds parser recursion as well as URL length.
const MAX_EXPRESSION_CHARS: usize = 1024;

pub(crate) const TOOL_NAMES: [&str; 4] = [
    "arxiv_category_fetch_latest",
    "arxiv_category_taxonomy",
    "arxiv_download_pdf",
    "opus_meta",
];

fn tool_result(payload: serde_json::Value) -> CallToolResult {
    // Structured content for machine consumers, text copy for clients that only read content[0].
    let mut r = CallToolResult::structured(payload.clone());
    r.content = vec![Content::text(payload.to_string())];
    r
}

fn failure(
    request: serde_json::Value,
    code: ErrorCode,
    message: impl ToString,
    hint: &str,
) -> serde_json::Value {
    serde_json::json!({
        "ok": false,
        "error": error_obj(code, message, hint),
        "request": request,
    })
}

fn default_hint(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::InvalidParams => "Check the arguments against the tool schema.",
        ErrorCode::NotConfigured => "Set OPUS_MCP_S3_ENDPOINT, OPUS_MCP_S3_ACCESS_KEY and OPUS_MCP_S3_SECRET_KEY in the server environment, then restart it.",
        ErrorCode::FetchFailed => "The upstream request failed. Retry later; arXiv allows one API request every 3 seconds.",
        ErrorCode::ParseFailed => "The upstream response could not be parsed. Retry later.",
        ErrorCode::StorageFailed => "Check that the bucket exists and the credentials can write to it.",
        ErrorCode::UnexpectedError => "Unexpected server error; see the server logs.",
    }
}

const EXPRESSION_HINT: &str = "Join category codes with AND/OR/NOT (or + | -) and group with parentheses, e.g. \"cs.AI or (cs.LG not cs.CV)\". Juxtaposed codes are ANDed.";

fn error_payload(request: serde_json::Value, e: &opus_core::Error) -> serde_json::Value {
    let code = ErrorCode::for_error(e);
    let hint = match e {
        opus_core::Error::Expression(_) => EXPRESSION_HINT,
        _ => default_hint(code),
    };
    failure(request, code, e, hint)
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
struct CategoryFetchArgs {
    /// Boolean category expression, e.g. "cs.AI", "cs.AI or cs.LG", "(cs.AI | cs.LG) - cs.CV".
    /// See https://arxiv.org/category_taxonomy for codes.
    #[serde(default)]
    category: Option<String>,
    /// Offset into the result list (default: 0).
    #[serde(default, alias = "startIndex")]
    start_index: Option<usize>,
    /// Number of papers to return (default: 10; max: 200).
    #[serde(default, alias = "fetchSize")]
    fetch_size: Option<usize>,
    /// Request timeout (ms) (default: 20_000).
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
struct TaxonomyArgs {
    /// Only return this group (e.g. "cs", "physics", "q-bio").
    #[serde(default)]
    group: Option<String>,
    /// Request timeout (ms) (default: 20_000).
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
struct DownloadPdfArgs {
    /// arXiv id ("2401.01234", "cs/9901001v1") or an arXiv abs/pdf URL.
    #[serde(default)]
    id_or_url: Option<String>,
    /// Target bucket (default: "opus-mcp-articles"). Must already exist.
    #[serde(default)]
    bucket: Option<String>,
    /// Object name (default: "<id>.pdf", with "/" replaced by "_").
    #[serde(default)]
    object_name: Option<String>,
    /// Download timeout (ms) (default: 120_000).
    #[serde(default)]
    timeout_ms: Option<u64>,
    /// Maximum PDF size in bytes (default: 100 MiB; max: 1 GiB).
    #[serde(default)]
    max_bytes: Option<u64>,
}

#[derive(Clone)]
pub(crate) struct OpusMcp {
    tool_router: RmcpToolRouter<Self>,
    cfg: Arc<ServerConfig>,
    http: reqwest::Client,
    arxiv: ArxivClient,
    store: Option<Arc<dyn ObjectStore>>,
    started: Instant,
}

#[tool_router]
impl OpusMcp {
    pub(crate) fn new(cfg: ServerConfig) -> Result<Self, McpError> {
        let http = cfg
            .http
            .build_client()
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let store = cfg.storage.clone().map(|s| {
            tracing::info!(endpoint = %s.endpoint_url(), region = %s.region, "object storage configured");
            Arc::new(S3Store::new(s)) as Arc<dyn ObjectStore>
        });
        if store.is_none() {
            tracing::info!("object storage not configured; arxiv_download_pdf is disabled");
        }
        Ok(Self::with_parts(cfg, http, store))
    }

    pub(crate) fn with_parts(
        cfg: ServerConfig,
        http: reqwest::Client,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let arxiv = ArxivClient::new(
            http.clone(),
            cfg.arxiv_endpoint.clone(),
            Arc::new(RateLimiter::new(cfg.arxiv_min_interval)),
        );
        Self {
            tool_router: Self::tool_router(),
            cfg: Arc::new(cfg),
            http,
            arxiv,
            store,
            started: Instant::now(),
        }
    }

    pub(crate) fn started(&self) -> Instant {
        self.started
    }

    #[tool(
        description = "Latest arXiv submissions (newest first) for a category expression such as \"cs.AI or (cs.LG not cs.CV)\""
    )]
    async fn arxiv_category_fetch_latest(
        &self,
        params: Parameters<Option<CategoryFetchArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "arxiv_category_fetch_latest";
        let args = params.0.unwrap_or_default();
        let t0 = Instant::now();

        let category = args.category.unwrap_or_default();
        let start = args.start_index.unwrap_or(0);
        let fetch_size = args
            .fetch_size
            .unwrap_or(DEFAULT_FETCH_SIZE)
            .clamp(1, MAX_FETCH_SIZE);
        let timeout_ms = args.timeout_ms.unwrap_or(DEFAULT_FEED_TIMEOUT_MS);
        let request = serde_json::json!({
            "category": category,
            "start_index": start,
            "fetch_size": fetch_size,
            "timeout_ms": timeout_ms,
        });

        let mut payload = if category.chars().count() > MAX_EXPRESSION_CHARS {
            failure(
                request,
                ErrorCode::InvalidParams,
                format!("category expression is longer than {MAX_EXPRESSION_CHARS} characters"),
                EXPRESSION_HINT,
            )
        } else {
            let req = CategoryFeedRequest {
                category: category.clone(),
                start,
                max_results: fetch_size,
                timeout: Duration::from_millis(timeout_ms),
            };
            match self.arxiv.fetch_latest_by_category(&req).await {
                Ok(resp) => serde_json::json!({
                    "ok": resp.ok,
                    "search_query": resp.search_query,
                    "start": resp.start,
                    "max_results": resp.max_results,
                    "total_results": resp.total_results,
                    "papers": resp.papers,
                    "warnings": resp.warnings,
                    "warning_hints": warning_hints_from(&resp.warnings),
                    "rate_limit_wait_ms": resp.rate_limit_wait_ms,
                    "request": request,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, category = %category, "category fetch failed");
                    error_payload(request, &e)
                }
            }
        };
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }

    #[tool(description = "arXiv category taxonomy: groups and categories with names and descriptions")]
    async fn arxiv_category_taxonomy(
        &self,
        params: Parameters<Option<TaxonomyArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "arxiv_category_taxonomy";
        let args = params.0.unwrap_or_default();
        let t0 = Instant::now();

        let group = args
            .group
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        let timeout_ms = args.timeout_ms.unwrap_or(DEFAULT_FEED_TIMEOUT_MS);
        let request = serde_json::json!({ "group": group, "timeout_ms": timeout_ms });

        let fetched = fetch_taxonomy(
            &self.http,
            &self.cfg.taxonomy_url,
            Duration::from_millis(timeout_ms),
        )
        .await
        .and_then(|tax| match group.as_deref() {
            Some(g) => tax.filter_group(g),
            None => Ok(tax),
        });
        let mut payload = match fetched {
            // An empty page is an upstream problem, not a client one.
            Err(opus_core::Error::Parse(m)) => failure(
                request,
                ErrorCode::FetchFailed,
                m,
                default_hint(ErrorCode::FetchFailed),
            ),
            Err(e) => error_payload(request, &e),
            Ok(tax) => serde_json::json!({
                "ok": true,
                "group_count": tax.groups.len(),
                "category_count": tax.categories.len(),
                "groups": tax.groups,
                "categories": tax.categories,
                "request": request,
            }),
        };
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }

    #[tool(
        description = "Download an arXiv PDF into S3-compatible storage (bucket must exist; requires OPUS_MCP_S3_* env)"
    )]
    async fn arxiv_download_pdf(
        &self,
        params: Parameters<Option<DownloadPdfArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let kind = "arxiv_download_pdf";
        let args = params.0.unwrap_or_default();
        let t0 = Instant::now();

        let id_or_url = args.id_or_url.unwrap_or_default();
        let bucket = args
            .bucket
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let timeout_ms = args.timeout_ms.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_MS);
        let max_bytes = args
            .max_bytes
            .unwrap_or(DEFAULT_MAX_DOWNLOAD_BYTES)
            .clamp(1, MAX_DOWNLOAD_BYTES);
        let mut request = serde_json::json!({
            "id_or_url": id_or_url,
            "bucket": bucket,
            "object_name": args.object_name,
            "timeout_ms": timeout_ms,
            "max_bytes": max_bytes,
        });

        let Some((arxiv_id, source_url)) = resolve_pdf_source(&id_or_url) else {
            let mut payload = failure(
                request,
                ErrorCode::InvalidParams,
                "id_or_url must be an arXiv id or an arXiv abs/pdf URL",
                "Pass e.g. \"2401.01234\" or \"https://arxiv.org/abs/2401.01234\".",
            );
            add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
            return Ok(tool_result(payload));
        };
        let object_name = args
            .object_name
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| format!("{}.pdf", arxiv_id.replace('/', "_")));
        request["object_name"] = serde_json::json!(object_name);

        let Some(store) = self.store.clone() else {
            let mut payload = failure(
                request,
                ErrorCode::NotConfigured,
                "object storage is not configured",
                default_hint(ErrorCode::NotConfigured),
            );
            add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
            return Ok(tool_result(payload));
        };

        let mut warnings: Vec<&'static str> = Vec::new();
        if self.cfg.http.insecure_skip_verify && self.cfg.storage.is_some() {
            warnings.push("storage_insecure_tls_unsupported");
        }

        let req = DownloadRequest {
            source_url: source_url.clone(),
            bucket,
            object_name,
            timeout: Duration::from_millis(timeout_ms),
            max_bytes,
        };
        let mut logged_mib = 0u64;
        let progress = |n: u64, total: Option<u64>| {
            let mib = n >> 20;
            if mib > logged_mib {
                logged_mib = mib;
                tracing::debug!(bytes = n, total = ?total, "download progress");
            }
        };
        let mut payload = match download_url_to_store(&self.http, store.as_ref(), &req, progress).await
        {
            Ok(report) => serde_json::json!({
                "ok": true,
                "arxiv_id": arxiv_id,
                "source_url": report.source_url,
                "bucket": report.bucket,
                "object": report.object,
                "size": report.size,
                "etag": report.etag,
                "sha256": report.sha256,
                "content_type": report.content_type,
                "transfer_ms": report.elapsed_ms,
                "warnings": warnings,
                "warning_hints": warning_hints_from(&warnings),
                "request": request,
            }),
            Err(e) => {
                tracing::warn!(error = %e, source_url = %source_url, "pdf download failed");
                error_payload(request, &e)
            }
        };
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }

    #[tool(description = "Report opus-mcp configuration and version (no secrets)")]
    async fn opus_meta(&self) -> Result<CallToolResult, McpError> {
        let t0 = Instant::now();
        let http = &self.cfg.http;
        let mut payload = serde_json::json!({
            "ok": true,
            "name": "opus-mcp",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_s": self.started.elapsed().as_secs(),
            "configured": {
                "storage": self.store.is_some(),
                "custom_ca": !http.ca_bundles.is_empty(),
                "insecure_skip_verify": http.insecure_skip_verify,
                "proxy": !http.proxies.is_empty(),
            },
            "endpoints": {
                "arxiv": self.arxiv.endpoint().as_str(),
                "taxonomy": self.cfg.taxonomy_url.as_str(),
                "storage": self.cfg.storage.as_ref().map(|s| s.endpoint_url()),
            },
            "proxies": http.proxies.iter().map(|(k, u)| serde_json::json!({"kind": k, "url": u})).collect::<Vec<_>>(),
            "arxiv_min_interval_ms": self.arxiv.limiter().min_interval().as_millis(),
            "defaults": {
                "bucket": DEFAULT_BUCKET,
                "fetch_size": DEFAULT_FETCH_SIZE,
                "max_fetch_size": MAX_FETCH_SIZE,
                "max_download_bytes": DEFAULT_MAX_DOWNLOAD_BYTES,
                "hard_max_download_bytes": MAX_DOWNLOAD_BYTES,
                "max_expression_chars": MAX_EXPRESSION_CHARS,
            },
            "tools": TOOL_NAMES,
        });
        add_envelope_fields(&mut payload, "opus_meta", t0.elapsed().as_millis());
        Ok(tool_result(payload))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for OpusMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "arXiv category feeds (boolean category expressions), taxonomy lookup, and PDF archiving to S3. Outputs are schema-versioned JSON."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub(crate) async fn serve_stdio(cfg: ServerConfig) -> Result<(), McpError> {
    let svc = OpusMcp::new(cfg)?;
    tracing::info!("serving MCP on stdio");
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    // Keep the stdio server alive until the client closes.
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::RawQuery, routing::get, Router};
    use opus_core::{PutObjectRequest, StoredObject};
    use std::net::SocketAddr;
    use std::sync::Mutex;

    fn p<T>(v: T) -> Parameters<Option<T>> {
        Parameters(Some(v))
    }

    fn payload(r: &CallToolResult) -> serde_json::Value {
        r.structured_content
            .clone()
            .expect("tool results carry structured content")
    }

    const FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
  <opensearch:totalResults>1</opensearch:totalResults>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <published>2024-01-01T00:00:00Z</published>
    <title>A Paper</title>
    <summary>Abstract.</summary>
    <author><name>A. Author</name></author>
    <category term="cs.AI" />
  </entry>
</feed>"#;

    const TAXONOMY: &str = r#"<div id="category_taxonomy_list">
  <h2 class="accordion-head">Computer Science</h2>
  <div class="accordion-body">
    <div class="columns divided"><div class="column"><h4>cs.AI <span>(Artificial Intelligence)</span></h4></div><div class="column"><p>AI.</p></div></div>
  </div>
  <h2 class="accordion-head">Statistics</h2>
  <div class="accordion-body">
    <div class="columns divided"><div class="column"><h4>stat.ML <span>(Machine Learning)</span></h4></div><div class="column"><p>ML.</p></div></div>
  </div>
</div>"#;

    const PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

    struct Fixture {
        addr: SocketAddr,
        queries: Arc<Mutex<Vec<String>>>,
    }

    async fn fixture() -> Fixture {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let q2 = queries.clone();
        let app = Router::new()
            .route(
                "/api/query",
                get(move |RawQuery(q): RawQuery| {
                    let queries = q2.clone();
                    async move {
                        queries.lock().unwrap().push(q.unwrap_or_default());
                        FEED
                    }
                }),
            )
            .route(
                "/broken/api/query",
                get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route("/category_taxonomy", get(|| async { axum::response::Html(TAXONOMY) }))
            .route(
                "/pdf/2401.00001v1.pdf",
                get(|| async { ([(axum::http::header::CONTENT_TYPE, "application/pdf")], PDF) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Fixture { addr, queries }
    }

    fn config_for(addr: SocketAddr, arxiv_path: &str) -> ServerConfig {
        let arxiv = format!("http://{addr}{arxiv_path}");
        let taxonomy = format!("http://{addr}/category_taxonomy");
        ServerConfig::from_lookup(move |k: &str| match k {
            "OPUS_MCP_ARXIV_ENDPOINT" => Some(arxiv.clone()),
            "OPUS_MCP_TAXONOMY_URL" => Some(taxonomy.clone()),
            "OPUS_MCP_ARXIV_MIN_INTERVAL_MS" => Some("1".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[derive(Default)]
    struct MemStore {
        buckets: Vec<&'static str>,
        puts: Mutex<Vec<PutObjectRequest>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for MemStore {
        fn name(&self) -> &'static str {
            "memory"
        }
        async fn bucket_exists(&self, bucket: &str) -> opus_core::Result<bool> {
            Ok(self.buckets.iter().any(|b| *b == bucket))
        }
        async fn put_object(&self, req: PutObjectRequest) -> opus_core::Result<StoredObject> {
            let out = StoredObject {
                bucket: req.bucket.clone(),
                key: req.key.clone(),
                size: req.bytes.len() as u64,
                etag: None,
            };
            self.puts.lock().unwrap().push(req);
            Ok(out)
        }
    }

    fn svc(fx: &Fixture, store: Option<Arc<dyn ObjectStore>>) -> OpusMcp {
        OpusMcp::with_parts(config_for(fx.addr, "/api/query"), reqwest::Client::new(), store)
    }

    #[tokio::test]
    async fn fetch_latest_normalizes_expression_and_returns_papers() {
        let fx = fixture().await;
        let r = svc(&fx, None)
            .arxiv_category_fetch_latest(p(CategoryFetchArgs {
                category: Some("cs.AI | cs.LG".to_string()),
                fetch_size: Some(1000),
                ..Default::default()
            }))
            .await
            .unwrap();
        let v = payload(&r);
        assert_eq!(v["ok"], true);
        assert_eq!(v["kind"], "arxiv_category_fetch_latest");
        assert_eq!(v["schema_version"], SCHEMA_VERSION);
        assert_eq!(v["search_query"], "(cat:cs.AI+OR+cat:cs.LG)");
        assert_eq!(v["max_results"], MAX_FETCH_SIZE);
        assert_eq!(v["request"]["fetch_size"], MAX_FETCH_SIZE);
        assert_eq!(v["papers"][0]["arxiv_id"], "2401.00001v1");
        assert_eq!(v["total_results"], 1);

        // Text copy mirrors the structured payload.
        let text = r.content[0].as_text().unwrap().text.clone();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&text).unwrap(), v);

        let q = fx.queries.lock().unwrap()[0].clone();
        assert!(q.starts_with("search_query=%28cat%3Acs.AI+OR+cat%3Acs.LG%29&start=0&max_results=200"), "{q}");
    }

    #[tokio::test]
    async fn fetch_latest_rejects_empty_and_oversized_expressions() {
        let fx = fixture().await;
        let s = svc(&fx, None);
        for category in [None, Some("  ".to_string()), Some("cs.AI ".repeat(300))] {
            let v = payload(
                &s.arxiv_category_fetch_latest(p(CategoryFetchArgs {
                    category,
                    ..Default::default()
                }))
                .await
                .unwrap(),
            );
            assert_eq!(v["ok"], false);
            assert_eq!(v["error"]["code"], "invalid_params");
            assert_eq!(v["error"]["retryable"], false);
        }
        assert!(fx.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_retryable_fetch_failed() {
        let fx = fixture().await;
        let s = OpusMcp::with_parts(
            config_for(fx.addr, "/broken/api/query"),
            reqwest::Client::new(),
            None,
        );
        let v = payload(
            &s.arxiv_category_fetch_latest(p(CategoryFetchArgs {
                category: Some("cs.AI".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["error"]["code"], "fetch_failed");
        assert_eq!(v["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn taxonomy_full_and_filtered() {
        let fx = fixture().await;
        let s = svc(&fx, None);
        let v = payload(&s.arxiv_category_taxonomy(p(TaxonomyArgs::default())).await.unwrap());
        assert_eq!(v["ok"], true);
        assert_eq!(v["group_count"], 2);
        assert_eq!(v["categories"]["stat.ML"]["group"], "stat");

        let v = payload(
            &s.arxiv_category_taxonomy(p(TaxonomyArgs {
                group: Some("cs".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["category_count"], 1);
        assert_eq!(v["categories"]["cs.AI"]["name"], "Artificial Intelligence");

        let v = payload(
            &s.arxiv_category_taxonomy(p(TaxonomyArgs {
                group: Some("astro".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["error"]["code"], "invalid_params");
    }

    #[test]
    fn fetch_args_accept_camel_case_names() {
        let a: CategoryFetchArgs = serde_json::from_value(serde_json::json!({
            "category": "cs.AI",
            "startIndex": 20,
            "fetchSize": 5,
        }))
        .unwrap();
        assert_eq!(a.start_index, Some(20));
        assert_eq!(a.fetch_size, Some(5));

        let a: CategoryFetchArgs =
            serde_json::from_value(serde_json::json!({"start_index": 3})).unwrap();
        assert_eq!(a.start_index, Some(3));
    }

    #[tokio::test]
    async fn download_requires_storage() {
        let fx = fixture().await;
        let v = payload(
            &svc(&fx, None)
                .arxiv_download_pdf(p(DownloadPdfArgs {
                    id_or_url: Some("2401.00001v1".to_string()),
                    ..Default::default()
                }))
                .await
                .unwrap(),
        );
        assert_eq!(v["error"]["code"], "not_configured");
        assert_eq!(v["request"]["object_name"], "2401.00001v1.pdf");
        assert_eq!(v["request"]["bucket"], DEFAULT_BUCKET);
    }

    #[tokio::test]
    async fn download_stores_pdf_and_reports_checksum() {
        let fx = fixture().await;
        let store = Arc::new(MemStore {
            buckets: vec![DEFAULT_BUCKET],
            ..Default::default()
        });
        let s = svc(&fx, Some(store.clone()));
        let url = format!("http://{}/pdf/2401.00001v1.pdf", fx.addr);
        let v = payload(
            &s.arxiv_download_pdf(p(DownloadPdfArgs {
                id_or_url: Some(url.clone()),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["ok"], true, "{v}");
        assert_eq!(v["arxiv_id"], "2401.00001v1");
        assert_eq!(v["object"], "2401.00001v1.pdf");
        assert_eq!(v["size"], PDF.len());
        assert_eq!(v["content_type"], "application/pdf");
        assert_eq!(v["sha256"].as_str().map(str::len), Some(64));

        let puts = store.puts.lock().unwrap();
        assert_eq!(puts[0].metadata["source-url"], url);
    }

    #[tokio::test]
    async fn download_clamps_max_bytes() {
        let fx = fixture().await;
        let store = Arc::new(MemStore {
            buckets: vec![DEFAULT_BUCKET],
            ..Default::default()
        });
        let s = svc(&fx, Some(store));
        let url = format!("http://{}/pdf/2401.00001v1.pdf", fx.addr);
        let v = payload(
            &s.arxiv_download_pdf(p(DownloadPdfArgs {
                id_or_url: Some(url.clone()),
                max_bytes: Some(u64::MAX),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["ok"], true, "{v}");
        assert_eq!(v["request"]["max_bytes"], MAX_DOWNLOAD_BYTES);

        let v = payload(
            &s.arxiv_download_pdf(p(DownloadPdfArgs {
                id_or_url: Some(url),
                object_name: Some("zero.pdf".to_string()),
                max_bytes: Some(0),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["request"]["max_bytes"], 1);
        assert_eq!(v["error"]["code"], "fetch_failed");
    }

    #[tokio::test]
    async fn download_missing_bucket_and_bad_id() {
        let fx = fixture().await;
        let s = svc(&fx, Some(Arc::new(MemStore::default())));
        let v = payload(
            &s.arxiv_download_pdf(p(DownloadPdfArgs {
                id_or_url: Some("cs/9901001".to_string()),
                bucket: Some("missing".to_string()),
                ..Default::default()
            }))
            .await
            .unwrap(),
        );
        assert_eq!(v["error"]["code"], "storage_failed");
        assert_eq!(v["error"]["retryable"], false);
        assert_eq!(v["request"]["object_name"], "cs_9901001.pdf");

        let v = payload(&s.arxiv_download_pdf(p(DownloadPdfArgs::default())).await.unwrap());
        assert_eq!(v["error"]["code"], "invalid_params");
    }

    #[tokio::test]
    async fn meta_reports_configuration_without_secrets() {
        let cfg = ServerConfig::from_lookup(|k: &str| match k {
            "OPUS_MCP_S3_ENDPOINT" => Some("minio.local:9000".to_string()),
            "OPUS_MCP_S3_ACCESS_KEY" => Some("AKIAEXAMPLE".to_string()),
            "OPUS_MCP_S3_SECRET_KEY" => Some("sekret-value".to_string()),
            "HTTPS_PROXY" => Some("http://user:pw@proxy:3128".to_string()),
            _ => None,
        })
        .unwrap();
        let s = OpusMcp::new(cfg).unwrap();
        let v = payload(&s.opus_meta().await.unwrap());
        assert_eq!(v["ok"], true);
        assert_eq!(v["configured"]["storage"], true);
        assert_eq!(v["configured"]["proxy"], true);
        assert_eq!(v["endpoints"]["storage"], "https://minio.local:9000");
        assert_eq!(v["arxiv_min_interval_ms"], 3000);
        assert_eq!(v["tools"].as_array().map(Vec::len), Some(TOOL_NAMES.len()));
        let s = v.to_string();
        for secret in ["AKIAEXAMPLE", "sekret-value", "user:pw"] {
            assert!(!s.contains(secret), "leaked {secret}");
        }
    }
}
