//! ArXiv category feed client (Atom API).
//!
//! Notes:
//! - The API lives at `https://export.arxiv.org/api/query`; the server config lets
//!   `OPUS_MCP_ARXIV_ENDPOINT` override it (tests point it at a local fixture).
//! - Every request goes through the shared [`RateLimiter`]. There are no retries.
//! - Atom parsing is deliberately minimal and resilient: a malformed tail yields the
//!   entries parsed so far plus a warning.

use crate::ratelimit::RateLimiter;
use crate::{normalize_ws, Error, Result};
use opus_core::parse_category_expression;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ARXIV_ENDPOINT: &str = "https://export.arxiv.org/api/query";

#[derive(Debug, Clone, serde::Serialize)]
pub struct ArxivPaper {
    pub arxiv_id: String,
    pub url: String,
    pub pdf_url: Option<String>,
    pub title: String,
    pub summary: String,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub primary_category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryFeedRequest {
    /// Free-form boolean category expression, e.g. `cs.AI or (cs.LG not cs.CV)`.
    pub category: String,
    pub start: usize,
    pub max_results: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CategoryFeedResponse {
    pub ok: bool,
    pub search_query: String,
    pub start: usize,
    pub max_results: usize,
    pub total_results: Option<u64>,
    pub papers: Vec<ArxivPaper>,
    pub warnings: Vec<&'static str>,
    /// Time spent waiting on the rate limiter.
    pub rate_limit_wait_ms: u128,
}

fn arxiv_id_from_url(url: &str) -> Option<String> {
    // Examples:
    // - https://arxiv.org/abs/0805.3415
    // - http://arxiv.org/abs/cs/9901001v1
    // - https://arxiv.org/pdf/0805.3415v1.pdf
    let u = url.trim();
    let tail = if let Some(i) = u.rfind("/abs/") {
        &u[i + "/abs/".len()..]
    } else {
        let i = u.rfind("/pdf/")?;
        let t = &u[i + "/pdf/".len()..];
        t.strip_suffix(".pdf").unwrap_or(t)
    };
    let id = tail.trim_matches('/').trim();
    (!id.is_empty()).then_some(id.to_string())
}

/// Accept a bare id (`0805.3415`, `cs/9901001v1`) or an abs/pdf URL.
pub fn normalize_arxiv_id(id_or_url: &str) -> Option<String> {
    let raw = id_or_url.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains("://") || raw.contains("arxiv.org/") {
        return arxiv_id_from_url(raw);
    }
    let id = raw.strip_prefix("arXiv:").unwrap_or(raw).trim();
    (!id.is_empty()).then_some(id.to_string())
}

pub fn arxiv_abs_url(id: &str) -> String {
    format!("https://arxiv.org/abs/{}", id.trim())
}

pub fn arxiv_pdf_url(id: &str) -> String {
    format!("https://arxiv.org/pdf/{}.pdf", id.trim())
}

/// `(id, pdf url)` for an id or URL. Explicit `/pdf/` URLs are fetched as given
/// (mirrors, local fixtures); ids and abs URLs go to arxiv.org.
pub fn resolve_pdf_source(id_or_url: &str) -> Option<(String, String)> {
    let id = normalize_arxiv_id(id_or_url)?;
    let raw = id_or_url.trim();
    let url = if raw.contains("://") && raw.contains("/pdf/") {
        raw.to_string()
    } else {
        arxiv_pdf_url(&id)
    };
    Some((id, url))
}

/// Percent-encode each `+`-separated segment, keeping the `+` joins so the server
/// decodes them as spaces.
fn encode_search_query(expr: &str) -> String {
    expr.split('+')
        .map(|seg| url::form_urlencoded::byte_serialize(seg.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("+")
}

fn build_feed_url(endpoint: &url::Url, search_query: &str, start: usize, max: usize) -> url::Url {
    let mut url = endpoint.clone();
    url.set_query(Some(&format!(
        "search_query={}&start={start}&max_results={max}&sortBy=submittedDate&sortOrder=descending",
        encode_search_query(search_query)
    )));
    url
}

#[derive(Default)]
struct Cur {
    id_url: String,
    title: String,
    summary: String,
    published: Option<String>,
    updated: Option<String>,
    authors: Vec<String>,
    categories: Vec<String>,
    primary_category: Option<String>,
    pdf_url: Option<String>,
    in_entry: bool,
    in_author: bool,
    cur_text: String,
    cur_tag: String,
}

impl Cur {
    /// Attribute-bearing elements (`category`, `primary_category`, `link`) may arrive as
    /// either start or empty tags.
    fn absorb_attrs(&mut self, name: &str, e: &quick_xml::events::BytesStart<'_>) {
        if !self.in_entry {
            return;
        }
        let attr = |key: &str| {
            e.attributes().flatten().find_map(|a| {
                (a.key.as_ref() == key.as_bytes()).then(|| {
                    a.unescape_value()
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                })
            })
        };
        if name.ends_with("primary_category") {
            self.primary_category = attr("term").filter(|v| !v.trim().is_empty());
        } else if name.ends_with("category") {
            if let Some(v) = attr("term").filter(|v| !v.trim().is_empty()) {
                self.categories.push(v);
            }
        } else if name.ends_with("link")
            && attr("rel").as_deref() == Some("related")
            && attr("type").as_deref() == Some("application/pdf")
        {
            self.pdf_url = attr("href");
        }
    }

    fn finish(&mut self) -> ArxivPaper {
        let raw = std::mem::take(&mut self.id_url);
        let (arxiv_id, url) = match arxiv_id_from_url(&raw) {
            Some(id) => {
                let abs = arxiv_abs_url(&id);
                (id, abs)
            }
            None => (raw.clone(), raw),
        };
        let pdf_url = self
            .pdf_url
            .take()
            .or_else(|| Some(arxiv_pdf_url(&arxiv_id)));
        ArxivPaper {
            arxiv_id,
            url,
            pdf_url,
            title: std::mem::take(&mut self.title),
            summary: std::mem::take(&mut self.summary),
            published: self.published.take(),
            updated: self.updated.take(),
            authors: std::mem::take(&mut self.authors),
            categories: std::mem::take(&mut self.categories),
            primary_category: self.primary_category.take(),
        }
    }
}

pub(crate) fn parse_atom(body: &str) -> (Option<u64>, Vec<ArxivPaper>, Vec<&'static str>) {
    use quick_xml::events::Event;

    let mut warnings: Vec<&'static str> = Vec::new();
    let mut total_results: Option<u64> = None;
    let mut papers: Vec<ArxivPaper> = Vec::new();

    let mut reader = quick_xml::Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut cur = Cur::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.ends_with("entry") {
                    cur = Cur::default();
                    cur.in_entry = true;
                }
                if cur.in_entry && name.ends_with("author") {
                    cur.in_author = true;
                }
                cur.absorb_attrs(&name, &e);
                cur.cur_tag = name;
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                cur.absorb_attrs(&name, &e);
            }
            Ok(Event::Text(t)) => {
                let txt = t.unescape().map(|t| t.to_string()).unwrap_or_default();
                if cur.in_entry {
                    cur.cur_text.push_str(&txt);
                } else if cur.cur_tag.ends_with("totalResults") {
                    if let Ok(n) = txt.trim().parse::<u64>() {
                        total_results = Some(n);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if cur.in_entry {
                    let txt = normalize_ws(&cur.cur_text);
                    if name.ends_with("id") {
                        cur.id_url = txt;
                    } else if name.ends_with("title") {
                        cur.title = txt;
                    } else if name.ends_with("summary") {
                        cur.summary = txt;
                    } else if name.ends_with("published") {
                        cur.published = (!txt.is_empty()).then_some(txt);
                    } else if name.ends_with("updated") {
                        cur.updated = (!txt.is_empty()).then_some(txt);
                    } else if cur.in_author && name.ends_with("name") && !txt.is_empty() {
                        cur.authors.push(txt);
                    }
                    cur.cur_text.clear();

                    if name.ends_with("author") {
                        cur.in_author = false;
                    }
                    if name.ends_with("entry") {
                        cur.in_entry = false;
                        papers.push(cur.finish());
                    }
                }
                cur.cur_tag.clear();
            }
            Err(_) => {
                warnings.push("arxiv_xml_parse_failed_partial");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    (total_results, papers, warnings)
}

/// Feed client with its collaborators injected.
#[derive(Debug, Clone)]
pub struct ArxivClient {
    http: reqwest::Client,
    endpoint: url::Url,
    limiter: Arc<RateLimiter>,
}

impl ArxivClient {
    pub fn new(http: reqwest::Client, endpoint: url::Url, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            endpoint,
            limiter,
        }
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Latest submissions matching a category expression, newest first.
    pub async fn fetch_latest_by_category(
        &self,
        req: &CategoryFeedRequest,
    ) -> Result<CategoryFeedResponse> {
        let search_query = parse_category_expression(&req.category)?;
        let url = build_feed_url(&self.endpoint, &search_query, req.start, req.max_results);

        let waited = self.limiter.acquire().await;
        tracing::info!(url = %url, waited_ms = waited.as_millis() as u64, "fetching Atom feed from arXiv");

        let resp = self
            .http
            .get(url)
            .timeout(req.timeout.max(Duration::from_secs(1)))
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("failed to fetch from arXiv: {e}")))?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(Error::Fetch(format!("arxiv query failed: HTTP {status}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("failed to read response body: {e}")))?;
        let (total_results, papers, warnings) = parse_atom(&body);
        if !warnings.is_empty() {
            tracing::warn!(?warnings, parsed = papers.len(), "arXiv feed parsed partially");
        }

        Ok(CategoryFeedResponse {
            ok: true,
            search_query,
            start: req.start,
            max_results: req.max_results,
            total_results,
            papers,
            warnings,
            rate_limit_wait_ms: waited.as_millis(),
        })
    }
}
