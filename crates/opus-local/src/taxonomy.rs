//! arXiv category taxonomy, scraped from <https://arxiv.org/category_taxonomy>.
//!
//! The page lists groups as `h2.accordion-head` headings, each followed by a
//! `div.accordion-body` holding `div.columns.divided` rows of
//! `<h4>cs.AI <span>(Artificial Intelligence)</span></h4>` plus a `<p>` description.
//! Physics nests one more level (archives under `h3`), which the row selector skips over.

use crate::{normalize_ws, Error, Result};
use html_scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_TAXONOMY_URL: &str = "https://arxiv.org/category_taxonomy";

/// Archives whose categories all belong to the physics group.
const PHYSICS_ARCHIVES: [&str; 13] = [
    "astro-ph", "cond-mat", "gr-qc", "hep-ex", "hep-lat", "hep-ph", "hep-th", "math-ph", "nlin",
    "nucl-ex", "nucl-th", "physics", "quant-ph",
];

const GROUP_CODES: [(&str, &str); 8] = [
    ("Computer Science", "cs"),
    ("Economics", "econ"),
    ("Electrical Engineering and Systems Science", "eess"),
    ("Mathematics", "math"),
    ("Physics", "physics"),
    ("Quantitative Biology", "q-bio"),
    ("Quantitative Finance", "q-fin"),
    ("Statistics", "stat"),
];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaxonomyGroup {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaxonomyCategory {
    pub code: String,
    pub name: String,
    pub description: String,
    pub group: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Taxonomy {
    pub groups: BTreeMap<String, TaxonomyGroup>,
    pub categories: BTreeMap<String, TaxonomyCategory>,
}

impl Taxonomy {
    /// Keep one group and its categories.
    pub fn filter_group(mut self, code: &str) -> Result<Self> {
        let code = code.trim();
        let Some(group) = self.groups.remove(code) else {
            let known: Vec<&str> = self.groups.keys().map(String::as_str).collect();
            return Err(Error::InvalidInput(format!(
                "unknown group {code:?} (known: {})",
                known.join(", ")
            )));
        };
        self.categories.retain(|_, c| c.group == code);
        Ok(Self {
            groups: BTreeMap::from([(code.to_string(), group)]),
            categories: self.categories,
        })
    }
}

/// `cs.AI` → `cs`, `astro-ph.CO` → `physics`, `gr-qc` → `physics`.
pub fn derive_group_code(category: &str) -> String {
    let prefix = category.split('.').next().unwrap_or(category).trim();
    if PHYSICS_ARCHIVES.contains(&prefix) {
        "physics".to_string()
    } else {
        prefix.to_string()
    }
}

fn group_code_for_heading(name: &str) -> Option<&'static str> {
    GROUP_CODES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, c)| *c)
}

/// `"cs.AI (Artificial Intelligence)"` → `("cs.AI", "Artificial Intelligence")`.
fn split_heading(h: &str) -> Option<(String, String)> {
    let h = normalize_ws(h);
    let (code, rest) = match h.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (h.as_str(), ""),
    };
    if code.is_empty() {
        return None;
    }
    let name = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(rest)
        .trim();
    Some((code.to_string(), name.to_string()))
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| Error::Parse(format!("bad selector {s:?}: {e}")))
}

pub fn parse_taxonomy(html: &str) -> Result<Taxonomy> {
    let doc = Html::parse_document(html);
    let heads = selector("#category_taxonomy_list h2.accordion-head")?;
    let rows = selector("#category_taxonomy_list div.columns.divided")?;
    let h4 = selector("h4")?;
    let p = selector("p")?;

    let mut tax = Taxonomy::default();
    for el in doc.select(&heads) {
        let name = normalize_ws(&el.text().collect::<String>());
        match group_code_for_heading(&name) {
            Some(code) => {
                tax.groups.insert(
                    code.to_string(),
                    TaxonomyGroup {
                        code: code.to_string(),
                        name,
                    },
                );
            }
            None => tracing::debug!(heading = %name, "skipping unrecognized taxonomy group"),
        }
    }

    for row in doc.select(&rows) {
        let Some(head) = row.select(&h4).next() else {
            continue;
        };
        let Some((code, name)) = split_heading(&head.text().collect::<String>()) else {
            continue;
        };
        let description = row
            .select(&p)
            .next()
            .map(|d| normalize_ws(&d.text().collect::<String>()))
            .unwrap_or_default();
        let group = derive_group_code(&code);
        tax.categories.insert(
            code.clone(),
            TaxonomyCategory {
                code,
                name,
                description,
                group,
            },
        );
    }

    if tax.categories.is_empty() {
        return Err(Error::Parse(
            "no categories found in taxonomy page".to_string(),
        ));
    }
    Ok(tax)
}

pub async fn fetch_taxonomy(
    http: &reqwest::Client,
    url: &url::Url,
    timeout: Duration,
) -> Result<Taxonomy> {
    tracing::info!(url = %url, "fetching arXiv category taxonomy");
    let resp = http
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Fetch(format!("failed to fetch taxonomy: {e}")))?;
    if !resp.status().is_success() {
        return Err(Error::Fetch(format!(
            "taxonomy request failed: HTTP {}",
            resp.status().as_u16()
        )));
    }
    let body = resp
        .text()
        .await
        .map_err(|e| Error::Fetch(format!("failed to read taxonomy page: {e}")))?;
    let tax = parse_taxonomy(&body)?;
    tracing::info!(
        groups = tax.groups.len(),
        categories = tax.categories.len(),
        "parsed taxonomy"
    );
    Ok(tax)
}
