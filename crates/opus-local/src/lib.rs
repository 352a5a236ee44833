//! Network-facing implementations behind the opus-mcp tools.
//!
//! Everything here takes its collaborators (HTTP client, rate limiter, object store)
//! as explicit arguments; nothing is process-global.

pub use opus_core::{Error, Result};

pub mod arxiv;
pub mod http;
pub mod ratelimit;
pub mod storage;
pub mod taxonomy;

/// Truthy env-style flag: `1|true|yes|on` (case-insensitive, trimmed).
pub fn flag_is_set(v: Option<&str>) -> bool {
    matches!(
        v.unwrap_or_default().trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

pub(crate) fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub(crate) fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_set_accepts_common_truthy_spellings() {
        for v in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(flag_is_set(Some(v)), "{v:?}");
        }
        for v in ["", "0", "false", "nope"] {
            assert!(!flag_is_set(Some(v)), "{v:?}");
        }
        assert!(!flag_is_set(None));
    }

    #[test]
    fn helpers_trim_and_filter() {
        assert_eq!(parse_u64(Some(" 42 ".to_string())), Some(42));
        assert_eq!(parse_u64(Some("x".to_string())), None);
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(normalize_ws("  a \n b\t"), "a b");
    }
}
