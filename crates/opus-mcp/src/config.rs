//! Process configuration: env-file loading and the server's env-derived settings.

use opus_core::{Error, Result};
use opus_local::arxiv::DEFAULT_ARXIV_ENDPOINT;
use opus_local::http::HttpClientConfig;
use opus_local::ratelimit::ARXIV_MIN_INTERVAL;
use opus_local::storage::StorageConfig;
use opus_local::taxonomy::DEFAULT_TAXONOMY_URL;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub(crate) http: HttpClientConfig,
    pub(crate) arxiv_endpoint: url::Url,
    pub(crate) taxonomy_url: url::Url,
    pub(crate) arxiv_min_interval: Duration,
    /// `None` when S3 env vars are incomplete; the download tool then reports `not_configured`.
    pub(crate) storage: Option<StorageConfig>,
}

fn url_or_default(get: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<url::Url> {
    let raw = get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string());
    url::Url::parse(&raw).map_err(|e| Error::InvalidUrl(format!("{key}={raw}: {e}")))
}

impl ServerConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let arxiv_min_interval = get("OPUS_MCP_ARXIV_MIN_INTERVAL_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(ARXIV_MIN_INTERVAL);
        Ok(Self {
            http: HttpClientConfig::from_lookup(&get),
            arxiv_endpoint: url_or_default(&get, "OPUS_MCP_ARXIV_ENDPOINT", DEFAULT_ARXIV_ENDPOINT)?,
            taxonomy_url: url_or_default(&get, "OPUS_MCP_TAXONOMY_URL", DEFAULT_TAXONOMY_URL)?,
            arxiv_min_interval,
            storage: StorageConfig::from_lookup(&get),
        })
    }
}

/// Which env file to load, if any: `OPUS_MCP_ENV_FILE`, else `./.env` when present.
/// `OPUS_MCP_DOTENV=0` disables loading entirely.
pub(crate) fn env_file_path() -> Option<PathBuf> {
    if std::env::var("OPUS_MCP_DOTENV").is_ok_and(|v| v.trim() == "0") {
        return None;
    }
    if let Ok(p) = std::env::var("OPUS_MCP_ENV_FILE") {
        let p = p.trim();
        return (!p.is_empty()).then(|| PathBuf::from(p));
    }
    let local = PathBuf::from(".env");
    local.is_file().then_some(local)
}

/// Set vars from a dotenv file without overriding the process env.
/// Returns how many were set. Values are never logged; malformed lines are skipped.
pub(crate) fn load_env_file(path: &Path) -> usize {
    let Ok(iter) = dotenvy::from_path_iter(path) else {
        return 0;
    };
    let mut n = 0;
    for (k, v) in iter.filter_map(|item| item.ok()) {
        if std::env::var_os(&k).is_none() {
            std::env::set_var(&k, v);
            n += 1;
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        // Env vars are process-global; hold the lock for the whole test.
        _lock: std::sync::MutexGuard<'static, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let saved: Vec<(String, Option<String>)> = keys
                .iter()
                .map(|k| (k.to_string(), std::env::var(k).ok()))
                .collect();
            for (k, _) in &saved {
                std::env::remove_var(k);
            }
            Self { _lock: lock, saved }
        }

        fn set(&self, k: &str, v: &str) {
            std::env::set_var(k, v);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (k, v) in self.saved.drain(..) {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn env_file_never_overrides_process_env() {
        let env = EnvGuard::new(&["OPUS_MCP_TEST_A", "OPUS_MCP_TEST_B"]);
        env.set("OPUS_MCP_TEST_A", "from-process");
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("test.env");
        std::fs::write(&p, "OPUS_MCP_TEST_A=from-file\nOPUS_MCP_TEST_B=b\n").unwrap();

        assert_eq!(load_env_file(&p), 1);
        assert_eq!(std::env::var("OPUS_MCP_TEST_A").unwrap(), "from-process");
        assert_eq!(std::env::var("OPUS_MCP_TEST_B").unwrap(), "b");
        assert_eq!(load_env_file(&dir.path().join("missing.env")), 0);
    }

    #[test]
    fn env_file_handles_comments_export_and_quotes() {
        let _env = EnvGuard::new(&["OPUS_MCP_TEST_C", "OPUS_MCP_TEST_D", "OPUS_MCP_TEST_E"]);
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("quoted.env");
        std::fs::write(
            &p,
            "# comment\n\nexport OPUS_MCP_TEST_C=two\nOPUS_MCP_TEST_D=\"q v\"\nOPUS_MCP_TEST_E='x=y'\n",
        )
        .unwrap();

        assert_eq!(load_env_file(&p), 3);
        assert_eq!(std::env::var("OPUS_MCP_TEST_C").unwrap(), "two");
        assert_eq!(std::env::var("OPUS_MCP_TEST_D").unwrap(), "q v");
        assert_eq!(std::env::var("OPUS_MCP_TEST_E").unwrap(), "x=y");
    }

    #[test]
    fn env_file_path_respects_opt_out_and_override() {
        let env = EnvGuard::new(&["OPUS_MCP_DOTENV", "OPUS_MCP_ENV_FILE"]);
        env.set("OPUS_MCP_ENV_FILE", "/tmp/opus.env");
        assert_eq!(env_file_path(), Some(PathBuf::from("/tmp/opus.env")));
        env.set("OPUS_MCP_DOTENV", "0");
        assert_eq!(env_file_path(), None);
    }

    #[test]
    fn server_config_defaults() {
        let cfg = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.arxiv_endpoint.as_str(), DEFAULT_ARXIV_ENDPOINT);
        assert_eq!(cfg.taxonomy_url.as_str(), DEFAULT_TAXONOMY_URL);
        assert_eq!(cfg.arxiv_min_interval, Duration::from_secs(3));
        assert!(cfg.storage.is_none());
    }

    #[test]
    fn server_config_from_env() {
        let env = EnvGuard::new(&[
            "OPUS_MCP_ARXIV_ENDPOINT",
            "OPUS_MCP_ARXIV_MIN_INTERVAL_MS",
            "OPUS_MCP_S3_ENDPOINT",
            "OPUS_MCP_S3_ACCESS_KEY",
            "OPUS_MCP_S3_SECRET_KEY",
        ]);
        env.set("OPUS_MCP_ARXIV_ENDPOINT", "http://127.0.0.1:1/api/query");
        env.set("OPUS_MCP_ARXIV_MIN_INTERVAL_MS", "250");
        env.set("OPUS_MCP_S3_ENDPOINT", "localhost:9000");
        env.set("OPUS_MCP_S3_ACCESS_KEY", "a");
        env.set("OPUS_MCP_S3_SECRET_KEY", "s");
        let cfg = ServerConfig::from_env().unwrap();
        assert_eq!(cfg.arxiv_endpoint.port(), Some(1));
        assert_eq!(cfg.arxiv_min_interval, Duration::from_millis(250));
        assert_eq!(cfg.storage.map(|s| s.endpoint), Some("localhost:9000".to_string()));
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        let err = ServerConfig::from_lookup(|k: &str| {
            (k == "OPUS_MCP_TAXONOMY_URL").then(|| "not a url".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(m) if m.contains("OPUS_MCP_TAXONOMY_URL")));
    }
}
