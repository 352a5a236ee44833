use anyhow::Result;
use clap::{Parser, Subcommand};

mod config;
mod logging;
#[cfg(feature = "stdio")]
mod mcp;

#[derive(Parser, Debug)]
#[command(name = "opus-mcp")]
#[command(about = "arXiv category feeds and PDF archiving (MCP server)", long_about = None)]
struct Cli {
    /// Log level. Without it, RUST_LOG applies, then `info`. Logs go to stderr.
    #[arg(long, global = true, value_enum, env = "OPUS_MCP_LOG_LEVEL")]
    log_level: Option<logging::LogLevel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / Claude Desktop / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio,
    /// Run as an MCP streamable HTTP server (stateless, endpoint `/mcp`).
    #[cfg(feature = "http")]
    McpHttp(McpHttpCmd),
    /// Print version info.
    Version(VersionCmd),
    /// Normalize a category expression into an arXiv `search_query` (no network).
    ParseCategory(ParseCategoryCmd),
}

#[derive(clap::Args, Debug)]
struct McpHttpCmd {
    /// Interface to bind.
    #[arg(long, default_value = "localhost", env = "OPUS_MCP_HTTP_HOST")]
    host: String,
    /// Port to bind.
    #[arg(long, default_value_t = 8000, env = "OPUS_MCP_HTTP_PORT")]
    port: u16,
    /// Log every HTTP request/response at info level.
    #[arg(long)]
    log_requests: bool,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ParseCategoryCmd {
    /// Expression, e.g. "cs.AI or (cs.LG not cs.CV)".
    expression: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn parse_category_payload(expression: &str) -> (bool, serde_json::Value) {
    match opus_core::parse_category_expression(expression) {
        Ok(q) => (
            true,
            serde_json::json!({
                "schema_version": 1,
                "kind": "parse_category",
                "ok": true,
                "input": expression,
                "search_query": q,
            }),
        ),
        Err(e) => (
            false,
            serde_json::json!({
                "schema_version": 1,
                "kind": "parse_category",
                "ok": false,
                "input": expression,
                "error": { "code": "invalid_params", "message": e.to_string() },
            }),
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional env file (OPUS_MCP_ENV_FILE, else ./.env). Never overrides process env.
    let env_file = config::env_file_path();
    let loaded = env_file.as_deref().map(config::load_env_file);

    let cli = Cli::parse();
    logging::init_logging(cli.log_level);
    if let (Some(p), Some(n)) = (&env_file, loaded) {
        tracing::debug!(path = %p.display(), vars_set = n, "loaded env file");
    }

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio => {
            let cfg = config::ServerConfig::from_env()?;
            mcp::serve_stdio(cfg)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        #[cfg(feature = "http")]
        Commands::McpHttp(args) => {
            let cfg = config::ServerConfig::from_env()?;
            mcp::http::serve_http(cfg, &args.host, args.port, args.log_requests).await?;
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "opus-mcp",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("opus-mcp {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
        Commands::ParseCategory(args) => {
            let (ok, payload) = parse_category_payload(&args.expression);
            match args.output.to_ascii_lowercase().as_str() {
                "text" if ok => println!("{}", payload["search_query"].as_str().unwrap_or_default()),
                "text" => eprintln!("{}", payload["error"]["message"].as_str().unwrap_or_default()),
                _ => println!("{payload}"),
            }
            if !ok {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_category_payload_shapes() {
        let (ok, v) = parse_category_payload("cs.AI or cs.LG");
        assert!(ok);
        assert_eq!(v["search_query"], "(cat:cs.AI+OR+cat:cs.LG)");

        let (ok, v) = parse_category_payload("   ");
        assert!(!ok);
        assert_eq!(v["error"]["code"], "invalid_params");
        assert_eq!(v["error"]["message"], "empty expression");
    }

    #[cfg(feature = "http")]
    #[test]
    fn cli_parses_http_flags() {
        let cli = Cli::try_parse_from([
            "opus-mcp",
            "--log-level",
            "debug",
            "mcp-http",
            "--port",
            "9001",
            "--log-requests",
        ])
        .unwrap();
        assert_eq!(cli.log_level, Some(logging::LogLevel::Debug));
        match cli.command {
            Commands::McpHttp(a) => {
                assert_eq!(a.host, "localhost");
                assert_eq!(a.port, 9001);
                assert!(a.log_requests);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
