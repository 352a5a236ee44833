//! Streamable HTTP transport (stateless) at `/mcp`, plus `/`, `/health` and `/healthz`.

use super::OpusMcp;
use crate::config::ServerConfig;
use axum::{routing::get, Json, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

const ROOT_HINT: &str =
    "opus-mcp: MCP streamable HTTP endpoint at /mcp (POST JSON-RPC). Health: /health\n";

#[derive(Debug, serde::Serialize)]
pub(crate) struct Health {
    status: &'static str,
    name: &'static str,
    version: &'static str,
    uptime_s: u64,
    os: &'static str,
    arch: &'static str,
}

pub(crate) fn health(started: Instant) -> Health {
    Health {
        status: "ok",
        name: "opus-mcp",
        version: env!("CARGO_PKG_VERSION"),
        uptime_s: started.elapsed().as_secs(),
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
    }
}

pub(crate) fn router(svc: OpusMcp, log_requests: bool) -> Router {
    let started = svc.started();
    let mcp = StreamableHttpService::new(
        move || Ok(svc.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );
    let health_route = get(move || async move { Json(health(started)) });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(|| async { ROOT_HINT }))
        .route("/health", health_route.clone())
        .route("/healthz", health_route)
        .nest_service("/mcp", mcp)
        .layer(cors);
    if log_requests {
        app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        )
    } else {
        app
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

pub(crate) async fn serve_http(
    cfg: ServerConfig,
    host: &str,
    port: u16,
    log_requests: bool,
) -> anyhow::Result<()> {
    let svc = OpusMcp::new(cfg).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "serving MCP over streamable HTTP at /mcp");
    axum::serve(listener, router(svc, log_requests))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(log_requests: bool) -> std::net::SocketAddr {
        let cfg = ServerConfig::from_lookup(|_| None).unwrap();
        let svc = OpusMcp::with_parts(cfg, reqwest::Client::new(), None);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(svc, log_requests)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn health_endpoints_report_status() {
        let addr = spawn(false).await;
        for path in ["/health", "/healthz"] {
            let v: serde_json::Value = reqwest::get(format!("http://{addr}{path}"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(v["status"], "ok");
            assert_eq!(v["name"], "opus-mcp");
            assert_eq!(v["os"], std::env::consts::OS);
            assert!(v["uptime_s"].is_u64());
        }
    }

    #[tokio::test]
    async fn root_points_at_mcp_endpoint() {
        let addr = spawn(true).await;
        let body = reqwest::get(format!("http://{addr}/"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("/mcp"), "{body}");
    }

    #[tokio::test]
    async fn mcp_endpoint_rejects_plain_get() {
        let addr = spawn(false).await;
        let resp = reqwest::get(format!("http://{addr}/mcp")).await.unwrap();
        assert!(!resp.status().is_success(), "{}", resp.status());
    }
}
