//! MCP server runners for haloscan-mcp.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use haloscan_core::{AnalysisControlPlane, SeoApi};
use rmcp::serve_server;
use serde_json::{Value, json};
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use tracing::info;

use crate::HaloscanMcp;

pub const DEFAULT_MCP_HTTP_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 4020);

pub const DEFAULT_SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
const SSE_RETRY: Duration = Duration::from_secs(3);

/// Listener settings for the MCP streamable HTTP transport.
///
/// Sessions are always stateful so progress notifications reach the caller
/// while `run_chunked_analysis` is running.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    /// `None` disables SSE keep-alive pings.
    pub sse_keep_alive: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            sse_keep_alive: Some(DEFAULT_SSE_KEEP_ALIVE),
        }
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }
}

impl Default for McpHttpServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MCP_HTTP_ADDR)
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio<A: SeoApi>(
    control: Arc<AnalysisControlPlane<A>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = HaloscanMcp::with_control(control);
    let (stdin, stdout) = stdio();
    info!("MCP server listening on stdio");
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Builds the axum router serving MCP at `/mcp` and a liveness check at `/health`.
pub fn build_router<A: SeoApi>(
    control: Arc<AnalysisControlPlane<A>>,
    config: &McpHttpServerConfig,
) -> Router {
    let service: StreamableHttpService<HaloscanMcp<A>, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(HaloscanMcp::with_control(Arc::clone(&control))),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: Some(SSE_RETRY),
                stateful_mode: true,
                ..Default::default()
            },
        );

    let keep_alive_secs = config.sse_keep_alive.map(|interval| interval.as_secs());
    Router::new()
        .route("/health", get(move || health(keep_alive_secs)))
        .nest_service("/mcp", service)
}

async fn health(keep_alive_secs: Option<u64>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "sse_keep_alive_secs": keep_alive_secs,
    }))
}

/// Serves the MCP server using streamable HTTP transport.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http<A: SeoApi>(
    control: Arc<AnalysisControlPlane<A>>,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(control, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("MCP streamable HTTP server listening on {}/mcp", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
