//! Daemon entry point for the Haloscan SEO server.
//!
//! Loads configuration from the environment, builds the shared analysis control
//! plane, and serves MCP over stdio or MCP streamable HTTP alongside the REST API.

mod config;

use std::sync::Arc;

use haloscan_core::{AnalysisControlPlane, HaloscanClient};
use haloscan_http::{HttpServer, HttpServerConfig};
use haloscan_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::HaloscanConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = HaloscanConfig::from_args()?;
    init_tracing(&config.log_filter);

    let client = HaloscanClient::new(config.client.clone())?;
    let control = Arc::new(AnalysisControlPlane::new(client, config.control.clone()));
    info!(
        base_url = %config.client.base_url,
        tranches = config.control.policy.tranches().len(),
        "haloscan-mcpd starting"
    );

    if config.enable_stdio {
        return serve_stdio(control).await;
    }

    let mut servers: JoinSet<Result<(), BoxError>> = JoinSet::new();
    if config.mcp_serve {
        let control = Arc::clone(&control);
        let mcp_config = McpHttpServerConfig::new(config.mcp_http_addr)
            .with_sse_keep_alive(config.mcp_sse_keep_alive);
        servers.spawn(async move { serve_streamable_http(control, mcp_config).await });
    }
    if config.http_serve {
        let http_config = HttpServerConfig::new(config.http_addr)
            .with_request_timeout(config.http_timeout)
            .with_max_body_bytes(config.http_max_body_bytes);
        servers.spawn(HttpServer::new(Arc::clone(&control), http_config).serve());
    }

    while let Some(joined) = servers.join_next().await {
        joined??;
    }
    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
