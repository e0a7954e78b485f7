//! MCP server implementation for haloscan-mcp.
//!
//! This crate wires the analysis control plane into rmcp tool handlers and
//! exposes the SEO lookups and the chunked analysis as MCP tools.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use haloscan_core::{AnalysisControlPlane, SeoApi};
use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};

const SERVER_INSTRUCTIONS: &str = r"haloscan-mcp exposes the Haloscan SEO API (keyword and domain analytics) as MCP tools.

Workflow:
1. Call `get_user_credits` to check the account before large analyses. `health` returns `ok`.
2. Single lookups return the upstream JSON for one query:
   - keywords: `analyze_keyword`, `find_keyword_matches`, `find_similar_keywords`, `get_keyword_questions`.
   - domains: `analyze_domain`, `find_domain_competitors`, `get_domain_top_pages`.
   - `analyze_keywords_bulk` (up to 100 keywords) and `analyze_domains_bulk` (up to 50 domains) batch one call.
   - `search_keywords_by_position` returns the top keywords of a domain within a rank range, sorted by traffic.
3. For a complete picture use `run_chunked_analysis` with a `target` and a `mode` (`domain` or `keyword`).
   The server splits the work into small sequential upstream calls, reports progress per step and
   returns one compact report bounded by `output_budget` tokens (default 4000).
   `plan_analysis` shows the steps without calling the upstream API.

Notes:
- Domains are normalized: scheme, path, port and a leading `www.` are ignored.
- Failed steps appear in the report as `step <name> unavailable: <reason>` lines; other steps still count.
- `lang` is a two-letter code and defaults to `fr`. `line_count` is capped at 200.
- Use `help` for the command list.";

/// MCP server wrapper around the analysis control plane and tool routers.
pub struct HaloscanMcp<A: SeoApi> {
    tool_router: ToolRouter<Self>,
    control: Arc<AnalysisControlPlane<A>>,
}

impl<A: SeoApi> Clone for HaloscanMcp<A> {
    fn clone(&self) -> Self {
        Self {
            tool_router: self.tool_router.clone(),
            control: Arc::clone(&self.control),
        }
    }
}

impl<A: SeoApi> HaloscanMcp<A> {
    /// Creates a new server owning its control plane.
    #[must_use]
    pub fn new(control: AnalysisControlPlane<A>) -> Self {
        Self::with_control(Arc::new(control))
    }

    /// Creates a new server using a shared control plane handle.
    #[must_use]
    pub fn with_control(control: Arc<AnalysisControlPlane<A>>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_keywords()
            + Self::tool_router_domains()
            + Self::tool_router_analysis()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    pub(crate) fn control(&self) -> &AnalysisControlPlane<A> {
        &self.control
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl<A: SeoApi> HaloscanMcp<A> {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }

    #[tool(description = "Return the remaining Haloscan API credits of the configured account.")]
    async fn get_user_credits(&self) -> Result<CallToolResult, ErrorData> {
        let credits = self
            .control
            .user_credit()
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(credits)?]))
    }
}

#[tool_handler]
impl<A: SeoApi> ServerHandler for HaloscanMcp<A> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use haloscan_core::ControlConfig;
    use haloscan_core::testing::ScriptedApi;

    use super::*;

    #[test]
    fn every_tool_is_registered() {
        let server = HaloscanMcp::new(AnalysisControlPlane::new(
            ScriptedApi::default(),
            ControlConfig::default(),
        ));
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            [
                "analyze_domain",
                "analyze_domains_bulk",
                "analyze_keyword",
                "analyze_keywords_bulk",
                "find_domain_competitors",
                "find_keyword_matches",
                "find_similar_keywords",
                "get_domain_top_pages",
                "get_keyword_questions",
                "get_user_credits",
                "health",
                "help",
                "plan_analysis",
                "run_chunked_analysis",
                "search_keywords_by_position",
            ]
        );
    }
}
