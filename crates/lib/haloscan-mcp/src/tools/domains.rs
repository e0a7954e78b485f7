use haloscan_core::SeoApi;
use haloscan_core::control::{BulkQuery, DomainQuery, PositionQuery};
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::{HaloscanMcp, helpers};

/// Parameters for a single domain lookup.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DomainParams {
    /// Domain name or URL; scheme, path and `www.` are ignored.
    pub domain: String,
    pub lang: Option<String>,
    /// Rows to request from list endpoints (1-200, default 20).
    #[serde(alias = "lineCount")]
    pub line_count: Option<u32>,
}

impl From<DomainParams> for DomainQuery {
    fn from(params: DomainParams) -> Self {
        Self {
            domain: params.domain,
            lang: params.lang,
            line_count: params.line_count,
        }
    }
}

/// Parameters for a rank range search on one domain.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PositionParams {
    pub domain: String,
    /// Lowest rank to include (1-100, default 1). Page 2 of the SERP is 11-20.
    pub position_min: Option<u32>,
    /// Highest rank to include (1-100, default 10).
    pub position_max: Option<u32>,
    /// Maximum keywords returned, highest traffic first (default 20).
    pub limit: Option<usize>,
}

impl From<PositionParams> for PositionQuery {
    fn from(params: PositionParams) -> Self {
        Self {
            domain: params.domain,
            position_min: params.position_min.unwrap_or(1),
            position_max: params.position_max.unwrap_or(10),
            limit: params.limit,
        }
    }
}

/// Parameters for one bulk domain call.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DomainsBulkParams {
    /// Domains or URLs to compare (1-50).
    pub domains: Vec<String>,
    /// Data sections to return, `["overview"]` when omitted.
    #[serde(alias = "requestedData")]
    pub requested_data: Option<Vec<String>>,
}

impl From<DomainsBulkParams> for BulkQuery {
    fn from(params: DomainsBulkParams) -> Self {
        Self {
            items: params.domains,
            requested_data: params.requested_data,
        }
    }
}

#[tool_router(router = tool_router_domains, vis = "pub")]
impl<A: SeoApi> HaloscanMcp<A> {
    #[tool(description = "Domain overview: traffic, keyword counts and visibility metrics.")]
    async fn analyze_domain(
        &self,
        Parameters(params): Parameters<DomainParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let overview = self
            .control()
            .domain_overview(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(overview)?]))
    }

    #[tool(description = "Organic competitors of a domain ranked by shared keywords.")]
    async fn find_domain_competitors(
        &self,
        Parameters(params): Parameters<DomainParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let competitors = self
            .control()
            .domain_competitors(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(competitors)?]))
    }

    #[tool(description = "Best performing pages of a domain.")]
    async fn get_domain_top_pages(
        &self,
        Parameters(params): Parameters<DomainParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let pages = self
            .control()
            .domain_top_pages(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(pages)?]))
    }

    #[tool(description = "Top keywords of a domain within a rank range (e.g. 11-20 for SERP page 2), sorted by traffic.")]
    async fn search_keywords_by_position(
        &self,
        Parameters(params): Parameters<PositionParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let report = self
            .control()
            .keywords_by_position(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(report)?]))
    }

    #[tool(description = "Compare up to 50 domains in a single upstream call.")]
    async fn analyze_domains_bulk(
        &self,
        Parameters(params): Parameters<DomainsBulkParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let bulk = self
            .control()
            .domains_bulk(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(bulk)?]))
    }
}
