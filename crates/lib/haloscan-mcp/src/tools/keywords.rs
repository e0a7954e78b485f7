use haloscan_core::SeoApi;
use haloscan_core::control::{BulkQuery, KeywordQuery};
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

/// Parameters for a single keyword lookup.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct KeywordParams {
    /// Keyword to look up.
    pub keyword: String,
    /// Two-letter language code, `fr` when omitted.
    pub lang: Option<String>,
    /// Rows to request from list endpoints (1-200, default 20).
    #[serde(alias = "lineCount")]
    pub line_count: Option<u32>,
    /// Result page for list endpoints, starting at 1.
    pub page: Option<u32>,
}

impl From<KeywordParams> for KeywordQuery {
    fn from(params: KeywordParams) -> Self {
        Self {
            keyword: params.keyword,
            lang: params.lang,
            line_count: params.line_count,
            page: params.page,
        }
    }
}

/// Parameters for one bulk keyword call.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct KeywordsBulkParams {
    /// Keywords to analyze together (1-100).
    pub keywords: Vec<String>,
    /// Data sections to return, `["metrics"]` when omitted.
    #[serde(alias = "requestedData")]
    pub requested_data: Option<Vec<String>>,
}

impl From<KeywordsBulkParams> for BulkQuery {
    fn from(params: KeywordsBulkParams) -> Self {
        Self {
            items: params.keywords,
            requested_data: params.requested_data,
        }
    }
}

#[tool_router(router = tool_router_keywords, vis = "pub")]
impl<A: SeoApi> HaloscanMcp<A> {
    #[tool(description = "Keyword overview: search volume, CPC, competition and SERP summary for one keyword.")]
    async fn analyze_keyword(
        &self,
        Parameters(params): Parameters<KeywordParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let overview = self
            .control()
            .keyword_overview(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(overview)?]))
    }

    #[tool(description = "Keywords containing the given keyword (exact match expansions).")]
    async fn find_keyword_matches(
        &self,
        Parameters(params): Parameters<KeywordParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let matches = self
            .control()
            .keyword_matches(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(matches)?]))
    }

    #[tool(description = "Semantically similar keywords for the given keyword.")]
    async fn find_similar_keywords(
        &self,
        Parameters(params): Parameters<KeywordParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let similar = self
            .control()
            .similar_keywords(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(similar)?]))
    }

    #[tool(description = "Questions people search for around the given keyword.")]
    async fn get_keyword_questions(
        &self,
        Parameters(params): Parameters<KeywordParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let questions = self
            .control()
            .keyword_questions(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(questions)?]))
    }

    #[tool(description = "Metrics for up to 100 keywords in a single upstream call.")]
    async fn analyze_keywords_bulk(
        &self,
        Parameters(params): Parameters<KeywordsBulkParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let bulk = self
            .control()
            .keywords_bulk(&params.into())
            .await
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(bulk)?]))
    }
}
