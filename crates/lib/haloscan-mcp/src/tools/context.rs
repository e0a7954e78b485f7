use haloscan_core::SeoApi;
use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::HaloscanMcp;

/// Payload listing the MCP commands this server offers.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        let commands = [
            "help - List the MCP commands of this server.",
            "health - Returns ok when the server is up.",
            "get_user_credits - Remaining Haloscan API credits.",
            "analyze_keyword - Volume, CPC and competition of one keyword.",
            "find_keyword_matches - Keywords containing the given keyword.",
            "find_similar_keywords - Semantically related keywords.",
            "get_keyword_questions - Questions searched around a keyword.",
            "analyze_keywords_bulk - Metrics for up to 100 keywords in one call.",
            "analyze_domain - Traffic and visibility overview of a domain.",
            "find_domain_competitors - Organic competitors of a domain.",
            "get_domain_top_pages - Best performing pages of a domain.",
            "search_keywords_by_position - Top keywords of a domain within a rank range.",
            "analyze_domains_bulk - Compare up to 50 domains in one call.",
            "plan_analysis - Steps a chunked analysis would run, without calling the API.",
            "run_chunked_analysis - Full domain or keyword analysis as one bounded report.",
        ];
        Self {
            commands: commands.iter().map(ToString::to_string).collect(),
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl<A: SeoApi> HaloscanMcp<A> {
    #[tool(description = "List the MCP commands to get context with how this MCP server works.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
