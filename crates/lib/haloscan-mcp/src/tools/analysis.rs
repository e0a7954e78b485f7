use std::sync::Arc;

use futures::FutureExt;
use haloscan_core::control::{AnalysisRequest, ProgressFn, StepProgress, noop_progress};
use haloscan_core::{ControlError, SeoApi};
use haloscan_model::AnalysisMode;
use rmcp::{
    ErrorData,
    Peer,
    RoleServer,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ErrorCode, ProgressNotificationParam, ProgressToken},
    schemars,
    service::RequestContext,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{HaloscanMcp, helpers};

/// Parameters for planning or running a chunked analysis.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AnalysisParams {
    /// Domain (e.g. `example.com`) or keyword to analyze.
    pub target: String,
    /// `domain` (default) or `keyword`.
    pub mode: Option<String>,
    /// Token budget of the report text (default 4000).
    pub output_budget: Option<usize>,
}

impl AnalysisParams {
    fn into_request(self) -> Result<AnalysisRequest, ErrorData> {
        let mode = match self.mode.as_deref() {
            Some(raw) => raw
                .parse::<AnalysisMode>()
                .map_err(|err| helpers::mcp_err(ErrorCode::INVALID_PARAMS, err.to_string()))?,
            None => AnalysisMode::default(),
        };
        Ok(AnalysisRequest {
            target: self.target,
            mode,
            output_budget: self.output_budget,
        })
    }
}

#[tool_router(router = tool_router_analysis, vis = "pub")]
impl<A: SeoApi> HaloscanMcp<A> {
    #[tool(description = "Dry run: list the upstream steps a chunked analysis would issue, without calling the API.")]
    async fn plan_analysis(
        &self,
        Parameters(params): Parameters<AnalysisParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = params.into_request()?;
        let plan = self
            .control()
            .plan(&request)
            .map_err(|err| helpers::map_control_err(&err))?;
        Ok(CallToolResult::success(vec![Content::json(plan)?]))
    }

    #[tool(description = "Run a full SEO analysis of a domain or keyword as small sequential upstream calls. Sends one progress notification per step and returns a compact report bounded by output_budget tokens, followed by a JSON summary.")]
    async fn run_chunked_analysis(
        &self,
        context: RequestContext<RoleServer>,
        Parameters(params): Parameters<AnalysisParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = params.into_request()?;
        let progress = match context.meta.get_progress_token() {
            Some(token) => progress_notifier(context.peer.clone(), token),
            None => noop_progress(),
        };

        match self.control().analyze(request, &progress, &context.ct).await {
            Ok(report) => Ok(CallToolResult::success(vec![
                Content::text(report.text.clone()),
                Content::json(report.summary())?,
            ])),
            Err(ControlError::AllStepsFailed(report)) => Ok(CallToolResult::error(vec![
                Content::text(report.text.clone()),
                Content::json(report.summary())?,
            ])),
            Err(err) => Err(helpers::map_control_err(&err)),
        }
    }
}

/// Forwards executor progress as MCP progress notifications.
fn progress_notifier(peer: Peer<RoleServer>, token: ProgressToken) -> ProgressFn {
    Arc::new(move |progress: StepProgress| {
        let peer = peer.clone();
        let params = ProgressNotificationParam {
            progress_token: token.clone(),
            progress: as_f64(progress.index + 1),
            total: Some(as_f64(progress.total)),
            message: Some(progress_message(&progress)),
        };
        async move {
            if let Err(err) = peer.notify_progress(params).await {
                debug!(error = %err, "progress notification not delivered");
            }
        }
        .boxed()
    })
}

fn progress_message(progress: &StepProgress) -> String {
    let outcome = if progress.result.success {
        "done".to_string()
    } else {
        format!(
            "failed: {}",
            progress.result.error.as_deref().unwrap_or("unknown error")
        )
    };
    format!(
        "step {}/{} {} {outcome}",
        progress.index + 1,
        progress.total,
        progress.result.name
    )
}

fn as_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
