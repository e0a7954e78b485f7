use std::sync::Arc;

use chrono::Utc;
use haloscan_model::{AnalysisMode, AnalysisReport, ReportStatus, RunPhase};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::SeoApi;
use crate::validate;

use super::execute::{ExecuteError, ProgressFn, SequentialExecutor, StepProgress};
use super::plan::AnalysisPlan;
use super::{AnalysisControlPlane, ControlError};

/// Input payload for planning or running a chunked analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub target: String,
    #[serde(default)]
    pub mode: AnalysisMode,
    /// Token budget for the report text; the control plane default when absent.
    #[serde(default)]
    pub output_budget: Option<usize>,
}

impl AnalysisRequest {
    pub fn new(target: impl Into<String>, mode: AnalysisMode) -> Self {
        Self {
            target: target.into(),
            mode,
            output_budget: None,
        }
    }

    #[must_use]
    pub const fn with_output_budget(mut self, budget: usize) -> Self {
        self.output_budget = Some(budget);
        self
    }
}

impl<A: SeoApi> AnalysisControlPlane<A> {
    /// Validates the target and returns the steps a run would issue.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidTarget` if the target is empty or malformed.
    pub fn plan(&self, request: &AnalysisRequest) -> Result<AnalysisPlan, ControlError> {
        Ok(self.planner.plan(&request.target, request.mode)?)
    }

    /// Plans, executes and synthesizes one chunked analysis.
    ///
    /// `on_progress` is awaited after every step. Cancelling `cancel` stops
    /// the run before the next step and yields a `cancelled` report.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidTarget` or `ControlError::Validation`
    /// before any upstream call, and `ControlError::AllStepsFailed` with the
    /// synthesized report when no step succeeded.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<AnalysisReport, ControlError> {
        let run_id = Uuid::new_v4();
        let budget =
            validate::output_budget(request.output_budget.unwrap_or(self.default_output_budget))?;

        let plan = match self.plan(&request) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(%run_id, phase = %RunPhase::Failed, error = %err, "analysis planning failed");
                return Err(err);
            }
        };
        info!(
            %run_id,
            target = %plan.target,
            mode = %plan.target.mode(),
            steps = plan.steps.len(),
            budget,
            phase = %RunPhase::Planned,
            "analysis started"
        );

        let started_at = Utc::now();
        let started = Instant::now();
        let progress = phase_logging(run_id, on_progress);
        let executor = SequentialExecutor::new(Arc::clone(&self.api));
        let (results, all_failed) = match executor.run(&plan.steps, &progress, cancel).await {
            Ok(results) => (results, false),
            Err(ExecuteError::AllStepsFailed { results }) => (results, true),
        };

        debug!(%run_id, phase = %RunPhase::Synthesizing, results = results.len(), "synthesizing report");
        let output = self.synthesizer.synthesize(&plan.target, &results, budget);
        let report = AnalysisReport {
            run_id,
            status: ReportStatus::from_results(plan.steps.len(), &results),
            target: plan.target,
            started_at,
            results,
            text: output.text,
            estimated_tokens: output.estimated_tokens,
            output_budget: budget,
            rows_kept: output.rows_kept,
            rows_dropped: output.rows_dropped,
            total_elapsed: started.elapsed(),
        };

        if all_failed {
            warn!(%run_id, phase = %RunPhase::Failed, "every analysis step failed");
            return Err(ControlError::AllStepsFailed(Box::new(report)));
        }
        info!(
            %run_id,
            phase = %RunPhase::Complete,
            status = report.status.as_str(),
            tokens = report.estimated_tokens,
            rows = report.rows_kept,
            elapsed_ms = haloscan_model::duration_ms::as_millis(report.total_elapsed),
            "analysis finished"
        );
        Ok(report)
    }
}

fn phase_logging(run_id: Uuid, inner: &ProgressFn) -> ProgressFn {
    let inner = Arc::clone(inner);
    Arc::new(move |progress: StepProgress| {
        let phase = RunPhase::Executing {
            step: progress.index + 1,
            total: progress.total,
        };
        debug!(
            %run_id,
            %phase,
            success = progress.result.success,
            "step finished"
        );
        inner(progress)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlConfig;
    use crate::control::execute::noop_progress;
    use crate::testing::{ScriptedApi, keyword_payload, overview_payload};

    #[test]
    fn request_mode_defaults_to_domain() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"target": "example.com"}"#).expect("request");
        assert_eq!(request.mode, AnalysisMode::Domain);
        assert_eq!(request.output_budget, None);
    }

    #[tokio::test]
    async fn zero_budget_is_rejected_before_any_call() {
        let control = AnalysisControlPlane::new(ScriptedApi::default(), ControlConfig::default());
        let request = AnalysisRequest::new("example.com", AnalysisMode::Domain).with_output_budget(0);
        let err = control
            .analyze(request, &noop_progress(), &CancellationToken::new())
            .await
            .expect_err("zero budget");
        assert!(matches!(err, ControlError::Validation(_)));
        assert!(control.api().calls().is_empty());
    }

    #[tokio::test]
    async fn keyword_run_uses_the_default_budget() {
        let api = ScriptedApi::new(vec![
            Ok(overview_payload()),
            Ok(keyword_payload(&["running shoes", "trail shoes"])),
            Ok(keyword_payload(&["running shoes sale"])),
            Ok(keyword_payload(&["what are running shoes"])),
        ]);
        let control = AnalysisControlPlane::new(api, ControlConfig::default());
        let report = control
            .analyze(
                AnalysisRequest::new("running shoes", AnalysisMode::Keyword),
                &noop_progress(),
                &CancellationToken::new(),
            )
            .await
            .expect("report");
        assert_eq!(report.status, ReportStatus::Complete);
        assert_eq!(report.output_budget, crate::control::DEFAULT_OUTPUT_BUDGET);
        assert_eq!(report.rows_kept, 4);
        assert!(report.text.contains("(keyword)"));
    }
}
