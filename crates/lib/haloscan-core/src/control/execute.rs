use std::{error::Error, fmt, sync::Arc};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use haloscan_model::{ChunkStep, StepResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::SeoApi;

/// Delivered after each step finishes, successful or not.
#[derive(Debug, Clone)]
pub struct StepProgress {
    pub index: usize,
    pub total: usize,
    pub result: StepResult,
}

/// Async progress sink. The executor awaits it before issuing the next step.
pub type ProgressFn = Arc<dyn Fn(StepProgress) -> BoxFuture<'static, ()> + Send + Sync>;

#[must_use]
pub fn noop_progress() -> ProgressFn {
    Arc::new(|_: StepProgress| future::ready(()).boxed())
}

#[derive(Debug)]
pub enum ExecuteError {
    AllStepsFailed { results: Vec<StepResult> },
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllStepsFailed { results } => {
                write!(f, "all {} analysis steps failed", results.len())
            }
        }
    }
}

impl Error for ExecuteError {}

/// Runs planned steps one at a time against the upstream API.
pub struct SequentialExecutor<A: SeoApi> {
    api: Arc<A>,
}

impl<A: SeoApi> Clone for SequentialExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: SeoApi> SequentialExecutor<A> {
    pub const fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Executes `steps` in order, absorbing per-step failures into results.
    ///
    /// Cancellation is checked before each step; the step in flight always
    /// completes. A cancelled run returns the results gathered so far.
    ///
    /// # Errors
    /// Returns `ExecuteError::AllStepsFailed` when every step of a non-empty
    /// plan ran and failed.
    pub async fn run(
        &self,
        steps: &[ChunkStep],
        on_progress: &ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<Vec<StepResult>, ExecuteError> {
        let total = steps.len();
        let mut results = Vec::with_capacity(total);

        for (index, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(completed = results.len(), total, "analysis cancelled");
                break;
            }

            debug!(step = step.index, name = %step.name, endpoint = %step.endpoint, "running step");
            let started = Instant::now();
            let outcome = self.api.call(&step.endpoint, Some(&step.params)).await;
            let elapsed = started.elapsed();

            let result = match outcome {
                Ok(payload) => StepResult::succeeded(step, payload, elapsed),
                Err(err) => {
                    warn!(step = step.index, name = %step.name, error = %err, "step failed");
                    StepResult::failed(step, err.step_error_kind(), err.to_string(), elapsed)
                }
            };

            on_progress(StepProgress {
                index,
                total,
                result: result.clone(),
            })
            .await;
            results.push(result);
        }

        if total > 0 && results.len() == total && results.iter().all(|result| !result.success) {
            return Err(ExecuteError::AllStepsFailed { results });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use haloscan_model::{AnalysisMode, StepErrorKind};

    use super::*;
    use crate::client::ClientError;
    use crate::control::plan::ChunkPlanner;
    use crate::testing::{ScriptedApi, keyword_payload};

    fn domain_steps() -> Vec<ChunkStep> {
        ChunkPlanner::default()
            .plan("example.com", AnalysisMode::Domain)
            .expect("plan")
            .steps
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_run() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(keyword_payload(&["a"])),
            Err(ClientError::Upstream {
                status: 500,
                message: "boom".to_string(),
            }),
            Err(ClientError::Timeout(Duration::from_secs(30))),
            Ok(keyword_payload(&["b"])),
            Ok(keyword_payload(&["c"])),
        ]));
        let executor = SequentialExecutor::new(Arc::clone(&api));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |progress: StepProgress| {
            sink.lock()
                .expect("progress lock")
                .push((progress.index, progress.total, progress.result.success));
            future::ready(()).boxed()
        });

        let results = executor
            .run(&domain_steps(), &progress, &CancellationToken::new())
            .await
            .expect("partial run is ok");

        assert_eq!(results.len(), 5);
        let indexes: Vec<_> = results.iter().map(|result| result.index).collect();
        assert_eq!(indexes, [0, 1, 2, 3, 4]);
        assert_eq!(results[1].error_kind, Some(StepErrorKind::Upstream));
        assert_eq!(results[2].error_kind, Some(StepErrorKind::Timeout));
        assert_eq!(
            *seen.lock().expect("progress lock"),
            [(0, 5, true), (1, 5, false), (2, 5, false), (3, 5, true), (4, 5, true)]
        );
        assert_eq!(api.calls().len(), 5);
    }

    #[tokio::test]
    async fn all_failures_are_an_error_carrying_results() {
        let api = Arc::new(ScriptedApi::new(Vec::new()));
        let err = SequentialExecutor::new(api)
            .run(&domain_steps(), &noop_progress(), &CancellationToken::new())
            .await
            .expect_err("every step fails");
        let ExecuteError::AllStepsFailed { results } = err;
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn empty_plan_is_not_a_failure() {
        let api = Arc::new(ScriptedApi::new(Vec::new()));
        let results = SequentialExecutor::new(api)
            .run(&[], &noop_progress(), &CancellationToken::new())
            .await
            .expect("empty plan");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_after_the_in_flight_step() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(keyword_payload(&["a"])),
            Ok(keyword_payload(&["b"])),
            Ok(keyword_payload(&["c"])),
        ]));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let progress: ProgressFn = Arc::new(move |progress: StepProgress| {
            if progress.index == 1 {
                trigger.cancel();
            }
            future::ready(()).boxed()
        });

        let results = SequentialExecutor::new(Arc::clone(&api))
            .run(&domain_steps(), &progress, &cancel)
            .await
            .expect("cancelled run");
        assert_eq!(results.len(), 2);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn progress_positions_follow_the_slice_not_the_plan() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(keyword_payload(&["a"])),
            Ok(keyword_payload(&["b"])),
            Ok(keyword_payload(&["c"])),
        ]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Arc::new(move |progress: StepProgress| {
            sink.lock()
                .expect("progress lock")
                .push((progress.index, progress.total, progress.result.index));
            future::ready(()).boxed()
        });

        let steps = domain_steps();
        SequentialExecutor::new(api)
            .run(&steps[2..], &progress, &CancellationToken::new())
            .await
            .expect("tranche steps");

        assert_eq!(
            *seen.lock().expect("progress lock"),
            [(0, 3, 2), (1, 3, 3), (2, 3, 4)]
        );
    }
}
