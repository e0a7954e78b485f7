use std::{error::Error, fmt, sync::Arc};

use haloscan_model::{AnalysisReport, InvalidTargetError};

use crate::client::{ClientError, SeoApi};
use crate::validate::ValidationError;

pub mod analysis;
pub mod execute;
pub mod lookup;
pub mod plan;
pub mod synthesize;

pub use analysis::AnalysisRequest;
pub use execute::{ExecuteError, ProgressFn, SequentialExecutor, StepProgress, noop_progress};
pub use lookup::{
    BulkQuery, DomainQuery, HealthReport, KeywordQuery, PositionQuery, PositionReport,
    UpstreamStatus,
};
pub use plan::{AnalysisPlan, ChunkPlanner, PlanPolicy, PolicyError};
pub use synthesize::{SynthesisOutput, Synthesizer, estimate_tokens};

pub const DEFAULT_OUTPUT_BUDGET: usize = 4000;

#[derive(Debug)]
pub enum ControlError {
    InvalidTarget(InvalidTargetError),
    Validation(ValidationError),
    Client(ClientError),
    /// Every planned step failed; the report still carries the notices.
    AllStepsFailed(Box<AnalysisReport>),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget(err) => write!(f, "invalid target: {err}"),
            Self::Validation(err) => write!(f, "invalid request: {err}"),
            Self::Client(err) => write!(f, "{err}"),
            Self::AllStepsFailed(report) => write!(
                f,
                "all {} analysis steps failed for {}",
                report.results.len(),
                report.target
            ),
        }
    }
}

impl Error for ControlError {}

impl From<InvalidTargetError> for ControlError {
    fn from(err: InvalidTargetError) -> Self {
        Self::InvalidTarget(err)
    }
}

impl From<ValidationError> for ControlError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<ClientError> for ControlError {
    fn from(err: ClientError) -> Self {
        Self::Client(err)
    }
}

/// Runtime knobs of the control plane.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub policy: PlanPolicy,
    pub default_output_budget: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            policy: PlanPolicy::default(),
            default_output_budget: DEFAULT_OUTPUT_BUDGET,
        }
    }
}

/// Entry point shared by the MCP and HTTP adapters.
pub struct AnalysisControlPlane<A: SeoApi> {
    api: Arc<A>,
    planner: ChunkPlanner,
    synthesizer: Synthesizer,
    default_output_budget: usize,
}

impl<A: SeoApi> Clone for AnalysisControlPlane<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            planner: self.planner.clone(),
            synthesizer: self.synthesizer,
            default_output_budget: self.default_output_budget,
        }
    }
}

impl<A: SeoApi> AnalysisControlPlane<A> {
    pub fn new(api: A, config: ControlConfig) -> Self {
        Self::from_arc(Arc::new(api), config)
    }

    pub fn from_arc(api: Arc<A>, config: ControlConfig) -> Self {
        Self {
            api,
            planner: ChunkPlanner::new(config.policy),
            synthesizer: Synthesizer::default(),
            default_output_budget: config.default_output_budget,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub const fn default_output_budget(&self) -> usize {
        self.default_output_budget
    }
}
