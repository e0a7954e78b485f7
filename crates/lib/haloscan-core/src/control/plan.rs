use std::{error::Error, fmt, time::Duration};

use haloscan_model::schema::{
    DEFAULT_LANG, ENDPOINT_DOMAINS_COMPETITORS, ENDPOINT_DOMAINS_OVERVIEW,
    ENDPOINT_DOMAINS_POSITIONS, ENDPOINT_KEYWORDS_MATCH, ENDPOINT_KEYWORDS_OVERVIEW,
    ENDPOINT_KEYWORDS_QUESTIONS, ENDPOINT_KEYWORDS_SIMILAR, UPSTREAM_MAX_LINE_COUNT,
};
use haloscan_model::{
    AnalysisMode, AnalysisTarget, ChunkStep, InvalidTargetError, RankRange, StepKind,
};
use serde::Serialize;

use crate::client::Payload;
use crate::params;

pub const DEFAULT_LINE_COUNT: u32 = 100;
pub const DEFAULT_COMPETITOR_LINE_COUNT: u32 = 20;

const OVERVIEW_DURATION: Duration = Duration::from_secs(2);
const LIST_DURATION: Duration = Duration::from_secs(3);
const RANKS_DURATION: Duration = Duration::from_secs(4);

#[must_use]
pub fn default_tranches() -> Vec<RankRange> {
    vec![
        RankRange::new(1, 10),
        RankRange::new(11, 20),
        RankRange::new(21, 50),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    NoTranches,
    InvalidTranche(RankRange),
    LineCount(u32),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTranches => f.write_str("at least one rank tranche is required"),
            Self::InvalidTranche(range) => write!(f, "invalid rank tranche {range}"),
            Self::LineCount(value) => write!(
                f,
                "line count {value} is outside 1..={UPSTREAM_MAX_LINE_COUNT}"
            ),
        }
    }
}

impl Error for PolicyError {}

/// Tunable parameters of the step template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPolicy {
    tranches: Vec<RankRange>,
    line_count: u32,
    competitor_line_count: u32,
    lang: String,
}

impl PlanPolicy {
    /// # Errors
    /// Returns `PolicyError` if there are no tranches, a tranche is inverted or
    /// starts at zero, or the line count is outside the upstream bounds.
    pub fn new(
        tranches: Vec<RankRange>,
        line_count: u32,
        lang: impl Into<String>,
    ) -> Result<Self, PolicyError> {
        if tranches.is_empty() {
            return Err(PolicyError::NoTranches);
        }
        if let Some(bad) = tranches.iter().find(|range| !range.is_valid()) {
            return Err(PolicyError::InvalidTranche(*bad));
        }
        if line_count == 0 || line_count > UPSTREAM_MAX_LINE_COUNT {
            return Err(PolicyError::LineCount(line_count));
        }
        Ok(Self {
            tranches,
            line_count,
            competitor_line_count: DEFAULT_COMPETITOR_LINE_COUNT,
            lang: lang.into(),
        })
    }

    #[must_use]
    pub fn with_competitor_line_count(mut self, line_count: u32) -> Self {
        self.competitor_line_count = line_count.clamp(1, UPSTREAM_MAX_LINE_COUNT);
        self
    }

    #[must_use]
    pub fn tranches(&self) -> &[RankRange] {
        &self.tranches
    }

    #[must_use]
    pub const fn line_count(&self) -> u32 {
        self.line_count
    }

    #[must_use]
    pub const fn competitor_line_count(&self) -> u32 {
        self.competitor_line_count
    }

    #[must_use]
    pub fn lang(&self) -> &str {
        &self.lang
    }
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            tranches: default_tranches(),
            line_count: DEFAULT_LINE_COUNT,
            competitor_line_count: DEFAULT_COMPETITOR_LINE_COUNT,
            lang: DEFAULT_LANG.to_string(),
        }
    }
}

/// Validated target plus the ordered steps to run for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisPlan {
    pub target: AnalysisTarget,
    pub steps: Vec<ChunkStep>,
}

/// Expands a target into its fixed list of upstream sub-queries.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlanner {
    policy: PlanPolicy,
}

impl ChunkPlanner {
    #[must_use]
    pub const fn new(policy: PlanPolicy) -> Self {
        Self { policy }
    }

    /// Validates `raw` for `mode` and builds its plan.
    ///
    /// # Errors
    /// Returns `InvalidTargetError` when the target is empty or malformed.
    pub fn plan(&self, raw: &str, mode: AnalysisMode) -> Result<AnalysisPlan, InvalidTargetError> {
        let target = AnalysisTarget::parse(raw, mode)?;
        let steps = self.steps_for(&target);
        Ok(AnalysisPlan { target, steps })
    }

    /// Builds the step list for an already validated target. Pure.
    #[must_use]
    pub fn steps_for(&self, target: &AnalysisTarget) -> Vec<ChunkStep> {
        let mut builder = StepBuilder::default();
        let value = target.value();
        let lang = self.policy.lang.as_str();
        let lines = self.policy.line_count;

        match target.mode() {
            AnalysisMode::Domain => {
                builder.push(
                    "domain overview",
                    ENDPOINT_DOMAINS_OVERVIEW,
                    StepKind::DomainOverview,
                    params::domain_overview(value, lang),
                    OVERVIEW_DURATION,
                );
                builder.push(
                    "competitors",
                    ENDPOINT_DOMAINS_COMPETITORS,
                    StepKind::Competitors,
                    params::competitors(value, self.policy.competitor_line_count),
                    LIST_DURATION,
                );
                for range in &self.policy.tranches {
                    builder.push(
                        &format!("keywords rank {range}"),
                        ENDPOINT_DOMAINS_POSITIONS,
                        StepKind::KeywordRanks { range: *range },
                        params::positions(value, *range, lines, 1),
                        RANKS_DURATION,
                    );
                }
            }
            AnalysisMode::Keyword => {
                builder.push(
                    "keyword overview",
                    ENDPOINT_KEYWORDS_OVERVIEW,
                    StepKind::KeywordOverview,
                    params::keyword_overview(value, lang),
                    OVERVIEW_DURATION,
                );
                builder.push(
                    "similar keywords",
                    ENDPOINT_KEYWORDS_SIMILAR,
                    StepKind::SimilarKeywords,
                    params::keyword_list(value, lines, 1, lang),
                    LIST_DURATION,
                );
                builder.push(
                    "matching keywords",
                    ENDPOINT_KEYWORDS_MATCH,
                    StepKind::MatchingKeywords,
                    params::keyword_list(value, lines, 1, lang),
                    LIST_DURATION,
                );
                builder.push(
                    "questions",
                    ENDPOINT_KEYWORDS_QUESTIONS,
                    StepKind::Questions,
                    params::questions(value, lines, lang),
                    LIST_DURATION,
                );
            }
        }

        builder.steps
    }
}

#[derive(Default)]
struct StepBuilder {
    steps: Vec<ChunkStep>,
}

impl StepBuilder {
    fn push(
        &mut self,
        name: &str,
        endpoint: &str,
        kind: StepKind,
        params: Payload,
        expected_duration: Duration,
    ) {
        let page = params
            .get("page")
            .and_then(serde_json::Value::as_u64)
            .and_then(|page| u32::try_from(page).ok());
        let line_count = params
            .get("lineCount")
            .and_then(serde_json::Value::as_u64)
            .and_then(|count| u32::try_from(count).ok());
        self.steps.push(ChunkStep {
            index: self.steps.len(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            kind,
            params,
            page,
            line_count,
            expected_duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_plan_follows_the_template() {
        let plan = ChunkPlanner::default()
            .plan("https://www.Example.com/", AnalysisMode::Domain)
            .expect("plan");
        assert_eq!(plan.target.value(), "example.com");

        let names: Vec<_> = plan.steps.iter().map(|step| step.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "domain overview",
                "competitors",
                "keywords rank 1-10",
                "keywords rank 11-20",
                "keywords rank 21-50"
            ]
        );
        for (index, step) in plan.steps.iter().enumerate() {
            assert_eq!(step.index, index);
        }
        let tranche = &plan.steps[3];
        assert_eq!(tranche.endpoint, ENDPOINT_DOMAINS_POSITIONS);
        assert_eq!(tranche.params["position_min"], 11);
        assert_eq!(tranche.params["position_max"], 20);
        assert_eq!(tranche.line_count, Some(DEFAULT_LINE_COUNT));
        assert_eq!(tranche.page, Some(1));
        assert_eq!(plan.steps[0].params["domain"], "example.com");
    }

    #[test]
    fn keyword_plan_has_four_steps() {
        let plan = ChunkPlanner::default()
            .plan("chaussures running", AnalysisMode::Keyword)
            .expect("plan");
        let endpoints: Vec<_> = plan.steps.iter().map(|step| step.endpoint.as_str()).collect();
        assert_eq!(
            endpoints,
            [
                ENDPOINT_KEYWORDS_OVERVIEW,
                ENDPOINT_KEYWORDS_SIMILAR,
                ENDPOINT_KEYWORDS_MATCH,
                ENDPOINT_KEYWORDS_QUESTIONS
            ]
        );
        assert_eq!(plan.steps[1].params["keyword"], "chaussures running");
        assert_eq!(plan.steps[0].line_count, None);
    }

    #[test]
    fn planning_is_deterministic() {
        let planner = ChunkPlanner::default();
        let first = planner.plan("example.com", AnalysisMode::Domain).expect("plan");
        let second = planner.plan("example.com", AnalysisMode::Domain).expect("plan");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_target_is_rejected() {
        let err = ChunkPlanner::default()
            .plan("  ", AnalysisMode::Domain)
            .expect_err("empty target");
        assert_eq!(err, InvalidTargetError::Empty);
    }

    #[test]
    fn policy_rejects_bad_tranches_and_line_counts() {
        assert_eq!(PlanPolicy::new(Vec::new(), 100, "fr"), Err(PolicyError::NoTranches));
        assert_eq!(
            PlanPolicy::new(vec![RankRange::new(20, 11)], 100, "fr"),
            Err(PolicyError::InvalidTranche(RankRange::new(20, 11)))
        );
        assert_eq!(
            PlanPolicy::new(default_tranches(), 201, "fr"),
            Err(PolicyError::LineCount(201))
        );

        let policy = PlanPolicy::new(vec![RankRange::new(1, 3)], 10, "en").expect("policy");
        let plan = ChunkPlanner::new(policy)
            .plan("example.com", AnalysisMode::Domain)
            .expect("plan");
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0].params["lang"], "en");
    }

    #[test]
    fn competitor_step_uses_the_policy_line_count() {
        let policy = PlanPolicy::default().with_competitor_line_count(50);
        let plan = ChunkPlanner::new(policy)
            .plan("example.com", AnalysisMode::Domain)
            .expect("plan");
        assert_eq!(plan.steps[1].params["lineCount"], 50);

        let clamped = PlanPolicy::default().with_competitor_line_count(0);
        assert_eq!(clamped.competitor_line_count(), 1);
    }
}
