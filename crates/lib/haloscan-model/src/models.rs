use std::{error::Error, fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::target::AnalysisTarget;

/// Kind of analysis a run performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Domain,
    Keyword,
}

impl AnalysisMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModeError(pub String);

impl fmt::Display for UnknownModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown analysis mode: {} (expected domain or keyword)", self.0)
    }
}

impl Error for UnknownModeError {}

impl FromStr for AnalysisMode {
    type Err = UnknownModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "domain" => Ok(Self::Domain),
            "keyword" => Ok(Self::Keyword),
            other => Err(UnknownModeError(other.to_string())),
        }
    }
}

/// Inclusive range of SERP ranks queried as one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankRange {
    pub min: u32,
    pub max: u32,
}

impl RankRange {
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.min >= 1 && self.min <= self.max
    }
}

impl fmt::Display for RankRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRankRange(pub String);

impl fmt::Display for InvalidRankRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid rank range: {} (expected MIN-MAX with 1 <= MIN <= MAX)", self.0)
    }
}

impl Error for InvalidRankRange {}

impl FromStr for RankRange {
    type Err = InvalidRankRange;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRankRange(value.to_string());
        let (min, max) = value.trim().split_once('-').ok_or_else(invalid)?;
        let min = min.trim().parse().map_err(|_| invalid())?;
        let max = max.trim().parse().map_err(|_| invalid())?;
        let range = Self::new(min, max);
        if range.is_valid() {
            Ok(range)
        } else {
            Err(invalid())
        }
    }
}

/// Entity type a synthesized table row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Competitor,
    Keyword,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Competitor => "competitor",
            Self::Keyword => "keyword",
        }
    }
}

/// What a planned step fetches. Drives row extraction during synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    DomainOverview,
    Competitors,
    KeywordRanks { range: RankRange },
    KeywordOverview,
    SimilarKeywords,
    MatchingKeywords,
    Questions,
}

impl StepKind {
    #[must_use]
    pub const fn is_overview(self) -> bool {
        matches!(self, Self::DomainOverview | Self::KeywordOverview)
    }

    /// Entity kind of the rows this step contributes, if it yields a list.
    #[must_use]
    pub const fn row_kind(self) -> Option<EntityKind> {
        match self {
            Self::DomainOverview | Self::KeywordOverview => None,
            Self::Competitors => Some(EntityKind::Competitor),
            Self::KeywordRanks { .. }
            | Self::SimilarKeywords
            | Self::MatchingKeywords
            | Self::Questions => Some(EntityKind::Keyword),
        }
    }
}

/// One planned upstream sub-query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStep {
    pub index: usize,
    pub name: String,
    pub endpoint: String,
    #[serde(flatten)]
    pub kind: StepKind,
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u32>,
    #[serde(rename = "expected_duration_ms", with = "duration_ms")]
    pub expected_duration: Duration,
}

/// Classification of a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    Upstream,
    Timeout,
    Transport,
}

/// Outcome of executing one `ChunkStep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub name: String,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StepErrorKind>,
}

impl StepResult {
    #[must_use]
    pub fn succeeded(step: &ChunkStep, payload: Map<String, Value>, elapsed: Duration) -> Self {
        Self {
            index: step.index,
            name: step.name.clone(),
            kind: step.kind,
            payload: Some(payload),
            elapsed,
            success: true,
            error: None,
            error_kind: None,
        }
    }

    #[must_use]
    pub fn failed(
        step: &ChunkStep,
        error_kind: StepErrorKind,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            index: step.index,
            name: step.name.clone(),
            kind: step.kind,
            payload: None,
            elapsed,
            success: false,
            error: Some(message.into()),
            error_kind: Some(error_kind),
        }
    }
}

/// Overall outcome of a chunked analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Partial,
    Failed,
    Cancelled,
}

impl ReportStatus {
    /// Derives the status from the planned step count and collected results.
    #[must_use]
    pub fn from_results(planned: usize, results: &[StepResult]) -> Self {
        let succeeded = results.iter().filter(|result| result.success).count();
        if results.len() < planned {
            Self::Cancelled
        } else if succeeded == results.len() {
            Self::Complete
        } else if succeeded == 0 {
            Self::Failed
        } else {
            Self::Partial
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Lifecycle of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Planned,
    Executing { step: usize, total: usize },
    Synthesizing,
    Complete,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planned => f.write_str("planned"),
            Self::Executing { step, total } => write!(f, "executing step {step} of {total}"),
            Self::Synthesizing => f.write_str("synthesizing"),
            Self::Complete => f.write_str("complete"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Final synthesized output of a chunked analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub target: AnalysisTarget,
    pub started_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub results: Vec<StepResult>,
    pub text: String,
    pub estimated_tokens: usize,
    pub output_budget: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    #[serde(rename = "total_elapsed_ms", with = "duration_ms")]
    pub total_elapsed: Duration,
}

impl AnalysisReport {
    /// Returns the report without raw step payloads.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            run_id: self.run_id,
            target: self.target.value().to_string(),
            mode: self.target.mode(),
            status: self.status,
            steps: self
                .results
                .iter()
                .map(|result| StepOutcome {
                    index: result.index,
                    name: result.name.clone(),
                    success: result.success,
                    elapsed_ms: duration_ms::as_millis(result.elapsed),
                    error: result.error.clone(),
                })
                .collect(),
            estimated_tokens: self.estimated_tokens,
            output_budget: self.output_budget,
            rows_kept: self.rows_kept,
            rows_dropped: self.rows_dropped,
            total_elapsed_ms: duration_ms::as_millis(self.total_elapsed),
        }
    }
}

/// Compact report view for tool responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub target: String,
    pub mode: AnalysisMode,
    pub status: ReportStatus,
    pub steps: Vec<StepOutcome>,
    pub estimated_tokens: usize,
    pub output_budget: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    pub total_elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepOutcome {
    pub index: usize,
    pub name: String,
    pub success: bool,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Normalized keyword row extracted from an upstream list payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KeywordRow {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub competition: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Normalized competitor row extracted from an upstream list payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CompetitorRow {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_keywords: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic: Option<f64>,
}

/// Serde helpers storing durations as integer milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[must_use]
    pub fn as_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// # Errors
    /// Returns any serializer error.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(as_millis(*duration))
    }

    /// # Errors
    /// Returns any deserializer error.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
