//! Bounded-size report synthesis.
//!
//! The report is assembled line by line against a character budget derived
//! from the token budget, so the estimate of the final text never exceeds it.

use std::collections::HashSet;

use haloscan_model::schema::make_entity_key;
use haloscan_model::{AnalysisTarget, CompetitorRow, EntityKind, KeywordRow, StepResult};

use crate::parsers::{competitor_rows, format_number, keyword_rows, overview_metrics};

pub const CHARS_PER_TOKEN: usize = 4;
pub const DEFAULT_MAX_METRICS: usize = 12;

const COMPETITOR_COLUMNS: &str = "domain | common_keywords | keywords | traffic";
const KEYWORD_COLUMNS: &str = "keyword | position | volume | traffic | cpc | competition | url";

/// Approximate LLM token count of `text`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutput {
    pub text: String,
    pub estimated_tokens: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    max_metrics: usize,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self {
            max_metrics: DEFAULT_MAX_METRICS,
        }
    }
}

impl Synthesizer {
    /// Merges step results into one report text of at most `budget` tokens.
    #[must_use]
    pub fn synthesize(
        &self,
        target: &AnalysisTarget,
        results: &[StepResult],
        budget: usize,
    ) -> SynthesisOutput {
        let mut out = BoundedText::new(budget.saturating_mul(CHARS_PER_TOKEN));
        let header = self.header_lines(target, results);
        let header_complete = out.push_prefix(&header);

        let rows = unique_rows(results);
        let unique = rows.len();
        let rows_kept = if header_complete { push_rows(&mut out, &rows) } else { 0 };
        let rows_dropped = unique - rows_kept;
        if rows_dropped > 0 && header_complete {
            let omitted = omitted_line(rows_dropped);
            if out.fits(&[omitted.as_str()]) {
                out.push(omitted);
            }
        }

        let text = out.lines.join("\n");
        SynthesisOutput {
            estimated_tokens: estimate_tokens(&text),
            text,
            rows_kept,
            rows_dropped,
        }
    }

    fn header_lines(&self, target: &AnalysisTarget, results: &[StepResult]) -> Vec<String> {
        let succeeded = results.iter().filter(|result| result.success).count();
        let mut lines = vec![
            format!("# SEO analysis: {target} ({})", target.mode()),
            format!("steps ok: {succeeded}/{}", results.len()),
        ];

        for result in results.iter().filter(|result| !result.success) {
            let reason = result.error.as_deref().unwrap_or("unknown error");
            lines.push(format!(
                "step {} unavailable: {}",
                result.name,
                single_line(reason)
            ));
        }

        let metrics: Vec<(String, String)> = results
            .iter()
            .filter(|result| result.success && result.kind.is_overview())
            .filter_map(|result| result.payload.as_ref())
            .flat_map(|payload| overview_metrics(payload, self.max_metrics))
            .take(self.max_metrics)
            .collect();
        if !metrics.is_empty() {
            lines.push("## overview".to_string());
            lines.extend(
                metrics
                    .into_iter()
                    .map(|(key, value)| format!("- {key}: {}", single_line(&value))),
            );
        }
        lines
    }
}

enum Row {
    Competitor(CompetitorRow),
    Keyword(KeywordRow),
}

impl Row {
    const fn kind(&self) -> EntityKind {
        match self {
            Self::Competitor(_) => EntityKind::Competitor,
            Self::Keyword(_) => EntityKind::Keyword,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Competitor(row) => [
                escape(&row.domain),
                count(row.common_keywords),
                count(row.keywords),
                number(row.traffic),
            ]
            .join(" | "),
            Self::Keyword(row) => [
                escape(&row.keyword),
                count(row.position.map(u64::from)),
                count(row.volume),
                number(row.traffic),
                number(row.cpc),
                number(row.competition),
                row.url.as_deref().map(escape).unwrap_or_default(),
            ]
            .join(" | "),
        }
    }
}

/// Competitor rows first, then keyword rows, each in step order; first occurrence wins.
fn unique_rows(results: &[StepResult]) -> Vec<Row> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for wanted in [EntityKind::Competitor, EntityKind::Keyword] {
        for result in results {
            let Some(payload) = result.payload.as_ref().filter(|_| result.success) else {
                continue;
            };
            if result.kind.row_kind() != Some(wanted) {
                continue;
            }
            let extracted: Vec<(String, Row)> = match wanted {
                EntityKind::Competitor => competitor_rows(payload)
                    .into_iter()
                    .map(|row| (row.domain.clone(), Row::Competitor(row)))
                    .collect(),
                EntityKind::Keyword => keyword_rows(payload)
                    .into_iter()
                    .map(|row| (row.keyword.clone(), Row::Keyword(row)))
                    .collect(),
            };
            for (key, row) in extracted {
                if seen.insert(make_entity_key(wanted.as_str(), &key)) {
                    rows.push(row);
                }
            }
        }
    }
    rows
}

/// Adds rows greedily in order, keeping room for the omitted-rows line while
/// rows remain. Returns the number of rows added.
fn push_rows(out: &mut BoundedText, rows: &[Row]) -> usize {
    let mut current: Option<EntityKind> = None;
    let mut kept = 0;

    for (position, row) in rows.iter().enumerate() {
        let remaining_after = rows.len() - position - 1;
        let rendered = row.render();
        let mut candidate: Vec<String> = Vec::with_capacity(3);
        if current != Some(row.kind()) {
            let (title, columns) = match row.kind() {
                EntityKind::Competitor => ("## competitors", COMPETITOR_COLUMNS),
                EntityKind::Keyword => ("## keywords", KEYWORD_COLUMNS),
            };
            candidate.push(title.to_string());
            candidate.push(columns.to_string());
        }
        candidate.push(rendered);

        let refs: Vec<&str> = candidate.iter().map(String::as_str).collect();
        let reserve = if remaining_after > 0 {
            omitted_line(remaining_after).chars().count() + 1
        } else {
            0
        };
        if out.cost(&refs) + reserve > out.room() {
            break;
        }
        for line in candidate {
            out.push(line);
        }
        current = Some(row.kind());
        kept += 1;
    }
    kept
}

fn omitted_line(dropped: usize) -> String {
    format!("... {dropped} rows omitted to fit the token budget")
}

fn escape(value: &str) -> String {
    single_line(value).replace('|', "\\|")
}

fn single_line(value: &str) -> String {
    value.replace(['\n', '\r'], " ")
}

fn count(value: Option<u64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn number(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

/// Newline-joined lines whose total character count stays within `max`.
struct BoundedText {
    lines: Vec<String>,
    used: usize,
    max: usize,
}

impl BoundedText {
    const fn new(max: usize) -> Self {
        Self {
            lines: Vec::new(),
            used: 0,
            max,
        }
    }

    const fn room(&self) -> usize {
        self.max - self.used
    }

    fn cost(&self, lines: &[&str]) -> usize {
        let chars: usize = lines.iter().map(|line| line.chars().count()).sum();
        let breaks = if self.lines.is_empty() {
            lines.len().saturating_sub(1)
        } else {
            lines.len()
        };
        chars + breaks
    }

    fn fits(&self, lines: &[&str]) -> bool {
        self.cost(lines) <= self.room()
    }

    fn push(&mut self, line: String) {
        self.used += self.cost(&[line.as_str()]);
        self.lines.push(line);
    }

    /// Pushes the longest prefix of `lines` that fits. When not even the
    /// first line fits it is cut to the remaining room. Returns whether every
    /// line was pushed.
    fn push_prefix(&mut self, lines: &[String]) -> bool {
        for (position, line) in lines.iter().enumerate() {
            if self.fits(&[line.as_str()]) {
                self.push(line.clone());
                continue;
            }
            if position == 0 && self.room() > 0 {
                let cut: String = line.chars().take(self.room()).collect();
                self.push(cut);
            }
            return false;
        }
        true
    }
}
