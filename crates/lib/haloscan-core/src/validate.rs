//! Input checks for lookup parameters received from tools and HTTP routes.

use std::{error::Error, fmt};

use haloscan_model::RankRange;
use haloscan_model::schema::UPSTREAM_MAX_LINE_COUNT;
use haloscan_model::target::{MAX_DOMAIN_CHARS, MAX_KEYWORD_CHARS};

pub const MAX_RANK: u32 = 100;
pub const MAX_OUTPUT_BUDGET: usize = 100_000;
const MAX_SECTION_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Returns the trimmed keyword.
///
/// # Errors
/// Returns `ValidationError` if the keyword is blank, too long or has control characters.
pub fn keyword(raw: &str) -> Result<String, ValidationError> {
    text("keyword", raw, MAX_KEYWORD_CHARS)
}

/// Returns the trimmed domain as given; normalization happens in `AnalysisTarget`.
///
/// # Errors
/// Returns `ValidationError` if the domain is blank, too long or has control characters.
pub fn domain(raw: &str) -> Result<String, ValidationError> {
    text("domain", raw, MAX_DOMAIN_CHARS)
}

fn text(field: &'static str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::new(field, format!("must be at most {max} characters")));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::new(field, "must not contain control characters"));
    }
    Ok(trimmed.to_string())
}

/// # Errors
/// Returns `ValidationError` unless `1 <= value <= 200`.
pub fn line_count(value: u32) -> Result<u32, ValidationError> {
    if (1..=UPSTREAM_MAX_LINE_COUNT).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::new(
            "line_count",
            format!("must be between 1 and {UPSTREAM_MAX_LINE_COUNT}"),
        ))
    }
}

/// # Errors
/// Returns `ValidationError` if the page is zero.
pub fn page(value: u32) -> Result<u32, ValidationError> {
    if value >= 1 {
        Ok(value)
    } else {
        Err(ValidationError::new("page", "must be at least 1"))
    }
}

/// Checks the number of inputs of a bulk call.
///
/// # Errors
/// Returns `ValidationError` unless `1 <= items.len() <= max`.
pub fn bulk_items(field: &'static str, items: &[String], max: usize) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new(field, "must list at least one item"));
    }
    if items.len() > max {
        return Err(ValidationError::new(
            field,
            format!("at most {max} items per request, got {}", items.len()),
        ));
    }
    Ok(())
}

/// Trims the requested data sections of a bulk call.
///
/// # Errors
/// Returns `ValidationError` if a section name is blank, too long or has control characters.
pub fn requested_data(sections: &[String]) -> Result<Vec<String>, ValidationError> {
    sections
        .iter()
        .map(|section| text("requested_data", section, MAX_SECTION_CHARS))
        .collect()
}

/// Lowercases a two-letter language code.
///
/// # Errors
/// Returns `ValidationError` if the code is not two ASCII letters.
pub fn lang(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_ascii_lowercase();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(code)
    } else {
        Err(ValidationError::new("lang", "must be a two-letter language code"))
    }
}

/// # Errors
/// Returns `ValidationError` unless `1 <= min <= max <= 100`.
pub fn rank_range(min: u32, max: u32) -> Result<RankRange, ValidationError> {
    let range = RankRange::new(min, max);
    if range.is_valid() && max <= MAX_RANK {
        Ok(range)
    } else {
        Err(ValidationError::new(
            "position_range",
            format!("expected 1 <= position_min <= position_max <= {MAX_RANK}, got {range}"),
        ))
    }
}

/// # Errors
/// Returns `ValidationError` unless `1 <= value <= 100000`.
pub fn output_budget(value: usize) -> Result<usize, ValidationError> {
    if (1..=MAX_OUTPUT_BUDGET).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::new(
            "output_budget",
            format!("must be between 1 and {MAX_OUTPUT_BUDGET} tokens"),
        ))
    }
}
