//! Parsers for upstream payloads.
//!
//! Each parser normalizes a loosely-shaped upstream JSON response into rows or
//! metric lines suitable for synthesis and lookup responses.

pub mod competitors;
pub mod keywords;
pub mod metrics;

pub use competitors::competitor_rows;
pub use keywords::keyword_rows;
pub use metrics::overview_metrics;

use serde_json::{Map, Value};

/// Field names under which upstream list endpoints return their rows.
const LIST_FIELDS: [&str; 5] = ["results", "keywords", "competitors", "top_keywords", "data"];

/// Finds the first row list in a payload, looking one level into wrapper objects.
pub(crate) fn find_list(payload: &Map<String, Value>) -> &[Value] {
    for field in LIST_FIELDS {
        match payload.get(field) {
            Some(Value::Array(items)) => return items,
            Some(Value::Object(inner)) => {
                for nested in LIST_FIELDS {
                    if let Some(Value::Array(items)) = inner.get(nested) {
                        return items;
                    }
                }
            }
            _ => {}
        }
    }
    &[]
}

pub(crate) fn text_field(item: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match item.get(*field) {
        Some(Value::String(value)) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    })
}

pub(crate) fn number_field(item: &Map<String, Value>, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| item.get(*field).and_then(as_number))
}

pub(crate) fn count_field(item: &Map<String, Value>, fields: &[&str]) -> Option<u64> {
    fields.iter().find_map(|field| {
        let value = item.get(*field)?;
        value.as_u64().or_else(|| as_number(value).and_then(to_count))
    })
}

fn as_number(value: &Value) -> Option<f64> {
    let number: Option<f64> = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', ".").parse().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(number: f64) -> Option<u64> {
    (number >= 0.0 && number < 1.0e18).then(|| number.round() as u64)
}

/// Formats a metric compactly: integers without decimals, others with at most two.
#[must_use]
pub fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1.0e15 {
        return format!("{number:.0}");
    }
    let rendered = format!("{number:.2}");
    rendered.trim_end_matches('0').trim_end_matches('.').to_string()
}
