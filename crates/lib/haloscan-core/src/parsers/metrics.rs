use serde_json::{Map, Value};

use super::format_number;

const MAX_DEPTH: usize = 3;
const MAX_VALUE_CHARS: usize = 80;
const SKIPPED_FIELDS: [&str; 2] = ["failure_reason", "response_time"];

/// Flattens scalar fields of an overview payload into `(dotted.key, value)` pairs.
///
/// Arrays, nulls and long strings are skipped. At most `limit` pairs are
/// returned, in key order.
#[must_use]
pub fn overview_metrics(payload: &Map<String, Value>, limit: usize) -> Vec<(String, String)> {
    let mut metrics = Vec::new();
    collect(payload, "", 0, limit, &mut metrics);
    metrics
}

fn collect(
    object: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    limit: usize,
    out: &mut Vec<(String, String)>,
) {
    for (key, value) in object {
        if out.len() >= limit {
            return;
        }
        if SKIPPED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if depth + 1 < MAX_DEPTH => {
                collect(inner, &name, depth + 1, limit, out);
            }
            Value::Number(number) => {
                if let Some(number) = number.as_f64() {
                    out.push((name, format_number(number)));
                }
            }
            Value::Bool(flag) => out.push((name, flag.to_string())),
            Value::String(text) => {
                let text = text.trim();
                if !text.is_empty() && text.chars().count() <= MAX_VALUE_CHARS {
                    out.push((name, text.replace(['\n', '\r'], " ")));
                }
            }
            _ => {}
        }
    }
}
