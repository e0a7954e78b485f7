use haloscan_model::CompetitorRow;
use serde_json::{Map, Value};

use super::{count_field, find_list, number_field, text_field};

/// Extracts competitor rows from a `domains/competitors` payload.
#[must_use]
pub fn competitor_rows(payload: &Map<String, Value>) -> Vec<CompetitorRow> {
    find_list(payload)
        .iter()
        .filter_map(|item| match item {
            Value::Object(item) => competitor_row(item),
            Value::String(domain) if !domain.trim().is_empty() => Some(CompetitorRow {
                domain: domain.trim().to_string(),
                ..CompetitorRow::default()
            }),
            _ => None,
        })
        .collect()
}

fn competitor_row(item: &Map<String, Value>) -> Option<CompetitorRow> {
    let domain = text_field(item, &["root_domain", "domain", "competitor", "url"])?;
    Some(CompetitorRow {
        domain,
        common_keywords: count_field(item, &["common_keywords", "commonKeywords", "keywords_in_common"]),
        keywords: count_field(item, &["total_keyword_count", "total_keywords", "keywords"]),
        traffic: number_field(item, &["total_traffic", "traffic"]),
    })
}
