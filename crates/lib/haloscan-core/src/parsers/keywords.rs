use haloscan_model::KeywordRow;
use serde_json::{Map, Value};

use super::{count_field, find_list, number_field, text_field};

const KEYWORD_FIELDS: [&str; 4] = ["keyword", "kw", "query", "question"];

/// Extracts keyword rows from a positions, similar, match or questions payload.
///
/// Items without a keyword are skipped; bare strings become metric-less rows.
#[must_use]
pub fn keyword_rows(payload: &Map<String, Value>) -> Vec<KeywordRow> {
    find_list(payload)
        .iter()
        .filter_map(|item| match item {
            Value::Object(item) => keyword_row(item),
            Value::String(keyword) if !keyword.trim().is_empty() => Some(KeywordRow {
                keyword: keyword.trim().to_string(),
                ..KeywordRow::default()
            }),
            _ => None,
        })
        .collect()
}

fn keyword_row(item: &Map<String, Value>) -> Option<KeywordRow> {
    let keyword = text_field(item, &KEYWORD_FIELDS)?;
    Some(KeywordRow {
        keyword,
        position: count_field(item, &["position", "rank", "serp_position"])
            .and_then(|position| u32::try_from(position).ok()),
        volume: count_field(item, &["volume", "search_volume"]),
        traffic: number_field(item, &["traffic"]),
        cpc: number_field(item, &["cpc"]),
        competition: number_field(item, &["competition"]),
        url: text_field(item, &["url", "page"]),
    })
}
