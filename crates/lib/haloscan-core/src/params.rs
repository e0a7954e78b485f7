//! Upstream request bodies shared by the planner and the single lookups.

use haloscan_model::RankRange;
use serde_json::{Value, json};

use crate::client::Payload;

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

pub(crate) fn domain_overview(domain: &str, lang: &str) -> Payload {
    object(json!({ "domain": domain, "lang": lang }))
}

pub(crate) fn competitors(domain: &str, line_count: u32) -> Payload {
    object(json!({ "domain": domain, "lineCount": line_count }))
}

pub(crate) fn top_pages(domain: &str, line_count: u32, lang: &str) -> Payload {
    object(json!({ "domain": domain, "lineCount": line_count, "lang": lang }))
}

pub(crate) fn positions(domain: &str, range: RankRange, line_count: u32, page: u32) -> Payload {
    object(json!({
        "input": domain,
        "lineCount": line_count,
        "mode": "root",
        "order": "desc",
        "order_by": "traffic",
        "page": page,
        "position_min": range.min,
        "position_max": range.max,
    }))
}

pub(crate) fn keyword_overview(keyword: &str, lang: &str) -> Payload {
    object(json!({ "keyword": keyword, "lang": lang }))
}

pub(crate) fn keyword_list(keyword: &str, line_count: u32, page: u32, lang: &str) -> Payload {
    object(json!({
        "keyword": keyword,
        "lineCount": line_count,
        "page": page,
        "lang": lang,
    }))
}

pub(crate) fn questions(keyword: &str, line_count: u32, lang: &str) -> Payload {
    object(json!({ "keyword": keyword, "lineCount": line_count, "lang": lang }))
}

pub(crate) fn keywords_bulk(keywords: &[String], requested_data: &[String]) -> Payload {
    object(json!({ "keywords": keywords, "requestedData": requested_data }))
}

pub(crate) fn domains_bulk(domains: &[String], requested_data: &[String]) -> Payload {
    object(json!({ "domains": domains, "requestedData": requested_data }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_body_orders_by_traffic() {
        let body = positions("example.com", RankRange::new(11, 20), 100, 1);
        assert_eq!(body["input"], "example.com");
        assert_eq!(body["lineCount"], 100);
        assert_eq!(body["mode"], "root");
        assert_eq!(body["order_by"], "traffic");
        assert_eq!(body["position_min"], 11);
        assert_eq!(body["position_max"], 20);
    }

    #[test]
    fn bulk_bodies_use_upstream_field_names() {
        let body = domains_bulk(&["a.com".to_string()], &["overview".to_string()]);
        assert_eq!(body["domains"][0], "a.com");
        assert_eq!(body["requestedData"][0], "overview");
        assert!(!body.contains_key("keywords"));
    }
}
