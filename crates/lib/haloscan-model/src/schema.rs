pub const API_KEY_HEADER: &str = "haloscan-api-key";

pub const ENDPOINT_USER_CREDIT: &str = "user/credit";

pub const ENDPOINT_KEYWORDS_OVERVIEW: &str = "keywords/overview";
pub const ENDPOINT_KEYWORDS_MATCH: &str = "keywords/match";
pub const ENDPOINT_KEYWORDS_SIMILAR: &str = "keywords/similar";
pub const ENDPOINT_KEYWORDS_QUESTIONS: &str = "keywords/questions";
pub const ENDPOINT_KEYWORDS_BULK: &str = "keywords/bulk";

pub const ENDPOINT_DOMAINS_OVERVIEW: &str = "domains/overview";
pub const ENDPOINT_DOMAINS_COMPETITORS: &str = "domains/competitors";
pub const ENDPOINT_DOMAINS_TOP_PAGES: &str = "domains/top-pages";
pub const ENDPOINT_DOMAINS_POSITIONS: &str = "domains/positions";
pub const ENDPOINT_DOMAINS_BULK: &str = "domains/bulk";

/// Upstream cap on rows returned by a single list call.
pub const UPSTREAM_MAX_LINE_COUNT: u32 = 200;

/// Upstream caps on the inputs of one bulk call.
pub const UPSTREAM_MAX_BULK_KEYWORDS: usize = 100;
pub const UPSTREAM_MAX_BULK_DOMAINS: usize = 50;

pub const DEFAULT_KEYWORDS_BULK_DATA: &str = "metrics";
pub const DEFAULT_DOMAINS_BULK_DATA: &str = "overview";

pub const DEFAULT_LANG: &str = "fr";

/// Field carrying an application-level error inside a 2xx upstream response.
pub const FIELD_FAILURE_REASON: &str = "failure_reason";

pub fn make_entity_key(kind: &str, key: &str) -> String {
    format!("{kind}|{}", key.trim().to_lowercase())
}
