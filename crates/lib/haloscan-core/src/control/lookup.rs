use haloscan_model::schema::{
    DEFAULT_DOMAINS_BULK_DATA, DEFAULT_KEYWORDS_BULK_DATA, DEFAULT_LANG, ENDPOINT_DOMAINS_BULK,
    ENDPOINT_DOMAINS_COMPETITORS, ENDPOINT_DOMAINS_OVERVIEW, ENDPOINT_DOMAINS_POSITIONS,
    ENDPOINT_DOMAINS_TOP_PAGES, ENDPOINT_KEYWORDS_BULK, ENDPOINT_KEYWORDS_MATCH,
    ENDPOINT_KEYWORDS_OVERVIEW, ENDPOINT_KEYWORDS_QUESTIONS, ENDPOINT_KEYWORDS_SIMILAR,
    ENDPOINT_USER_CREDIT, UPSTREAM_MAX_BULK_DOMAINS, UPSTREAM_MAX_BULK_KEYWORDS,
    UPSTREAM_MAX_LINE_COUNT,
};
use haloscan_model::{AnalysisMode, AnalysisTarget, KeywordRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{Payload, SeoApi};
use crate::parsers::{count_field, keyword_rows};
use crate::{params, validate};

use super::{AnalysisControlPlane, ControlError};

pub const DEFAULT_LOOKUP_LINE_COUNT: u32 = 20;
pub const DEFAULT_POSITION_LIMIT: usize = 20;
const POSITION_FETCH_LINE_COUNT: u32 = 100;

/// Single keyword lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordQuery {
    pub keyword: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, alias = "lineCount")]
    pub line_count: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl KeywordQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            lang: None,
            line_count: None,
            page: None,
        }
    }
}

/// Single domain lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainQuery {
    pub domain: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, alias = "lineCount")]
    pub line_count: Option<u32>,
}

impl DomainQuery {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            lang: None,
            line_count: None,
        }
    }
}

/// Top keywords of a domain within one rank range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionQuery {
    pub domain: String,
    #[serde(default = "default_position_min")]
    pub position_min: u32,
    #[serde(default = "default_position_max")]
    pub position_max: u32,
    #[serde(default)]
    pub limit: Option<usize>,
}

const fn default_position_min() -> u32 {
    1
}

const fn default_position_max() -> u32 {
    10
}

/// Several keywords or domains sent to an upstream bulk endpoint in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkQuery {
    pub items: Vec<String>,
    /// Data sections to return; `metrics` for keywords and `overview` for domains when absent.
    #[serde(default, alias = "requestedData")]
    pub requested_data: Option<Vec<String>>,
}

impl BulkQuery {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            requested_data: None,
        }
    }

    fn sections(&self, default: &str) -> Result<Vec<String>, ControlError> {
        match self.requested_data.as_deref() {
            Some(sections) if !sections.is_empty() => Ok(validate::requested_data(sections)?),
            _ => Ok(vec![default.to_string()]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub domain: String,
    pub position_range: String,
    pub keywords_found: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
    pub top_keywords: Vec<KeywordRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamStatus {
    Connected,
    Error,
}

/// Server liveness plus an upstream credit check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub upstream_status: UpstreamStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Value>,
    pub message: String,
}

struct KeywordParams {
    keyword: String,
    lang: String,
    line_count: u32,
    page: u32,
}

impl KeywordQuery {
    fn validated(&self) -> Result<KeywordParams, ControlError> {
        Ok(KeywordParams {
            keyword: validate::keyword(&self.keyword)?,
            lang: validate::lang(self.lang.as_deref().unwrap_or(DEFAULT_LANG))?,
            line_count: validate::line_count(self.line_count.unwrap_or(DEFAULT_LOOKUP_LINE_COUNT))?,
            page: validate::page(self.page.unwrap_or(1))?,
        })
    }
}

struct DomainParams {
    domain: String,
    lang: String,
    line_count: u32,
}

impl DomainQuery {
    fn validated(&self) -> Result<DomainParams, ControlError> {
        let domain = validate::domain(&self.domain)?;
        Ok(DomainParams {
            domain: AnalysisTarget::parse(&domain, AnalysisMode::Domain)?
                .value()
                .to_string(),
            lang: validate::lang(self.lang.as_deref().unwrap_or(DEFAULT_LANG))?,
            line_count: validate::line_count(self.line_count.unwrap_or(DEFAULT_LOOKUP_LINE_COUNT))?,
        })
    }
}

impl<A: SeoApi> AnalysisControlPlane<A> {
    async fn fetch(&self, endpoint: &str, params: Option<Payload>) -> Result<Payload, ControlError> {
        Ok(self.api.call(endpoint, params.as_ref()).await?)
    }

    /// Returns the account's remaining upstream credits.
    ///
    /// # Errors
    /// Returns `ControlError::Client` if the upstream call fails.
    pub async fn user_credit(&self) -> Result<Payload, ControlError> {
        self.fetch(ENDPOINT_USER_CREDIT, None).await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn keyword_overview(&self, query: &KeywordQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_KEYWORDS_OVERVIEW,
            Some(params::keyword_overview(&params.keyword, &params.lang)),
        )
        .await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn keyword_matches(&self, query: &KeywordQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_KEYWORDS_MATCH,
            Some(params::keyword_list(
                &params.keyword,
                params.line_count,
                params.page,
                &params.lang,
            )),
        )
        .await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn similar_keywords(&self, query: &KeywordQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_KEYWORDS_SIMILAR,
            Some(params::keyword_list(
                &params.keyword,
                params.line_count,
                params.page,
                &params.lang,
            )),
        )
        .await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn keyword_questions(&self, query: &KeywordQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_KEYWORDS_QUESTIONS,
            Some(params::questions(&params.keyword, params.line_count, &params.lang)),
        )
        .await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn domain_overview(&self, query: &DomainQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_DOMAINS_OVERVIEW,
            Some(params::domain_overview(&params.domain, &params.lang)),
        )
        .await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn domain_competitors(&self, query: &DomainQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_DOMAINS_COMPETITORS,
            Some(params::competitors(&params.domain, params.line_count)),
        )
        .await
    }

    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn domain_top_pages(&self, query: &DomainQuery) -> Result<Payload, ControlError> {
        let params = query.validated()?;
        self.fetch(
            ENDPOINT_DOMAINS_TOP_PAGES,
            Some(params::top_pages(&params.domain, params.line_count, &params.lang)),
        )
        .await
    }

    /// Fetches one rank range and keeps the highest-traffic keywords.
    ///
    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn keywords_by_position(
        &self,
        query: &PositionQuery,
    ) -> Result<PositionReport, ControlError> {
        let domain = validate::domain(&query.domain)?;
        let domain = AnalysisTarget::parse(&domain, AnalysisMode::Domain)?
            .value()
            .to_string();
        let range = validate::rank_range(query.position_min, query.position_max)?;
        let limit = query.limit.unwrap_or(DEFAULT_POSITION_LIMIT);
        if limit == 0 || limit > UPSTREAM_MAX_LINE_COUNT as usize {
            return Err(validate::ValidationError {
                field: "limit",
                message: format!("must be between 1 and {UPSTREAM_MAX_LINE_COUNT}"),
            }
            .into());
        }
        let fetch_lines = u32::try_from(limit)
            .map_or(UPSTREAM_MAX_LINE_COUNT, |limit| limit.max(POSITION_FETCH_LINE_COUNT))
            .min(UPSTREAM_MAX_LINE_COUNT);

        let payload = self
            .fetch(
                ENDPOINT_DOMAINS_POSITIONS,
                Some(params::positions(&domain, range, fetch_lines, 1)),
            )
            .await?;

        let mut rows = keyword_rows(&payload);
        let keywords_found = rows.len();
        rows.sort_by(|a, b| {
            b.traffic
                .unwrap_or_default()
                .total_cmp(&a.traffic.unwrap_or_default())
        });
        rows.truncate(limit);

        Ok(PositionReport {
            domain,
            position_range: range.to_string(),
            keywords_found,
            total_results: count_field(&payload, &["total_result_count"]),
            top_keywords: rows,
        })
    }

    /// Sends up to 100 keywords to the upstream bulk endpoint in one call.
    ///
    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn keywords_bulk(&self, query: &BulkQuery) -> Result<Payload, ControlError> {
        validate::bulk_items("keywords", &query.items, UPSTREAM_MAX_BULK_KEYWORDS)?;
        let keywords = query
            .items
            .iter()
            .map(String::as_str)
            .map(validate::keyword)
            .collect::<Result<Vec<_>, _>>()?;
        let sections = query.sections(DEFAULT_KEYWORDS_BULK_DATA)?;
        self.fetch(
            ENDPOINT_KEYWORDS_BULK,
            Some(params::keywords_bulk(&keywords, &sections)),
        )
        .await
    }

    /// Sends up to 50 domains to the upstream bulk endpoint in one call.
    ///
    /// # Errors
    /// Returns `ControlError` if validation or the upstream call fails.
    pub async fn domains_bulk(&self, query: &BulkQuery) -> Result<Payload, ControlError> {
        validate::bulk_items("domains", &query.items, UPSTREAM_MAX_BULK_DOMAINS)?;
        let mut domains = Vec::with_capacity(query.items.len());
        for raw in &query.items {
            let domain = validate::domain(raw)?;
            domains.push(
                AnalysisTarget::parse(&domain, AnalysisMode::Domain)?
                    .value()
                    .to_string(),
            );
        }
        let sections = query.sections(DEFAULT_DOMAINS_BULK_DATA)?;
        self.fetch(
            ENDPOINT_DOMAINS_BULK,
            Some(params::domains_bulk(&domains, &sections)),
        )
        .await
    }

    /// Reports server health and checks the upstream credit endpoint.
    ///
    /// Never fails: an upstream error is reported in the result.
    pub async fn health_check(&self) -> HealthReport {
        match self.user_credit().await {
            Ok(payload) => {
                let credits = payload.get("credits").cloned();
                info!(credits = ?credits, "upstream reachable");
                HealthReport {
                    status: "healthy".to_string(),
                    upstream_status: UpstreamStatus::Connected,
                    credits,
                    message: "haloscan MCP server operational".to_string(),
                }
            }
            Err(err) => {
                warn!(error = %err, "upstream credit check failed");
                HealthReport {
                    status: "healthy".to_string(),
                    upstream_status: UpstreamStatus::Error,
                    credits: None,
                    message: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::ClientError;
    use crate::control::ControlConfig;
    use crate::testing::ScriptedApi;

    fn control(script: Vec<Result<Payload, ClientError>>) -> AnalysisControlPlane<ScriptedApi> {
        AnalysisControlPlane::new(ScriptedApi::new(script), ControlConfig::default())
    }

    fn object(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn keyword_lookups_apply_defaults() {
        let control = control(vec![Ok(Payload::new())]);
        control
            .keyword_matches(&KeywordQuery::new(" running "))
            .await
            .expect("match");
        let calls = control.api().calls();
        assert_eq!(calls[0].endpoint, ENDPOINT_KEYWORDS_MATCH);
        let params = calls[0].params.as_ref().expect("post body");
        assert_eq!(params["keyword"], "running");
        assert_eq!(params["lineCount"], DEFAULT_LOOKUP_LINE_COUNT);
        assert_eq!(params["lang"], "fr");
    }

    #[tokio::test]
    async fn invalid_queries_never_reach_upstream() {
        let control = control(Vec::new());
        let mut query = KeywordQuery::new("running");
        query.line_count = Some(500);
        assert!(matches!(
            control.similar_keywords(&query).await,
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            control.domain_overview(&DomainQuery::new("not a domain")).await,
            Err(ControlError::InvalidTarget(_))
        ));
        assert!(control.api().calls().is_empty());
    }

    #[tokio::test]
    async fn domain_lookups_normalize_the_domain() {
        let control = control(vec![Ok(Payload::new())]);
        control
            .domain_top_pages(&DomainQuery::new("https://www.Example.com/shop"))
            .await
            .expect("top pages");
        let calls = control.api().calls();
        assert_eq!(calls[0].params.as_ref().expect("body")["domain"], "example.com");
    }

    #[tokio::test]
    async fn positions_are_sorted_by_traffic_and_limited() {
        let payload = object(json!({
            "total_result_count": 3,
            "results": [
                { "keyword": "low", "position": 12, "traffic": 5 },
                { "keyword": "high", "position": 15, "traffic": 900 },
                { "keyword": "mid", "position": 11, "traffic": 40 }
            ]
        }));
        let control = control(vec![Ok(payload)]);
        let report = control
            .keywords_by_position(&PositionQuery {
                domain: "example.com".to_string(),
                position_min: 11,
                position_max: 20,
                limit: Some(2),
            })
            .await
            .expect("positions");

        assert_eq!(report.position_range, "11-20");
        assert_eq!(report.keywords_found, 3);
        assert_eq!(report.total_results, Some(3));
        let keywords: Vec<_> = report.top_keywords.iter().map(|row| row.keyword.as_str()).collect();
        assert_eq!(keywords, ["high", "mid"]);

        let body = control.api().calls()[0].params.clone().expect("body");
        assert_eq!(body["input"], "example.com");
        assert_eq!(body["position_min"], 11);
    }

    #[tokio::test]
    async fn large_position_limits_fetch_enough_rows() {
        let control = control(vec![Ok(Payload::new()), Ok(Payload::new())]);
        let mut query = PositionQuery {
            domain: "example.com".to_string(),
            position_min: 1,
            position_max: 100,
            limit: Some(150),
        };
        control.keywords_by_position(&query).await.expect("positions");
        query.limit = Some(5);
        control.keywords_by_position(&query).await.expect("positions");

        let calls = control.api().calls();
        assert_eq!(calls[0].params.as_ref().expect("body")["lineCount"], 150);
        assert_eq!(
            calls[1].params.as_ref().expect("body")["lineCount"],
            POSITION_FETCH_LINE_COUNT
        );
    }

    #[tokio::test]
    async fn bulk_lookups_default_their_sections() {
        let control = control(vec![Ok(Payload::new()), Ok(Payload::new())]);
        control
            .keywords_bulk(&BulkQuery::new(vec![" seo ".to_string(), "sea".to_string()]))
            .await
            .expect("keywords bulk");
        control
            .domains_bulk(&BulkQuery {
                items: vec!["https://www.Example.com/".to_string()],
                requested_data: Some(vec!["overview".to_string(), "positions".to_string()]),
            })
            .await
            .expect("domains bulk");

        let calls = control.api().calls();
        assert_eq!(calls[0].endpoint, ENDPOINT_KEYWORDS_BULK);
        let body = calls[0].params.as_ref().expect("body");
        assert_eq!(body["keywords"], json!(["seo", "sea"]));
        assert_eq!(body["requestedData"], json!(["metrics"]));

        assert_eq!(calls[1].endpoint, ENDPOINT_DOMAINS_BULK);
        let body = calls[1].params.as_ref().expect("body");
        assert_eq!(body["domains"], json!(["example.com"]));
        assert_eq!(body["requestedData"], json!(["overview", "positions"]));
    }

    #[tokio::test]
    async fn bulk_lookups_reject_oversized_or_bad_inputs() {
        let control = control(Vec::new());
        let too_many = BulkQuery::new(vec!["example.com".to_string(); UPSTREAM_MAX_BULK_DOMAINS + 1]);
        assert!(matches!(
            control.domains_bulk(&too_many).await,
            Err(ControlError::Validation(err)) if err.field == "domains"
        ));
        assert!(matches!(
            control.keywords_bulk(&BulkQuery::new(Vec::new())).await,
            Err(ControlError::Validation(_))
        ));
        assert!(matches!(
            control
                .domains_bulk(&BulkQuery::new(vec!["example.com".to_string(), "nope".to_string()]))
                .await,
            Err(ControlError::InvalidTarget(_))
        ));
        assert!(control.api().calls().is_empty());
    }

    #[tokio::test]
    async fn health_reports_upstream_state_without_failing() {
        let control = control(vec![Ok(object(json!({ "credits": 1200 })))]);
        let healthy = control.health_check().await;
        assert_eq!(healthy.upstream_status, UpstreamStatus::Connected);
        assert_eq!(healthy.credits, Some(json!(1200)));

        let degraded = control.health_check().await;
        assert_eq!(degraded.status, "healthy");
        assert_eq!(degraded.upstream_status, UpstreamStatus::Error);
        assert!(degraded.message.contains("404"));
    }
}
