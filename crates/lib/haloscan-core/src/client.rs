//! Authenticated client for the upstream SEO API.

use std::{error::Error, fmt, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use haloscan_model::StepErrorKind;
use haloscan_model::schema::{API_KEY_HEADER, FIELD_FAILURE_REASON};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.haloscan.com/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_ERROR_BODY_CHARS: usize = 300;

/// JSON object returned by an upstream call.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Non-2xx status, a body that is not a JSON object, or a reported `failure_reason`.
    Upstream { status: u16, message: String },
    Timeout(Duration),
    Transport(String),
    InvalidConfig(String),
}

impl ClientError {
    #[must_use]
    pub const fn step_error_kind(&self) -> StepErrorKind {
        match self {
            Self::Upstream { .. } => StepErrorKind::Upstream,
            Self::Timeout(_) => StepErrorKind::Timeout,
            Self::Transport(_) | Self::InvalidConfig(_) => StepErrorKind::Transport,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream { status, message } => {
                write!(f, "upstream error (HTTP {status}): {message}")
            }
            Self::Timeout(after) => {
                write!(f, "upstream request timed out after {}s", after.as_secs_f32())
            }
            Self::Transport(message) => write!(f, "upstream transport error: {message}"),
            Self::InvalidConfig(message) => write!(f, "invalid client configuration: {message}"),
        }
    }
}

impl Error for ClientError {}

/// Upstream API seam used by the pipeline and lookups.
///
/// `params = None` issues a GET, otherwise the params are POSTed as JSON.
pub trait SeoApi: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        endpoint: &'a str,
        params: Option<&'a Payload>,
    ) -> BoxFuture<'a, Result<Payload, ClientError>>;
}

/// Static connection settings, read once at startup.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: Url,
    pub timeout: Duration,
}

impl ClientConfig {
    #[must_use]
    pub const fn new(api_key: String, base_url: Url) -> Self {
        Self {
            api_key,
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// reqwest-backed client for the Haloscan API.
#[derive(Clone)]
pub struct HaloscanClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl HaloscanClient {
    /// Builds a client that attaches the API key to every request.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidConfig` if the key is empty or not a valid
    /// header value, or if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::InvalidConfig("api key is empty".to_string()));
        }
        let mut api_key = HeaderValue::from_str(config.api_key.trim()).map_err(|_| {
            ClientError::InvalidConfig("api key contains invalid header characters".to_string())
        })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ClientError::InvalidConfig(err.to_string()))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Issues one request and returns the parsed JSON object.
    ///
    /// # Errors
    /// Returns `ClientError` on transport failure, timeout, non-2xx status,
    /// malformed JSON or an upstream `failure_reason`.
    pub async fn request(
        &self,
        endpoint: &str,
        params: Option<&Payload>,
    ) -> Result<Payload, ClientError> {
        let url = self.endpoint_url(endpoint);
        debug!(endpoint, has_body = params.is_some(), "upstream request");

        let request = match params {
            Some(body) => self.http.post(&url).json(body),
            None => self.http.get(&url),
        };
        let response = request.send().await.map_err(|err| self.map_reqwest_err(&err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| self.map_reqwest_err(&err))?;

        debug!(endpoint, status = status.as_u16(), bytes = body.len(), "upstream response");

        if !status.is_success() {
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }
        parse_payload(status.as_u16(), &body)
    }

    fn map_reqwest_err(&self, err: &reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.config.timeout)
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl SeoApi for HaloscanClient {
    fn call<'a>(
        &'a self,
        endpoint: &'a str,
        params: Option<&'a Payload>,
    ) -> BoxFuture<'a, Result<Payload, ClientError>> {
        Box::pin(self.request(endpoint, params))
    }
}

fn parse_payload(status: u16, body: &str) -> Result<Payload, ClientError> {
    let value: Value = serde_json::from_str(body).map_err(|err| ClientError::Upstream {
        status,
        message: format!("malformed JSON response: {err}"),
    })?;
    let Value::Object(payload) = value else {
        return Err(ClientError::Upstream {
            status,
            message: "expected a JSON object response".to_string(),
        });
    };

    match payload.get(FIELD_FAILURE_REASON) {
        Some(Value::String(reason)) if !reason.trim().is_empty() => Err(ClientError::Upstream {
            status,
            message: reason.trim().to_string(),
        }),
        Some(Value::Null | Value::String(_)) | None => Ok(payload),
        Some(other) => Err(ClientError::Upstream {
            status,
            message: other.to_string(),
        }),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::{get, post};
    use serde_json::json;

    const KEY: &str = "test-key";

    async fn spawn_upstream() -> Url {
        let app = Router::new()
            .route(
                "/api/user/credit",
                get(|headers: AxumHeaders| async move {
                    let authorized = headers
                        .get(API_KEY_HEADER)
                        .and_then(|value| value.to_str().ok())
                        == Some(KEY);
                    if authorized {
                        (StatusCode::OK, r#"{"credits": 1200}"#)
                    } else {
                        (StatusCode::UNAUTHORIZED, r#"{"error": "missing key"}"#)
                    }
                }),
            )
            .route(
                "/api/domains/overview",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route("/api/keywords/overview", post(|| async { "<html>not json</html>" }))
            .route("/api/keywords/similar", post(|| async { "[1, 2, 3]" }))
            .route(
                "/api/domains/positions",
                post(|| async { r#"{"failure_reason": "quota exceeded", "results": []}"# }),
            )
            .route(
                "/api/domains/competitors",
                post(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    r#"{"results": []}"#
                }),
            )
            .route(
                "/api/keywords/match",
                post(|axum::Json(body): axum::Json<Value>| async move {
                    axum::Json(json!({ "echo": body, "failure_reason": null }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}/api")).expect("mock upstream url")
    }

    fn client(base_url: Url, timeout: Duration) -> HaloscanClient {
        HaloscanClient::new(ClientConfig::new(KEY.to_string(), base_url).with_timeout(timeout))
            .expect("client should build")
    }

    #[test]
    fn rejects_empty_api_key() {
        let base = Url::parse(DEFAULT_BASE_URL).expect("default url");
        let err = HaloscanClient::new(ClientConfig::new("  ".to_string(), base))
            .err()
            .expect("empty key should be rejected");
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn joins_endpoint_onto_base_url() {
        let base = Url::parse("https://api.haloscan.com/api/").expect("url");
        let client = client(base, DEFAULT_TIMEOUT);
        assert_eq!(
            client.endpoint_url("/domains/overview"),
            "https://api.haloscan.com/api/domains/overview"
        );
    }

    #[test]
    fn config_debug_redacts_the_key() {
        let base = Url::parse(DEFAULT_BASE_URL).expect("url");
        let rendered = format!("{:?}", ClientConfig::new("secret-value".to_string(), base));
        assert!(!rendered.contains("secret-value"));
    }

    #[tokio::test]
    async fn get_sends_api_key_and_parses_object() {
        let client = client(spawn_upstream().await, DEFAULT_TIMEOUT);
        let payload = client.call("user/credit", None).await.expect("credit call");
        assert_eq!(payload.get("credits"), Some(&json!(1200)));
    }

    #[tokio::test]
    async fn post_sends_params_as_json_body() {
        let client = client(spawn_upstream().await, DEFAULT_TIMEOUT);
        let mut params = Payload::new();
        params.insert("keyword".to_string(), json!("running"));
        let payload = client
            .call("keywords/match", Some(&params))
            .await
            .expect("match call");
        assert_eq!(payload["echo"]["keyword"], "running");
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let client = client(spawn_upstream().await, DEFAULT_TIMEOUT);
        let err = client
            .call("domains/overview", Some(&Payload::new()))
            .await
            .expect_err("500 should fail");
        assert_eq!(
            err,
            ClientError::Upstream {
                status: 500,
                message: "boom".to_string()
            }
        );
        assert_eq!(err.step_error_kind(), StepErrorKind::Upstream);
    }

    #[tokio::test]
    async fn malformed_or_non_object_json_is_an_upstream_error() {
        let client = client(spawn_upstream().await, DEFAULT_TIMEOUT);
        for endpoint in ["keywords/overview", "keywords/similar"] {
            let err = client
                .call(endpoint, Some(&Payload::new()))
                .await
                .expect_err("bad body should fail");
            assert!(
                matches!(err, ClientError::Upstream { status: 200, .. }),
                "{endpoint}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn failure_reason_is_an_upstream_error() {
        let client = client(spawn_upstream().await, DEFAULT_TIMEOUT);
        let err = client
            .call("domains/positions", Some(&Payload::new()))
            .await
            .expect_err("failure_reason should fail");
        assert_eq!(
            err,
            ClientError::Upstream {
                status: 200,
                message: "quota exceeded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let timeout = Duration::from_millis(50);
        let client = client(spawn_upstream().await, timeout);
        let err = client
            .call("domains/competitors", Some(&Payload::new()))
            .await
            .expect_err("slow call should time out");
        assert_eq!(err, ClientError::Timeout(timeout));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let base = Url::parse(&format!("http://{addr}/api")).expect("url");
        let err = client(base, DEFAULT_TIMEOUT)
            .call("user/credit", None)
            .await
            .expect_err("closed port should fail");
        assert!(matches!(err, ClientError::Transport(_)), "{err}");
    }
}
