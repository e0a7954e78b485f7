//! HTTP interface for haloscan-mcp.
//!
//! Exposes the SEO lookups and the chunked analysis as plain JSON routes for
//! manual testing, plus an SSE route that streams step progress.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Json, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::future::{self, FutureExt};
use futures::stream::{Stream, StreamExt};
use haloscan_core::control::{
    AnalysisPlan, AnalysisRequest, BulkQuery, DomainQuery, HealthReport, KeywordQuery,
    PositionQuery, PositionReport, ProgressFn, StepProgress, noop_progress,
};
use haloscan_core::{AnalysisControlPlane, ClientError, ControlError, Payload, SeoApi, validate};
use haloscan_model::AnalysisReport;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_HTTP_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 8080);

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl HttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            request_timeout: Duration::from_secs(180),
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_ADDR)
    }
}

/// HTTP server wrapper.
pub struct HttpServer<A: SeoApi> {
    config: HttpServerConfig,
    control: Arc<AnalysisControlPlane<A>>,
}

impl<A: SeoApi> HttpServer<A> {
    #[must_use]
    pub const fn new(control: Arc<AnalysisControlPlane<A>>, config: HttpServerConfig) -> Self {
        Self { config, control }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = build_router(self.control, &self.config);

        info!("haloscan-http listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

struct AppState<A: SeoApi> {
    control: Arc<AnalysisControlPlane<A>>,
    request_timeout: Duration,
}

impl<A: SeoApi> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            control: Arc::clone(&self.control),
            request_timeout: self.request_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn timeout() -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "request timed out")
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        let status = match &err {
            ControlError::InvalidTarget(_) | ControlError::Validation(_) => StatusCode::BAD_REQUEST,
            ControlError::Client(ClientError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ControlError::Client(ClientError::Upstream { .. } | ClientError::Transport(_))
            | ControlError::AllStepsFailed(_) => StatusCode::BAD_GATEWAY,
            ControlError::Client(ClientError::InvalidConfig(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

/// Builds the router with every route mounted.
pub fn build_router<A: SeoApi>(
    control: Arc<AnalysisControlPlane<A>>,
    config: &HttpServerConfig,
) -> Router {
    let state = AppState {
        control,
        request_timeout: config.request_timeout,
    };
    Router::new()
        .route("/health", get(health::<A>))
        .route("/user/credit", get(user_credit::<A>))
        .route("/keywords/overview", post(keyword_overview::<A>))
        .route("/keywords/match", post(keyword_match::<A>))
        .route("/keywords/similar", post(keyword_similar::<A>))
        .route("/keywords/questions", post(keyword_questions::<A>))
        .route("/keywords/bulk", post(keywords_bulk::<A>))
        .route("/domains/overview", post(domain_overview::<A>))
        .route("/domains/competitors", post(domain_competitors::<A>))
        .route("/domains/top-pages", post(domain_top_pages::<A>))
        .route("/domains/positions", post(domain_positions::<A>))
        .route("/domains/bulk", post(domains_bulk::<A>))
        .route("/analysis/plan", post(analysis_plan::<A>))
        .route("/analysis", post(analysis::<A>))
        .route("/analysis/stream", post(analysis_stream::<A>))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .with_state(state)
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, ControlError>>,
) -> Result<Json<T>, ApiError> {
    let value = tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ApiError::timeout())??;
    Ok(Json(value))
}

async fn health<A: SeoApi>(State(state): State<AppState<A>>) -> Json<HealthReport> {
    Json(state.control.health_check().await)
}

async fn user_credit<A: SeoApi>(
    State(state): State<AppState<A>>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.user_credit()).await
}

async fn keyword_overview<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<KeywordQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.keyword_overview(&query)).await
}

async fn keyword_match<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<KeywordQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.keyword_matches(&query)).await
}

async fn keyword_similar<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<KeywordQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.similar_keywords(&query)).await
}

async fn keyword_questions<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<KeywordQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.keyword_questions(&query)).await
}

async fn keywords_bulk<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<BulkQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.keywords_bulk(&query)).await
}

async fn domain_overview<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<DomainQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.domain_overview(&query)).await
}

async fn domain_competitors<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<DomainQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.domain_competitors(&query)).await
}

async fn domain_top_pages<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<DomainQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.domain_top_pages(&query)).await
}

async fn domain_positions<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<PositionQuery>,
) -> Result<Json<PositionReport>, ApiError> {
    bounded(state.request_timeout, state.control.keywords_by_position(&query)).await
}

async fn domains_bulk<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(query): Json<BulkQuery>,
) -> Result<Json<Payload>, ApiError> {
    bounded(state.request_timeout, state.control.domains_bulk(&query)).await
}

async fn analysis_plan<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisPlan>, ApiError> {
    Ok(Json(state.control.plan(&request)?))
}

async fn analysis<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    let cancel = CancellationToken::new();
    bounded(
        state.request_timeout,
        state.control.analyze(request, &noop_progress(), &cancel),
    )
    .await
}

/// One `progress` SSE event.
#[derive(Debug, Serialize)]
struct ProgressEvent<'a> {
    step: usize,
    total: usize,
    name: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    elapsed_ms: u64,
}

impl<'a> From<&'a StepProgress> for ProgressEvent<'a> {
    fn from(progress: &'a StepProgress) -> Self {
        Self {
            step: progress.index + 1,
            total: progress.total,
            name: &progress.result.name,
            success: progress.result.success,
            error: progress.result.error.as_deref(),
            elapsed_ms: haloscan_model::duration_ms::as_millis(progress.result.elapsed),
        }
    }
}

fn json_event(name: &'static str, value: &impl Serialize) -> Event {
    Event::default()
        .event(name)
        .json_data(value)
        .unwrap_or_else(|err| Event::default().event("error").data(err.to_string()))
}

/// Streams one `progress` event per step, then a final `report` (or `error`) event.
///
/// The run is cancelled when the client disconnects.
async fn analysis_stream<A: SeoApi>(
    State(state): State<AppState<A>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate::output_budget(
        request
            .output_budget
            .unwrap_or_else(|| state.control.default_output_budget()),
    )
    .map_err(ControlError::from)?;
    state.control.plan(&request)?;

    let (tx, rx) = futures::channel::mpsc::unbounded::<Event>();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let progress_tx = tx.clone();
    let progress: ProgressFn = Arc::new(move |progress: StepProgress| {
        let _ = progress_tx.unbounded_send(json_event("progress", &ProgressEvent::from(&progress)));
        future::ready(()).boxed()
    });

    let control = Arc::clone(&state.control);
    tokio::spawn(async move {
        let event = match control.analyze(request, &progress, &cancel).await {
            Ok(report) => json_event("report", &report),
            Err(ControlError::AllStepsFailed(report)) => json_event("report", &*report),
            Err(err) => Event::default().event("error").data(err.to_string()),
        };
        let _ = tx.unbounded_send(event);
    });

    let stream = rx.map(move |event| {
        let _held = &guard;
        Ok::<_, Infallible>(event)
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
