//! HTTP surface for the landmarks query API.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /api/query` – Validate a search request, embed the query text, run a
//!   filtered similarity search, and return enriched matches.
//! - `POST /api/query/landmark/:id` – As above with the landmark constraint bound
//!   from the path.
//! - `GET /health` – Readiness probe reporting the crate version.
//!
//! Every request resolves a correlation ID: the first recognized header wins
//! (`X-Correlation-ID`, `X-Request-ID`, `Correlation-ID`, `Request-ID`,
//! `X-Trace-ID`, `Trace-ID`), otherwise a UUIDv4 is generated. The chosen value is
//! installed as ambient context for downstream logging, echoed in the response body,
//! and returned in the `X-Correlation-ID` response header. Non-2xx responses carry a
//! JSON body of the shape `{"error": {"code", "message", "correlation_id"}}`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::HeaderName},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tokio::time::timeout;

use crate::correlation::{generate_correlation_id, with_correlation_id};
use crate::query::{QueryApi, QueryError, QueryMatch, QueryRequest};

/// Correlation headers recognized on incoming requests, in priority order.
const CORRELATION_HEADERS: [&str; 6] = [
    "x-correlation-id",
    "x-request-id",
    "correlation-id",
    "request-id",
    "x-trace-id",
    "trace-id",
];

const CORRELATION_RESPONSE_HEADER: &str = "x-correlation-id";

/// Shared state behind the router.
pub struct ApiState<S> {
    /// Query pipeline implementation.
    pub service: Arc<S>,
    /// Set while the process is draining; requests are refused with 503.
    pub shutting_down: Arc<AtomicBool>,
    /// Per-request deadline; elapsed requests are refused with 504.
    pub request_timeout: Duration,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            shutting_down: self.shutting_down.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// Build the HTTP router exposing the query API surface.
pub fn create_router<S>(state: ApiState<S>) -> Router
where
    S: QueryApi + 'static,
{
    Router::new()
        .route("/api/query", post(query_endpoint::<S>))
        .route("/api/query/landmark/:id", post(query_landmark_endpoint::<S>))
        .route("/health", get(health))
        .with_state(state)
}

/// Success response for the query endpoints.
#[derive(Serialize)]
struct QueryResponseBody {
    matches: Vec<QueryMatch>,
    count: usize,
    correlation_id: String,
}

/// Run a search request under the resolved correlation ID.
async fn query_endpoint<S>(
    State(state): State<ApiState<S>>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Response
where
    S: QueryApi,
{
    run_query(state, headers, request).await
}

/// As [`query_endpoint`], with the landmark constraint bound from the path.
async fn query_landmark_endpoint<S>(
    State(state): State<ApiState<S>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(mut request): Json<QueryRequest>,
) -> Response
where
    S: QueryApi,
{
    request.landmark_id = Some(id);
    run_query(state, headers, request).await
}

async fn run_query<S>(state: ApiState<S>, headers: HeaderMap, request: QueryRequest) -> Response
where
    S: QueryApi,
{
    let correlation_id = extract_correlation_id(&headers);

    if state.shutting_down.load(Ordering::SeqCst) {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "shutting_down",
            "server is shutting down",
            &correlation_id,
        );
    }

    let service = state.service.clone();
    let scoped = with_correlation_id(correlation_id.clone(), async {
        service.query(request, &correlation_id).await
    });

    match timeout(state.request_timeout, scoped).await {
        Err(_) => {
            tracing::warn!(correlation_id = %correlation_id, "Query timed out");
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "query timed out",
                &correlation_id,
            )
        }
        Ok(Err(error)) => {
            let (status, code) = classify(&error);
            tracing::warn!(correlation_id = %correlation_id, error = %error, "Query failed");
            error_response(status, code, &error.to_string(), &correlation_id)
        }
        Ok(Ok(matches)) => {
            let body = QueryResponseBody {
                count: matches.len(),
                matches,
                correlation_id: correlation_id.clone(),
            };
            with_correlation_header(&correlation_id, (StatusCode::OK, Json(body)).into_response())
        }
    }
}

fn classify(error: &QueryError) -> (StatusCode, &'static str) {
    match error {
        QueryError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        QueryError::Embedding(_) | QueryError::Store(_) => (StatusCode::BAD_GATEWAY, "upstream"),
    }
}

/// Readiness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolve the request correlation ID: first recognized header wins, otherwise a
/// fresh UUIDv4.
fn extract_correlation_id(headers: &HeaderMap) -> String {
    for name in CORRELATION_HEADERS {
        if let Some(value) = headers.get(name)
            && let Ok(value) = value.to_str()
            && !value.trim().is_empty()
        {
            return value.trim().to_string();
        }
    }
    generate_correlation_id()
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    correlation_id: &str,
) -> Response {
    let body = json!({
        "error": {
            "code": code,
            "message": message,
            "correlation_id": correlation_id,
        }
    });
    with_correlation_header(correlation_id, (status, Json(body)).into_response())
}

fn with_correlation_header(correlation_id: &str, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(
            HeaderName::from_static(CORRELATION_RESPONSE_HEADER),
            value,
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tokio::sync::Mutex;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Clone, Debug)]
    struct RecordedQuery {
        request_landmark_id: Option<String>,
        correlation_id: String,
    }

    struct StubQueryService {
        calls: Mutex<Vec<RecordedQuery>>,
        response: Result<Vec<QueryMatch>, fn() -> QueryError>,
        delay: Option<Duration>,
    }

    impl StubQueryService {
        fn ok(matches: Vec<QueryMatch>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response: Ok(matches),
                delay: None,
            }
        }

        fn failing(make_error: fn() -> QueryError) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response: Err(make_error),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl QueryApi for StubQueryService {
        async fn query(
            &self,
            request: QueryRequest,
            correlation_id: &str,
        ) -> Result<Vec<QueryMatch>, QueryError> {
            self.calls.lock().await.push(RecordedQuery {
                request_landmark_id: request.landmark_id.clone(),
                correlation_id: correlation_id.to_string(),
            });
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.response {
                Ok(matches) => Ok(matches.clone()),
                Err(make_error) => Err(make_error()),
            }
        }
    }

    fn state(service: StubQueryService) -> ApiState<StubQueryService> {
        ApiState {
            service: Arc::new(service),
            shutting_down: Arc::new(AtomicBool::new(false)),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn sample_match() -> QueryMatch {
        QueryMatch {
            id: "LP-00079-chunk-0".into(),
            score: 0.87,
            landmark_id: "LP-00079".into(),
            landmark_name: Some("Brooklyn Bridge".into()),
            source_type: "pdf".into(),
            text: "The bridge opened in 1883.".into(),
            article_title: None,
            article_url: None,
        }
    }

    fn query_request(uri: &str, headers: &[(&str, &str)], body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn query_returns_matches_and_generated_correlation_id() {
        let state = state(StubQueryService::ok(vec![sample_match()]));
        let app = create_router(state.clone());

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[],
                serde_json::json!({ "query_text": "brooklyn bridge engineering", "top_k": 3 }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let header = response
            .headers()
            .get("x-correlation-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .expect("correlation header");

        let body = body_json(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["matches"][0]["landmark_id"], "LP-00079");
        let correlation_id = body["correlation_id"].as_str().expect("correlation id");
        assert_eq!(correlation_id, header);
        assert!(Uuid::parse_str(correlation_id).is_ok(), "generated IDs are UUIDs");

        let calls = state.service.calls.lock().await;
        assert_eq!(calls[0].correlation_id, correlation_id);
    }

    #[tokio::test]
    async fn correlation_header_is_passed_through() {
        let state = state(StubQueryService::ok(vec![]));
        let app = create_router(state.clone());

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[("X-Correlation-ID", "abc-123")],
                serde_json::json!({ "query_text": "wyckoff house" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-correlation-id").unwrap(),
            "abc-123"
        );
        let body = body_json(response).await;
        assert_eq!(body["correlation_id"], "abc-123");

        let calls = state.service.calls.lock().await;
        assert_eq!(calls[0].correlation_id, "abc-123");
    }

    #[tokio::test]
    async fn first_recognized_header_wins() {
        let state = state(StubQueryService::ok(vec![]));
        let app = create_router(state.clone());

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[("Trace-ID", "trace-9"), ("X-Request-ID", "req-7")],
                serde_json::json!({ "query_text": "wyckoff house" }),
            ))
            .await
            .expect("response");

        let body = body_json(response).await;
        assert_eq!(body["correlation_id"], "req-7");
    }

    #[tokio::test]
    async fn landmark_route_binds_the_path_id() {
        let state = state(StubQueryService::ok(vec![]));
        let app = create_router(state.clone());

        let response = app
            .oneshot(query_request(
                "/api/query/landmark/LP-00079",
                &[],
                serde_json::json!({ "query_text": "construction history" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let calls = state.service.calls.lock().await;
        assert_eq!(calls[0].request_landmark_id.as_deref(), Some("LP-00079"));
    }

    #[tokio::test]
    async fn validation_errors_map_to_400() {
        let state = state(StubQueryService::failing(|| {
            QueryError::Validation("top_k must be between 1 and 25".into())
        }));
        let app = create_router(state);

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[("X-Correlation-ID", "abc-123")],
                serde_json::json!({ "query_text": "bridges", "top_k": 0 }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation");
        assert_eq!(body["error"]["correlation_id"], "abc-123");
    }

    #[tokio::test]
    async fn upstream_failures_map_to_502() {
        let state = state(StubQueryService::failing(|| {
            QueryError::Store(crate::vectorstore::VectorStoreError::BatchFailed { batch: 0 })
        }));
        let app = create_router(state);

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[],
                serde_json::json!({ "query_text": "bridges" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "upstream");
    }

    #[tokio::test]
    async fn slow_queries_map_to_504() {
        let mut service = StubQueryService::ok(vec![]);
        service.delay = Some(Duration::from_secs(10));
        let mut state = state(service);
        state.request_timeout = Duration::from_millis(20);
        let app = create_router(state);

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[],
                serde_json::json!({ "query_text": "bridges" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "timeout");
    }

    #[tokio::test]
    async fn shutdown_refuses_requests_with_503() {
        let state = state(StubQueryService::ok(vec![]));
        state.shutting_down.store(true, Ordering::SeqCst);
        let app = create_router(state);

        let response = app
            .oneshot(query_request(
                "/api/query",
                &[],
                serde_json::json!({ "query_text": "bridges" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "shutting_down");
    }

    #[tokio::test]
    async fn health_reports_version() {
        let state = state(StubQueryService::ok(vec![]));
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
