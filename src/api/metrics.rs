//! HTTP instrumentation
//!
//! Serves the Prometheus scrape endpoint and the middleware that feeds the
//! HTTP request collectors.

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, REGISTRY, observe_http};

/// Label used when a request did not match any route
const UNMATCHED_ENDPOINT: &str = "unmatched";

/// GET /metrics
async fn scrape() -> Result<Response, AppError> {
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    )
        .into_response())
}

/// Router exposing `/metrics`; stateless, so it merges into any router.
pub fn metrics_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/metrics", get(scrape))
}

/// Time and count every routed request, error responses included.
///
/// Endpoints are labelled by route template (`/api/v1/users/:id`), not by
/// the concrete URI, to keep label cardinality bounded.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ENDPOINT.to_owned(), |path| path.as_str().to_owned());

    let timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &endpoint])
        .start_timer();
    let response = next.run(request).await;
    timer.observe_duration();

    observe_http(&method, &endpoint, response.status().as_u16());
    response
}
