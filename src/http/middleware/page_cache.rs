use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::AppError;
use crate::AppState;

/// Cached listing pages are small; anything larger is served uncached.
const MAX_CACHED_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Serves whole response bodies out of the page cache, keyed by path and
/// query string. Only successful responses are stored. Routes behind this
/// layer must render the same body for every viewer.
pub async fn page_cache_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.page_cache.is_enabled() {
        return Ok(next.run(request).await);
    }

    let route = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if let Some(body) = state.page_cache.get(&route).await {
        tracing::debug!(route = %route, "page cache hit");
        return Ok(json_response(Body::from(body)));
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, MAX_CACHED_BODY_BYTES).await.map_err(|err| {
        tracing::error!(error = ?err, route = %route, "failed to buffer page body");
        AppError::internal("failed to render page")
    })?;

    state.page_cache.put(&route, &bytes).await;
    Ok(Response::from_parts(parts, Body::from(bytes)))
}

fn json_response(body: Body) -> Response {
    let mut response = body.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
