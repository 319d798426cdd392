use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::Router;
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod middleware;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::index(state.clone()))
        .merge(routes::listings())
        .merge(routes::posts())
        .merge(routes::follows())
        .merge(routes::auth())
        .merge(routes::admin())
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "request handler panicked");

    let body = serde_json::json!({ "error": "internal server error" }).to_string();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
