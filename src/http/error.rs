use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::validation::FieldErrors;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    location: Option<String>,
    fields: Option<FieldErrors>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

pub const LOGIN_PATH: &str = "/auth/login/";

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            location: None,
            fields: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 302 to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        let mut err = Self::new(StatusCode::FOUND, "redirect");
        err.location = Some(location.into());
        err
    }

    /// 302 to the login page carrying `next` so the client can come back.
    pub fn login_required(next: &str) -> Self {
        Self::redirect(login_location(next))
    }

    pub fn validation(fields: FieldErrors) -> Self {
        let mut err = Self::new(StatusCode::BAD_REQUEST, "invalid form");
        err.fields = Some(fields);
        err
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

pub fn login_location(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_PATH, encoded)
}

impl From<FieldErrors> for AppError {
    fn from(fields: FieldErrors) -> Self {
        Self::validation(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(location) = self.location {
            return (self.status, [(header::LOCATION, location)]).into_response();
        }

        let body = Json(ErrorResponse {
            error: self.message,
            fields: self.fields,
        });
        (self.status, body).into_response()
    }
}
