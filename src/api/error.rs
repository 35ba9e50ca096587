use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::protocol::WireError;

/// Failures outside the BOINC protocol's own error reporting.
#[derive(Debug)]
pub enum ApiError {
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Self::InternalError(msg) = &self;
        tracing::error!("Internal error: {}", msg);

        let body = ApiResponse::<()>::error("An internal error occurred");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<WireError> for ApiError {
    fn from(err: WireError) -> Self {
        Self::InternalError(err.to_string())
    }
}
