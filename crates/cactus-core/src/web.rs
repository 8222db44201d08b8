//! HTTP surface shared by web-service plugins
//!
//! Every failure leaves the gateway in the same envelope,
//! `{"success": false, "error": "...", "code": "..."}`, with no `data` field.

use std::collections::BTreeSet;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::CactusError;

/// One operation exposed by a web-service plugin.
///
/// `path` uses the router's template syntax (`/sessions/{session_id}`).
/// Scopes are declared by the handler, never by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub path: String,
    pub http_verb: Method,
    pub required_scopes: BTreeSet<String>,
    /// Opens a persistent channel, authorized once at handshake
    pub realtime: bool,
}

impl EndpointDescriptor {
    pub fn new(http_verb: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            http_verb,
            required_scopes: BTreeSet::new(),
            realtime: false,
        }
    }

    /// Mark the endpoint as a persistent real-time channel
    pub fn realtime_channel(mut self) -> Self {
        self.realtime = true;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scopes.insert(scope.into());
        self
    }
}

/// Successful response envelope
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap `data` in the success envelope
pub fn success<T: Serialize>(data: T) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess {
        success: true,
        data,
    })
}

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream failure: {0}")]
    BadGateway(String),

    #[error("Upstream timeout: {0}")]
    GatewayTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::GatewayTimeout(_) => "GATEWAY_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadGateway(msg)
            | ApiError::GatewayTimeout(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message().to_string(),
            code: self.code().to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<CactusError> for ApiError {
    fn from(err: CactusError) -> Self {
        match err {
            CactusError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            CactusError::SerializationError(msg) => ApiError::BadRequest(msg),
            CactusError::NotFound(msg) => ApiError::NotFound(msg),
            CactusError::VerificationFailed(msg) => ApiError::Unauthorized(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}
