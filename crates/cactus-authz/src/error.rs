//! Error types for the authorization gatekeeper

use axum::http::StatusCode;
use cactus_core::ApiError;
use thiserror::Error;

/// Result type for gatekeeper operations
pub type Result<T> = std::result::Result<T, AuthzError>;

/// Bearer header must look like this, byte for byte in the message
pub const MALFORMED_AUTHORIZATION_MESSAGE: &str = "Format is Authorization: Bearer [token]";

/// Reported when a protected operation carries no credential
pub const MISSING_TOKEN_MESSAGE: &str = "No authorization token was found";

/// Reasons an operation is rejected, or a configuration refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("{}", MISSING_TOKEN_MESSAGE)]
    MissingToken,

    #[error("{}", MALFORMED_AUTHORIZATION_MESSAGE)]
    MalformedAuthorization,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Insufficient scope, missing: {}", .missing.join(" "))]
    InsufficientScope { missing: Vec<String> },

    #[error("Invalid authorization configuration: {0}")]
    InvalidConfig(String),
}

impl AuthzError {
    /// HTTP status the dispatch layer answers with
    pub fn status(&self) -> StatusCode {
        match self {
            AuthzError::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            AuthzError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err.status() {
            StatusCode::FORBIDDEN => ApiError::Forbidden(err.to_string()),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthzError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        let reason = match err.kind() {
            ErrorKind::ExpiredSignature => "token expired".to_string(),
            ErrorKind::ImmatureSignature => "token not yet valid".to_string(),
            ErrorKind::InvalidSignature => "signature mismatch".to_string(),
            ErrorKind::InvalidAlgorithm => "algorithm not allowed".to_string(),
            ErrorKind::InvalidAudience => "audience mismatch".to_string(),
            ErrorKind::InvalidIssuer => "issuer mismatch".to_string(),
            _ => err.to_string(),
        };
        AuthzError::InvalidToken(reason)
    }
}
