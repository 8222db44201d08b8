//! Error types for the ODAP gateway

use cactus_core::{ApiError, CactusError};
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, OdapError>;

#[derive(Error, Debug)]
pub enum OdapError {
    #[error(transparent)]
    Core(#[from] CactusError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Signature check failed: {0}")]
    VerificationFailed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Peer gateway did not answer within the negotiation timeout
    #[error("Negotiation timed out: {0}")]
    NegotiationTimeout(String),

    /// Peer gateway unreachable, or it rejected the request
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl From<OdapError> for ApiError {
    fn from(err: OdapError) -> Self {
        match err {
            OdapError::Core(inner) => inner.into(),
            OdapError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            OdapError::VerificationFailed(msg) => ApiError::Unauthorized(msg),
            OdapError::SessionNotFound(id) => ApiError::NotFound(format!("No session {}", id)),
            OdapError::NegotiationTimeout(msg) => ApiError::GatewayTimeout(msg),
            OdapError::NegotiationFailed(msg) => ApiError::BadGateway(msg),
            OdapError::HttpClient(msg) => ApiError::Internal(msg),
        }
    }
}
