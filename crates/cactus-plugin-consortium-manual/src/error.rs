//! Error types for the consortium plugin

use cactus_core::{ApiError, CactusError};
use thiserror::Error;

/// Result type for consortium operations
pub type Result<T> = std::result::Result<T, ConsortiumError>;

#[derive(Error, Debug)]
pub enum ConsortiumError {
    #[error(transparent)]
    Core(#[from] CactusError),

    #[error("Node {node_id} did not answer in time: {reason}")]
    PeerTimeout { node_id: String, reason: String },

    #[error("Node {node_id} is unreachable: {reason}")]
    PeerUnreachable { node_id: String, reason: String },

    #[error("Node {node_id} refused the request with status {status}")]
    PeerRejected { node_id: String, status: u16 },

    #[error("Attestation of node {node_id} failed verification: {reason}")]
    VerificationFailed { node_id: String, reason: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<prometheus::Error> for ConsortiumError {
    fn from(err: prometheus::Error) -> Self {
        ConsortiumError::Metrics(err.to_string())
    }
}

impl From<ConsortiumError> for CactusError {
    fn from(err: ConsortiumError) -> Self {
        match err {
            ConsortiumError::Core(inner) => inner,
            ConsortiumError::VerificationFailed { .. } => {
                CactusError::VerificationFailed(err.to_string())
            }
            other => CactusError::PluginError(other.to_string()),
        }
    }
}

impl From<ConsortiumError> for ApiError {
    fn from(err: ConsortiumError) -> Self {
        match err {
            ConsortiumError::Core(inner) => inner.into(),
            ConsortiumError::PeerTimeout { .. } => ApiError::GatewayTimeout(err.to_string()),
            ConsortiumError::PeerUnreachable { .. }
            | ConsortiumError::PeerRejected { .. }
            | ConsortiumError::VerificationFailed { .. } => ApiError::BadGateway(err.to_string()),
            ConsortiumError::HttpClient(msg) | ConsortiumError::Metrics(msg) => {
                ApiError::Internal(msg)
            }
        }
    }
}
