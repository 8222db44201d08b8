//! Error types shared by every Cactus crate

use thiserror::Error;

/// Result type alias using CactusError
pub type Result<T> = std::result::Result<T, CactusError>;

/// Errors that can occur in the Cactus core
#[derive(Error, Debug)]
pub enum CactusError {
    /// Empty or malformed identifier, key or argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Registry or keychain lookup found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// A signature did not verify against the supplied key
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Key material could not be parsed or encoded
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A plugin failed while serving a request
    #[error("Plugin error: {0}")]
    PluginError(String),
}

impl From<ed25519_dalek::SignatureError> for CactusError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        CactusError::VerificationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for CactusError {
    fn from(err: serde_json::Error) -> Self {
        CactusError::SerializationError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for CactusError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                CactusError::VerificationFailed(err.to_string())
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => CactusError::SerializationError(err.to_string()),
            _ => CactusError::CryptoError(err.to_string()),
        }
    }
}
