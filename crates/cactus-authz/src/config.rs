//! Authorization configuration
//!
//! Deserialized once at startup and validated into the key material the
//! gatekeeper holds for its lifetime.

use std::collections::BTreeSet;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};

/// Options for request/response token validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenValidationOptions {
    /// Accepted algorithms, all from one key family
    pub algorithms: Vec<Algorithm>,

    /// HMAC secret, or a PEM public key for asymmetric families
    pub secret_or_public_key: String,

    /// Required `aud` claim value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    /// Required `iss` claim value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

/// Options for the persistent real-time channel handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeChannelOptions {
    pub secret_or_public_key: String,
    pub algorithms: Vec<Algorithm>,
}

/// Authorization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Paths that skip every check. Exact string match.
    #[serde(default)]
    pub unprotected_endpoint_exemptions: BTreeSet<String>,

    pub token_validation: TokenValidationOptions,

    /// Defaults to the token validation key and algorithms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realtime_channel: Option<RealtimeChannelOptions>,

    /// Prefix under which persistent channels are served
    #[serde(default = "default_realtime_channel_path")]
    pub realtime_channel_path: String,
}

pub fn default_realtime_channel_path() -> String {
    "/api/v1/async".to_string()
}

impl AuthorizationConfig {
    /// Config with no exemptions and a default real-time channel
    pub fn new(token_validation: TokenValidationOptions) -> Self {
        Self {
            unprotected_endpoint_exemptions: BTreeSet::new(),
            token_validation,
            realtime_channel: None,
            realtime_channel_path: default_realtime_channel_path(),
        }
    }

    pub fn with_exemption(mut self, path: impl Into<String>) -> Self {
        self.unprotected_endpoint_exemptions.insert(path.into());
        self
    }

    pub fn with_realtime_channel(mut self, options: RealtimeChannelOptions) -> Self {
        self.realtime_channel = Some(options);
        self
    }

    /// Check the configuration without building a gatekeeper
    pub fn validate(&self) -> Result<()> {
        TokenVerifier::new(
            &self.token_validation.secret_or_public_key,
            &self.token_validation.algorithms,
            self.token_validation.audience.as_deref(),
            self.token_validation.issuer.as_deref(),
        )?;
        if let Some(realtime) = &self.realtime_channel {
            TokenVerifier::new(&realtime.secret_or_public_key, &realtime.algorithms, None, None)?;
        }
        if !self.realtime_channel_path.starts_with('/') {
            return Err(AuthzError::InvalidConfig(format!(
                "realtime_channel_path must start with '/', got {:?}",
                self.realtime_channel_path
            )));
        }
        Ok(())
    }
}

/// Key family an algorithm belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    pub fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => KeyFamily::Hmac,
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => KeyFamily::Rsa,
            Algorithm::ES256 | Algorithm::ES384 => KeyFamily::Ec,
            Algorithm::EdDSA => KeyFamily::Ed,
        }
    }
}

/// Validated key and claim rules for one channel
#[derive(Clone)]
pub(crate) struct TokenVerifier {
    pub(crate) key: DecodingKey,
    pub(crate) validation: Validation,
}

impl TokenVerifier {
    pub(crate) fn new(
        secret_or_public_key: &str,
        algorithms: &[Algorithm],
        audience: Option<&str>,
        issuer: Option<&str>,
    ) -> Result<Self> {
        if secret_or_public_key.trim().is_empty() {
            return Err(AuthzError::InvalidConfig(
                "secret_or_public_key must not be empty".into(),
            ));
        }
        let first = *algorithms.first().ok_or_else(|| {
            AuthzError::InvalidConfig("at least one algorithm is required".into())
        })?;
        let family = KeyFamily::of(first);
        if let Some(other) = algorithms.iter().find(|a| KeyFamily::of(**a) != family) {
            return Err(AuthzError::InvalidConfig(format!(
                "algorithms {:?} and {:?} need different key types",
                first, other
            )));
        }

        let key_error = |e: jsonwebtoken::errors::Error| {
            AuthzError::InvalidConfig(format!("unusable {:?} key: {}", family, e))
        };
        let key = match family {
            KeyFamily::Hmac => DecodingKey::from_secret(secret_or_public_key.as_bytes()),
            KeyFamily::Rsa => {
                DecodingKey::from_rsa_pem(secret_or_public_key.as_bytes()).map_err(key_error)?
            }
            KeyFamily::Ec => {
                DecodingKey::from_ec_pem(secret_or_public_key.as_bytes()).map_err(key_error)?
            }
            KeyFamily::Ed => {
                DecodingKey::from_ed_pem(secret_or_public_key.as_bytes()).map_err(key_error)?
            }
        };

        let mut validation = Validation::new(first);
        validation.algorithms = algorithms.to_vec();
        // exp is checked when present; only configured claims are mandatory
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        match audience {
            Some(aud) => {
                validation.set_audience(&[aud]);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
            validation.required_spec_claims.insert("iss".to_string());
        }

        Ok(Self { key, validation })
    }
}
