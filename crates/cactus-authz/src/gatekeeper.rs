//! Authorization Gatekeeper
//!
//! A synchronous predicate over one inbound operation:
//! exemption check, then token validation (401), then scope check (403).
//! Holds only immutable configuration, so one instance serves any number of
//! concurrent requests.

use std::collections::{BTreeSet, HashMap};

use jsonwebtoken::decode;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{AuthorizationConfig, TokenVerifier};
use crate::error::{AuthzError, Result};

/// Claims extracted from a validated token
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub iss: Option<String>,

    /// Granted scopes. Accepts an array or a space-delimited string.
    #[serde(default, deserialize_with = "deserialize_scope")]
    pub scope: BTreeSet<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn deserialize_scope<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scope {
        List(Vec<String>),
        Delimited(String),
    }

    Ok(match Option::<Scope>::deserialize(deserializer)? {
        Some(Scope::List(list)) => list.into_iter().collect(),
        Some(Scope::Delimited(s)) => s.split_whitespace().map(str::to_string).collect(),
        None => BTreeSet::new(),
    })
}

/// Caller identity attached to an allowed operation
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub claims: TokenClaims,
}

impl Identity {
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.claims.scope
    }
}

/// An inbound request/response operation as the dispatch layer sees it
#[derive(Debug, Clone, Copy)]
pub struct InboundOperation<'a> {
    pub path: &'a str,
    pub authorization: Option<&'a str>,
    pub required_scopes: &'a BTreeSet<String>,
}

/// Outcome of a successful authorization
#[derive(Debug, Clone, PartialEq)]
pub enum Authorized {
    /// Path is exempt; no identity context
    Exempt,
    /// Token valid and scopes sufficient
    Authenticated(Identity),
}

/// Authorization Gatekeeper
#[derive(Clone)]
pub struct AuthorizationGatekeeper {
    exemptions: BTreeSet<String>,
    http: TokenVerifier,
    realtime: TokenVerifier,
    realtime_channel_path: String,
}

impl std::fmt::Debug for AuthorizationGatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGatekeeper")
            .field("exemptions", &self.exemptions)
            .field("algorithms", &self.http.validation.algorithms)
            .field("realtime_channel_path", &self.realtime_channel_path)
            .finish()
    }
}

impl AuthorizationGatekeeper {
    /// Validate `config` and build the gatekeeper that owns it
    pub fn new(config: AuthorizationConfig) -> Result<Self> {
        config.validate()?;
        let tv = &config.token_validation;
        let http = TokenVerifier::new(
            &tv.secret_or_public_key,
            &tv.algorithms,
            tv.audience.as_deref(),
            tv.issuer.as_deref(),
        )?;
        let realtime = match &config.realtime_channel {
            Some(rt) => TokenVerifier::new(&rt.secret_or_public_key, &rt.algorithms, None, None)?,
            None => TokenVerifier::new(&tv.secret_or_public_key, &tv.algorithms, None, None)?,
        };

        Ok(Self {
            exemptions: config.unprotected_endpoint_exemptions,
            http,
            realtime,
            realtime_channel_path: config.realtime_channel_path,
        })
    }

    /// Exact-match exemption check
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exemptions.contains(path)
    }

    /// Whether `path` belongs to the persistent channel
    pub fn is_realtime_path(&self, path: &str) -> bool {
        path == self.realtime_channel_path
            || path
                .strip_prefix(self.realtime_channel_path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn realtime_channel_path(&self) -> &str {
        &self.realtime_channel_path
    }

    /// Authorize one request/response operation
    pub fn authorize(&self, op: InboundOperation<'_>) -> Result<Authorized> {
        if self.is_exempt(op.path) {
            debug!(path = %op.path, "Exempt endpoint");
            return Ok(Authorized::Exempt);
        }

        let identity = self
            .validate(&self.http, op.authorization)
            .inspect_err(|e| warn!(path = %op.path, error = %e, "Rejected request token"))?;

        let missing: Vec<String> = op
            .required_scopes
            .difference(identity.scopes())
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(path = %op.path, missing = ?missing, "Insufficient scope");
            return Err(AuthzError::InsufficientScope { missing });
        }

        Ok(Authorized::Authenticated(identity))
    }

    /// Authorize a persistent connection at handshake time.
    ///
    /// Messages on an accepted connection are not re-checked.
    pub fn authorize_handshake(&self, authorization: Option<&str>) -> Result<Identity> {
        self.validate(&self.realtime, authorization)
            .inspect_err(|e| warn!(error = %e, "Rejected real-time handshake"))
    }

    fn validate(&self, verifier: &TokenVerifier, authorization: Option<&str>) -> Result<Identity> {
        let token = bearer_token(authorization)?;
        let data = decode::<TokenClaims>(token, &verifier.key, &verifier.validation)?;
        Ok(Identity {
            claims: data.claims,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let value = authorization.ok_or(AuthzError::MissingToken)?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthzError::MalformedAuthorization),
    }
}
