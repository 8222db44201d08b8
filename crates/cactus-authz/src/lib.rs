//! # Cactus Authz
//!
//! Gatekeeper in front of every gateway endpoint.
//!
//! ## Decision order
//!
//! 1. **Exemption**: exact path match against the configured list, skips everything else
//! 2. **Token**: bearer JWT signature, algorithm, `exp`, and configured `iss`/`aud` (401)
//! 3. **Scope**: the token's `scope` claim must cover the endpoint's declared scopes (403)
//!
//! Persistent real-time connections are checked once, at handshake.

pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod middleware;

pub use config::{AuthorizationConfig, RealtimeChannelOptions, TokenValidationOptions};
pub use error::{AuthzError, Result, MALFORMED_AUTHORIZATION_MESSAGE, MISSING_TOKEN_MESSAGE};
pub use gatekeeper::{
    bearer_token, AuthorizationGatekeeper, Authorized, Identity, InboundOperation, TokenClaims,
};
pub use middleware::{authorize_request, AuthorizationState};
