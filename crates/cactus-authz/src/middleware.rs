//! axum integration
//!
//! Install with `Router::route_layer` so the matched route template is known
//! when scopes are looked up.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header::AUTHORIZATION, Method},
    middleware::Next,
    response::Response,
};
use cactus_core::{ApiError, EndpointDescriptor};

use crate::error::AuthzError;
use crate::gatekeeper::{AuthorizationGatekeeper, Authorized, InboundOperation};

/// What a route declared about itself
struct RouteRule {
    required_scopes: BTreeSet<String>,
    realtime: bool,
}

/// Gatekeeper plus the rules each route declared
#[derive(Clone)]
pub struct AuthorizationState {
    gatekeeper: Arc<AuthorizationGatekeeper>,
    routes: Arc<HashMap<(Method, String), RouteRule>>,
}

impl AuthorizationState {
    pub fn new<I>(gatekeeper: AuthorizationGatekeeper, endpoints: I) -> Self
    where
        I: IntoIterator<Item = EndpointDescriptor>,
    {
        let routes = endpoints
            .into_iter()
            .map(|e| {
                let rule = RouteRule {
                    required_scopes: e.required_scopes,
                    realtime: e.realtime,
                };
                ((e.http_verb, e.path), rule)
            })
            .collect();
        Self {
            gatekeeper: Arc::new(gatekeeper),
            routes: Arc::new(routes),
        }
    }

    pub fn gatekeeper(&self) -> &AuthorizationGatekeeper {
        &self.gatekeeper
    }
}

/// Middleware that runs the gatekeeper before the handler.
///
/// Allowed requests carry the caller's [`crate::Identity`] in their
/// extensions. Exempt requests carry none.
pub async fn authorize_request(
    State(state): State<AuthorizationState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map(str::to_string))
        .transpose()
        .map_err(|_| AuthzError::MalformedAuthorization)?;

    let template = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let rule = state.routes.get(&(request.method().clone(), template));

    // Only routes declared as real-time channels get the handshake check.
    // Everything else, wherever it is mounted, goes through the scope check.
    let gatekeeper = &state.gatekeeper;
    let is_channel = rule.is_some_and(|r| r.realtime) && gatekeeper.is_realtime_path(&path);
    if is_channel && !gatekeeper.is_exempt(&path) {
        let identity = gatekeeper.authorize_handshake(authorization.as_deref())?;
        request.extensions_mut().insert(identity);
        return Ok(next.run(request).await);
    }

    let no_scopes = BTreeSet::new();
    let required_scopes = rule.map(|r| &r.required_scopes).unwrap_or(&no_scopes);

    let outcome = gatekeeper.authorize(InboundOperation {
        path: &path,
        authorization: authorization.as_deref(),
        required_scopes,
    })?;
    if let Authorized::Authenticated(identity) = outcome {
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}
