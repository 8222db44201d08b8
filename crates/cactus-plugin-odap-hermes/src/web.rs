//! HTTP endpoints of the ODAP gateway

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use cactus_core::web::{success, ApiSuccess};
use cactus_core::{ApiError, EndpointDescriptor};

use crate::error::OdapError;
use crate::gateway::OdapGateway;
use crate::types::{
    SendClientV1Request, SessionData, TransferInitializationRequest,
    TransferInitializationResponse,
};

pub const CLIENT_REQUEST_PATH: &str = "/api/v1/plugins/cactus-plugin-odap-hermes/clientrequest";
pub const TRANSFER_INITIATION_PATH: &str =
    "/api/v1/plugins/cactus-plugin-odap-hermes/phase1/transferinitiationrequest";
pub const SESSION_PATH: &str = "/api/v1/plugins/cactus-plugin-odap-hermes/sessions/{session_id}";

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::new(Method::POST, CLIENT_REQUEST_PATH),
        EndpointDescriptor::new(Method::POST, TRANSFER_INITIATION_PATH),
        EndpointDescriptor::new(Method::GET, SESSION_PATH),
    ]
}

pub fn router(gateway: Arc<OdapGateway>) -> Router {
    Router::new()
        .route(CLIENT_REQUEST_PATH, post(client_request))
        .route(TRANSFER_INITIATION_PATH, post(transfer_initiation_request))
        .route(SESSION_PATH, get(get_session))
        .with_state(gateway)
}

/// POST .../clientrequest
///
/// Invalid public keys fail deserialization, so they are answered with 400
/// before any peer is contacted.
async fn client_request(
    State(gateway): State<Arc<OdapGateway>>,
    payload: Result<Json<SendClientV1Request>, JsonRejection>,
) -> Result<Json<TransferInitializationResponse>, ApiError> {
    let Json(request) = payload?;
    let response = gateway.send_client_request(request).await?;
    Ok(Json(response))
}

/// POST .../phase1/transferinitiationrequest
async fn transfer_initiation_request(
    State(gateway): State<Arc<OdapGateway>>,
    payload: Result<Json<TransferInitializationRequest>, JsonRejection>,
) -> Result<Json<TransferInitializationResponse>, ApiError> {
    let Json(request) = payload?;
    let response = gateway.on_transfer_initiation_request(request).await?;
    Ok(Json(response))
}

/// GET .../sessions/{session_id}
async fn get_session(
    State(gateway): State<Arc<OdapGateway>>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiSuccess<SessionData>>, ApiError> {
    let session = gateway
        .get_session(&session_id)
        .ok_or(OdapError::SessionNotFound(session_id))?;
    Ok(success(session))
}
