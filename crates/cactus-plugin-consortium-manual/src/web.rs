//! HTTP endpoints of the consortium plugin

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use cactus_core::{ApiError, EndpointDescriptor, GeneralJws};
use serde::{Deserialize, Serialize};

use crate::plugin::PluginConsortiumManual;

pub const NODE_JWS_PATH: &str = "/api/v1/plugins/cactus-plugin-consortium-manual/node/jws";
pub const CONSORTIUM_JWS_PATH: &str =
    "/api/v1/plugins/cactus-plugin-consortium-manual/consortium/jws";
pub const PROMETHEUS_METRICS_PATH: &str =
    "/api/v1/plugins/cactus-plugin-consortium-manual/get-prometheus-exporter-metrics";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetNodeJwsResponse {
    pub jws: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetConsortiumJwsResponse {
    pub jws: GeneralJws,
}

pub fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        EndpointDescriptor::new(Method::POST, NODE_JWS_PATH),
        EndpointDescriptor::new(Method::POST, CONSORTIUM_JWS_PATH),
        EndpointDescriptor::new(Method::GET, PROMETHEUS_METRICS_PATH),
    ]
}

pub fn router(plugin: Arc<PluginConsortiumManual>) -> Router {
    Router::new()
        .route(NODE_JWS_PATH, post(get_node_jws))
        .route(CONSORTIUM_JWS_PATH, post(get_consortium_jws))
        .route(PROMETHEUS_METRICS_PATH, get(get_prometheus_metrics))
        .with_state(plugin)
}

/// POST .../node/jws
async fn get_node_jws(
    State(plugin): State<Arc<PluginConsortiumManual>>,
) -> Result<Json<GetNodeJwsResponse>, ApiError> {
    let jws = plugin.sign_node_jws()?;
    Ok(Json(GetNodeJwsResponse { jws }))
}

/// POST .../consortium/jws
async fn get_consortium_jws(
    State(plugin): State<Arc<PluginConsortiumManual>>,
) -> Result<Json<GetConsortiumJwsResponse>, ApiError> {
    let jws = plugin.collect_consortium_jws().await?;
    Ok(Json(GetConsortiumJwsResponse { jws }))
}

/// GET .../get-prometheus-exporter-metrics
async fn get_prometheus_metrics(
    State(plugin): State<Arc<PluginConsortiumManual>>,
) -> Result<impl IntoResponse, ApiError> {
    let text = plugin.get_prometheus_metrics()?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}
