//! HTTP client for a node's consortium endpoints

use std::time::Duration;

use cactus_core::GeneralJws;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ConsortiumError, Result};
use crate::web::{
    GetConsortiumJwsResponse, GetNodeJwsResponse, CONSORTIUM_JWS_PATH, NODE_JWS_PATH,
    PROMETHEUS_METRICS_PATH,
};

/// Calls the consortium endpoints of one node
#[derive(Debug, Clone)]
pub struct ConsortiumApiClient {
    base_url: String,
    node_id: String,
    http: reqwest::Client,
}

impl ConsortiumApiClient {
    /// Client for the node at `base_url` with the given request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsortiumError::HttpClient(e.to_string()))?;
        let base_url = base_url.into();
        Ok(Self::with_client(base_url.clone(), base_url, http))
    }

    /// Reuse an existing transport. `node_id` labels errors.
    pub fn with_client(
        base_url: impl Into<String>,
        node_id: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            node_id: node_id.into(),
            http,
        }
    }

    pub async fn get_node_jws(&self) -> Result<String> {
        let response: GetNodeJwsResponse = self.post(NODE_JWS_PATH).await?;
        Ok(response.jws)
    }

    pub async fn get_consortium_jws(&self) -> Result<GeneralJws> {
        let response: GetConsortiumJwsResponse = self.post(CONSORTIUM_JWS_PATH).await?;
        Ok(response.jws)
    }

    pub async fn get_prometheus_metrics(&self) -> Result<String> {
        let url = format!("{}{}", self.base_url, PROMETHEUS_METRICS_PATH);
        let response = self.http.get(&url).send().await.map_err(|e| self.transport_error(e))?;
        let response = self.check_status(response)?;
        response.text().await.map_err(|e| self.transport_error(e))
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(node_id = %self.node_id, url = %url, "Requesting attestation");
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = self.check_status(response)?;
        response.json().await.map_err(|e| self.transport_error(e))
    }

    fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ConsortiumError::PeerRejected {
                node_id: self.node_id.clone(),
                status: response.status().as_u16(),
            })
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> ConsortiumError {
        if err.is_timeout() {
            ConsortiumError::PeerTimeout {
                node_id: self.node_id.clone(),
                reason: err.to_string(),
            }
        } else {
            ConsortiumError::PeerUnreachable {
                node_id: self.node_id.clone(),
                reason: err.to_string(),
            }
        }
    }
}
