//! Manually administered consortium plugin
//!
//! Each node signs its own copy of the topology database. A consortium
//! attestation gathers one signature per member node over that same
//! payload, so a caller holding every member's `publicKeyPem` can confirm the
//! nodes agree without trusting any single one of them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cactus_core::checks::non_blank_string;
use cactus_core::jws::{sign_compact, verify_compact};
use cactus_core::{
    CactusNode, CactusPlugin, ConsortiumDatabase, ConsortiumPlugin, EndpointDescriptor,
    GeneralJws, KeyPair, PluginCapability, PublicKey, WebServicePlugin,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::ConsortiumApiClient;
use crate::error::{ConsortiumError, Result};
use crate::metrics::PrometheusExporter;
use crate::repository::ConsortiumRepository;

pub const PACKAGE_NAME: &str = "cactus-plugin-consortium-manual";

fn default_peer_timeout_ms() -> u64 {
    5_000
}

/// Construction options, as they appear in a plugin import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsortiumManualOptions {
    pub instance_id: String,

    /// PKCS#8 PEM of this node's signing key
    pub key_pair_pem: String,

    #[serde(default)]
    pub consortium_database: ConsortiumDatabase,

    /// Timeout for attestation requests to other nodes
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
}

/// Payload every node attestation signs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeJwsPayload {
    pub consortium_database: ConsortiumDatabase,
}

/// Consortium trust service
pub struct PluginConsortiumManual {
    instance_id: String,
    key_pair: KeyPair,
    public_key_pem: String,
    repository: ConsortiumRepository,
    metrics: PrometheusExporter,
    http: reqwest::Client,
}

impl std::fmt::Debug for PluginConsortiumManual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginConsortiumManual")
            .field("instance_id", &self.instance_id)
            .field("key_pair", &self.key_pair)
            .finish()
    }
}

impl PluginConsortiumManual {
    pub fn new(options: ConsortiumManualOptions) -> Result<Self> {
        non_blank_string(&options.instance_id, "instanceId")?;
        let key_pair = KeyPair::from_pkcs8_pem(&options.key_pair_pem)?;
        let public_key_pem = key_pair.public_key().to_public_key_pem()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(options.peer_timeout_ms))
            .build()
            .map_err(|e| ConsortiumError::HttpClient(e.to_string()))?;

        let repository = ConsortiumRepository::new(options.consortium_database);
        let metrics = PrometheusExporter::new()?;
        metrics.set_total_node_count(repository.node_count());

        info!(
            instance_id = %options.instance_id,
            nodes = repository.node_count(),
            "Consortium plugin initialized"
        );

        Ok(Self {
            instance_id: options.instance_id,
            key_pair,
            public_key_pem,
            repository,
            metrics,
            http,
        })
    }

    /// SPKI PEM of this node's verification key
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    pub fn prometheus_exporter(&self) -> &PrometheusExporter {
        &self.metrics
    }

    pub fn consortium_database(&self) -> ConsortiumDatabase {
        self.repository.snapshot()
    }

    /// Append a node to the local database and bump the node-count gauge
    pub fn add_cactus_node(&self, node: CactusNode) {
        let count = self.repository.add_cactus_node(node);
        self.metrics.set_total_node_count(count);
    }

    /// Text exposition of this plugin's metrics
    pub fn get_prometheus_metrics(&self) -> Result<String> {
        self.metrics.set_total_node_count(self.repository.node_count());
        self.metrics.get_prometheus_metrics()
    }

    /// Sign the local database with this node's key.
    ///
    /// The result is a compact JWS whose payload is `{"consortiumDatabase": ...}`.
    pub fn sign_node_jws(&self) -> Result<String> {
        let consortium_database = self.repository.snapshot();
        self.metrics
            .set_total_node_count(consortium_database.cactus_node.len());

        let kid = consortium_database
            .node_by_public_key_pem(&self.public_key_pem)
            .map(|n| n.id.clone());
        let payload = NodeJwsPayload {
            consortium_database,
        };
        let jws = sign_compact(&payload, &self.key_pair, kid.as_deref())?;
        debug!(instance_id = %self.instance_id, kid = ?kid, "Signed node attestation");
        Ok(jws)
    }

    /// Collect every member node's attestation and combine them.
    ///
    /// This node signs locally. Other nodes are asked over HTTP. Every
    /// attestation is checked against its node's `publicKeyPem` before it is
    /// included, and all of them must carry the same payload.
    pub async fn collect_consortium_jws(&self) -> Result<GeneralJws> {
        let database = self.repository.snapshot();
        if database.cactus_node.is_empty() {
            return Err(cactus_core::CactusError::InvalidArgument(
                "Consortium database lists no nodes".into(),
            )
            .into());
        }

        let attestations = try_join_all(
            database
                .cactus_node
                .iter()
                .map(|node| self.fetch_verified_node_jws(node)),
        )
        .await?;

        let general = GeneralJws::from_compact(
            attestations
                .iter()
                .map(|(node_id, jws)| (jws.as_str(), Some(node_id.clone()))),
        )?;
        info!(
            instance_id = %self.instance_id,
            signatures = general.signatures.len(),
            "Assembled consortium attestation"
        );
        Ok(general)
    }

    async fn fetch_verified_node_jws(&self, node: &CactusNode) -> Result<(String, String)> {
        let is_self = node.public_key_pem.trim() == self.public_key_pem.trim();
        let jws = if is_self {
            self.sign_node_jws()?
        } else {
            ConsortiumApiClient::with_client(&node.node_api_host, &node.id, self.http.clone())
                .get_node_jws()
                .await?
        };

        let verification_failed = |reason: String| ConsortiumError::VerificationFailed {
            node_id: node.id.clone(),
            reason,
        };
        let public_key = PublicKey::from_public_key_pem(&node.public_key_pem)
            .map_err(|e| verification_failed(e.to_string()))?;
        verify_compact::<Value, _>(&jws, &public_key).map_err(|e| {
            warn!(node_id = %node.id, error = %e, "Rejected node attestation");
            verification_failed(e.to_string())
        })?;

        Ok((node.id.clone(), jws))
    }
}

/// Verify a consortium attestation against every expected member key.
///
/// Fails on the first key that matches no signature.
pub fn verify_consortium_jws(jws: &GeneralJws, public_key_pems: &[String]) -> Result<NodeJwsPayload> {
    let mut payload = None;
    for pem in public_key_pems {
        let key = PublicKey::from_public_key_pem(pem)?;
        payload = Some(jws.verify::<NodeJwsPayload, _>(&key)?);
    }
    payload.ok_or_else(|| {
        cactus_core::CactusError::InvalidArgument("No member keys supplied".into()).into()
    })
}

impl CactusPlugin for PluginConsortiumManual {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn package_name(&self) -> &str {
        PACKAGE_NAME
    }

    fn capabilities(self: Arc<Self>) -> Vec<PluginCapability> {
        vec![
            PluginCapability::Consortium(self.clone()),
            PluginCapability::WebService(self),
        ]
    }
}

#[async_trait]
impl ConsortiumPlugin for PluginConsortiumManual {
    async fn get_node_jws(&self) -> cactus_core::Result<String> {
        Ok(self.sign_node_jws()?)
    }

    async fn get_consortium_jws(&self) -> cactus_core::Result<GeneralJws> {
        Ok(self.collect_consortium_jws().await?)
    }
}

impl WebServicePlugin for PluginConsortiumManual {
    fn endpoints(&self) -> Vec<EndpointDescriptor> {
        crate::web::endpoints()
    }

    fn router(self: Arc<Self>) -> axum::Router {
        crate::web::router(self)
    }
}
