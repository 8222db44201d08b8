//! Shared fixtures for API server integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{http::Method, routing::get, Router};
use cactus_api_server::{ApiServer, ApiServerConfig, RunningServer, HEALTH_CHECK_PATH};
use cactus_authz::{AuthorizationConfig, TokenValidationOptions};
use cactus_core::web::success;
use cactus_core::{
    CactusPlugin, EndpointDescriptor, LedgerConnectorPlugin, PluginCapability, PluginRegistry,
    WebServicePlugin,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const SECRET: &str = "cactus-test-secret-0123456789";
pub const ISSUER: &str = "hyperledger-labs";
pub const AUDIENCE: &str = "carbon-accounting-tool";
pub const LEDGER_INFO_PATH: &str = "/api/v1/plugins/cactus-test-ledger-connector/ledger-info";
pub const READ_LEDGER_SCOPE: &str = "read:ledger";

// =============================================================================
// Ledger connector stub
// =============================================================================

/// Connector whose only endpoint requires `read:ledger`
pub struct TestLedgerConnector {
    instance_id: String,
}

impl TestLedgerConnector {
    pub fn new(instance_id: &str) -> Arc<Self> {
        Arc::new(Self {
            instance_id: instance_id.into(),
        })
    }
}

impl CactusPlugin for TestLedgerConnector {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn package_name(&self) -> &str {
        "cactus-test-ledger-connector"
    }

    fn capabilities(self: Arc<Self>) -> Vec<PluginCapability> {
        vec![
            PluginCapability::LedgerConnector(self.clone()),
            PluginCapability::WebService(self),
        ]
    }
}

#[async_trait]
impl LedgerConnectorPlugin for TestLedgerConnector {
    async fn deploy_contract(&self, _request: Value) -> cactus_core::Result<Value> {
        Ok(json!({"contractAddress": "0x0000000000000000000000000000000000000001"}))
    }

    async fn transact(&self, request: Value) -> cactus_core::Result<Value> {
        Ok(json!({"accepted": true, "request": request}))
    }
}

impl WebServicePlugin for TestLedgerConnector {
    fn endpoints(&self) -> Vec<EndpointDescriptor> {
        vec![EndpointDescriptor::new(Method::GET, LEDGER_INFO_PATH).with_scope(READ_LEDGER_SCOPE)]
    }

    fn router(self: Arc<Self>) -> Router {
        Router::new().route(
            LEDGER_INFO_PATH,
            get(|| async { success(json!({"ledger": "test-ledger", "blockHeight": 42})) }),
        )
    }
}

// =============================================================================
// Configuration and tokens
// =============================================================================

pub fn authorization_config() -> AuthorizationConfig {
    AuthorizationConfig::new(TokenValidationOptions {
        algorithms: vec![Algorithm::HS256],
        secret_or_public_key: SECRET.into(),
        audience: Some(AUDIENCE.into()),
        issuer: Some(ISSUER.into()),
    })
    .with_exemption(HEALTH_CHECK_PATH)
}

pub fn protected_config() -> ApiServerConfig {
    let mut config = ApiServerConfig::with_authorization(authorization_config());
    config.realtime_heartbeat_ms = 50;
    config
}

pub fn token(scopes: &[&str]) -> String {
    let claims = json!({
        "sub": "cactus-test-user",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "scope": scopes,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn forged_token() -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &json!({"sub": "mallory", "iss": ISSUER, "aud": AUDIENCE, "scope": [READ_LEDGER_SCOPE]}),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap()
}

// =============================================================================
// Servers
// =============================================================================

/// Start a server with the stub connector on an ephemeral port
pub async fn start_server(config: ApiServerConfig) -> RunningServer {
    let registry = PluginRegistry::new();
    registry.add(TestLedgerConnector::new("test-ledger-connector"));
    start_with_registry(config, registry).await
}

pub async fn start_with_registry(config: ApiServerConfig, registry: PluginRegistry) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    ApiServer::with_registry(config, registry)
        .unwrap()
        .serve_on(listener)
        .unwrap()
}
