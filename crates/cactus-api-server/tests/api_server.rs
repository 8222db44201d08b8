//! Dispatch through the API server: health check, scopes, plugin imports

mod common;

use cactus_api_server::{
    ApiServer, ApiServerClient, ApiServerConfig, ClientError, ConfigError, PluginImport,
    ServerError,
};
use cactus_core::{KeyPair, PluginRegistry};
use cactus_plugin_consortium_manual::web::NODE_JWS_PATH;
use common::*;
use serde_json::{json, Value};

// =============================================================================
// Health check
// =============================================================================

#[tokio::test]
async fn test_health_check_is_exempt() {
    let server = start_server(protected_config()).await;
    let client = ApiServerClient::new(server.base_url());

    let health = client.get_health_check().await.unwrap();
    assert!(health.success);
    assert_eq!(health.version, cactus_api_server::VERSION);
    assert!(!health.created_at.is_empty());

    server.shutdown().await.unwrap();
}

// =============================================================================
// Scopes
// =============================================================================

#[tokio::test]
async fn test_scope_present_returns_data() {
    let server = start_server(protected_config()).await;
    let client = ApiServerClient::new(server.base_url()).with_token(token(&[READ_LEDGER_SCOPE]));

    let body: Value = client.get_json(LEDGER_INFO_PATH).await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["blockHeight"], 42);
}

#[tokio::test]
async fn test_scope_missing_is_forbidden() {
    let server = start_server(protected_config()).await;
    let url = format!("{}{}", server.base_url(), LEDGER_INFO_PATH);

    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token(&["read:other"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_plugin_routes_under_realtime_prefix_keep_scope_check() {
    let mut authorization = authorization_config();
    authorization.realtime_channel_path = "/api/v1/plugins".into();
    let server = start_server(ApiServerConfig::with_authorization(authorization)).await;
    let url = format!("{}{}", server.base_url(), LEDGER_INFO_PATH);

    let response = reqwest::Client::new()
        .get(&url)
        .bearer_auth(token(&[]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("data").is_none());

    let scoped = ApiServerClient::new(server.base_url()).with_token(token(&[READ_LEDGER_SCOPE]));
    let body: Value = scoped.get_json(LEDGER_INFO_PATH).await.unwrap();
    assert_eq!(body["data"]["blockHeight"], 42);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_and_forged_tokens_are_unauthorized() {
    let server = start_server(protected_config()).await;

    let anonymous = ApiServerClient::new(server.base_url());
    let err = anonymous.get_json::<Value>(LEDGER_INFO_PATH).await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let forged = ApiServerClient::new(server.base_url()).with_token(forged_token());
    let err = forged.get_json::<Value>(LEDGER_INFO_PATH).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 401, .. }));
}

#[tokio::test]
async fn test_unprotected_server_skips_gatekeeper() {
    let server = start_server(ApiServerConfig::unprotected()).await;
    let client = ApiServerClient::new(server.base_url());

    let body: Value = client.get_json(LEDGER_INFO_PATH).await.unwrap();
    assert_eq!(body["data"]["ledger"], "test-ledger");
}

#[tokio::test]
async fn test_ledger_connector_located_through_registry() {
    let server = start_server(protected_config()).await;

    let connectors = server.registry().get_ledger_connectors();
    assert_eq!(connectors.len(), 1);
    let result = connectors[0].transact(json!({"method": "noop"})).await.unwrap();
    assert_eq!(result["accepted"], true);

    let plugin = server.registry().get_one_by_id("test-ledger-connector").unwrap();
    assert_eq!(plugin.package_name(), "cactus-test-ledger-connector");
}

// =============================================================================
// Plugin imports
// =============================================================================

fn consortium_import(instance_id: &str) -> PluginImport {
    PluginImport {
        package_name: cactus_plugin_consortium_manual::PACKAGE_NAME.into(),
        options: json!({
            "instanceId": instance_id,
            "keyPairPem": KeyPair::generate().to_pkcs8_pem().unwrap(),
        }),
    }
}

#[tokio::test]
async fn test_configured_plugins_are_served() {
    let mut config = protected_config();
    config.plugins = vec![
        consortium_import("consortium-1"),
        PluginImport {
            package_name: "cactus-plugin-keychain-memory".into(),
            options: json!({"instanceId": "keychain-1", "keychainId": "kc-1"}),
        },
    ];
    let server = start_with_registry(config, PluginRegistry::new()).await;

    assert!(server.registry().find_one_by_keychain_id("kc-1").is_ok());

    let response = reqwest::Client::new()
        .post(format!("{}{}", server.base_url(), NODE_JWS_PATH))
        .bearer_auth(token(&[]))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["jws"].as_str().unwrap().split('.').count(), 3);
}

#[tokio::test]
async fn test_duplicate_plugin_routes_rejected() {
    let mut config = protected_config();
    config.plugins = vec![consortium_import("consortium-1"), consortium_import("consortium-2")];

    let server = ApiServer::new(config).unwrap();
    assert!(matches!(
        server.router(),
        Err(ServerError::DuplicateRoute { .. })
    ));
}

#[tokio::test]
async fn test_unknown_plugin_package_rejected() {
    let mut config = protected_config();
    config.plugins = vec![PluginImport {
        package_name: "cactus-plugin-ledger-connector-besu".into(),
        options: json!({}),
    }];

    assert!(matches!(
        ApiServer::new(config),
        Err(ServerError::Config(ConfigError::UnknownPackage(_)))
    ));
}

#[tokio::test]
async fn test_invalid_authorization_config_rejected() {
    let mut authz = authorization_config();
    authz.token_validation.secret_or_public_key = "  ".into();
    let config = ApiServerConfig::with_authorization(authz);

    assert!(matches!(
        ApiServer::new(config),
        Err(ServerError::Config(ConfigError::Invalid(_)))
    ));
}
