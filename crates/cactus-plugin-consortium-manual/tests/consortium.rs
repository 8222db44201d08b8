//! Multi-node consortium attestation over HTTP
//!
//! Three nodes share one topology database, each served by its own axum
//! listener. Any node can assemble the consortium attestation and a client
//! holding the member keys can verify it.

use std::sync::Arc;
use std::time::Duration;

use cactus_core::jws::verify_compact;
use cactus_core::{
    CactusNode, Consortium, ConsortiumDatabase, ConsortiumMember, KeyPair, PublicKey,
    WebServicePlugin,
};
use cactus_plugin_consortium_manual::{
    verify_consortium_jws, ConsortiumApiClient, ConsortiumError, ConsortiumManualOptions,
    NodeJwsPayload, PluginConsortiumManual, K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT,
};
use serde_json::Value;
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

struct Node {
    host: String,
    key: KeyPair,
    listener: TcpListener,
}

async fn bind_node() -> Node {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    Node {
        host: format!("http://{}", addr),
        key: KeyPair::generate(),
        listener,
    }
}

fn public_pem(key: &KeyPair) -> String {
    key.public_key().to_public_key_pem().unwrap()
}

fn build_database(nodes: &[Node]) -> ConsortiumDatabase {
    let consortium_id = uuid::Uuid::new_v4().to_string();
    let mut db = ConsortiumDatabase::default();

    for (i, node) in nodes.iter().enumerate() {
        let member_id = uuid::Uuid::new_v4().to_string();
        let node_id = format!("Example_Cactus_Node_{}", i + 1);
        db.cactus_node.push(CactusNode {
            id: node_id.clone(),
            consortium_id: consortium_id.clone(),
            member_id: member_id.clone(),
            node_api_host: node.host.clone(),
            public_key_pem: public_pem(&node.key),
            ledger_ids: vec![],
            plugin_instance_ids: vec![],
        });
        db.consortium_member.push(ConsortiumMember {
            id: member_id,
            name: format!("Example Corp {}", i + 1),
            node_ids: vec![node_id],
        });
    }
    db.consortium.push(Consortium {
        id: consortium_id,
        name: "Example Corp. & Friends Crypto Consortium".into(),
        main_api_host: nodes[0].host.clone(),
        member_ids: db.consortium_member.iter().map(|m| m.id.clone()).collect(),
    });
    db
}

fn start_node(listener: TcpListener, key: &KeyPair, db: ConsortiumDatabase) -> Arc<PluginConsortiumManual> {
    let plugin = Arc::new(
        PluginConsortiumManual::new(ConsortiumManualOptions {
            instance_id: uuid::Uuid::new_v4().to_string(),
            key_pair_pem: key.to_pkcs8_pem().unwrap(),
            consortium_database: db,
            peer_timeout_ms: 5_000,
        })
        .unwrap(),
    );
    let app = plugin.clone().router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    plugin
}

fn client(host: &str) -> ConsortiumApiClient {
    ConsortiumApiClient::new(host, Duration::from_secs(10)).unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_three_node_consortium_attestation() {
    let nodes = vec![bind_node().await, bind_node().await, bind_node().await];
    let db = build_database(&nodes);
    let member_pems: Vec<String> = nodes.iter().map(|n| public_pem(&n.key)).collect();
    let hosts: Vec<String> = nodes.iter().map(|n| n.host.clone()).collect();

    for node in nodes {
        start_node(node.listener, &node.key, db.clone());
    }

    // each node attests for itself
    for (host, pem) in hosts.iter().zip(&member_pems) {
        let jws = client(host).get_node_jws().await.unwrap();
        let key = PublicKey::from_public_key_pem(pem).unwrap();
        let payload: NodeJwsPayload = verify_compact(&jws, &key).unwrap();
        assert_eq!(payload.consortium_database, db);
    }

    // any node can gather the consortium attestation
    for host in &hosts {
        let jws = client(host).get_consortium_jws().await.unwrap();
        assert_eq!(jws.signatures.len(), 3);

        let payload = verify_consortium_jws(&jws, &member_pems).unwrap();
        assert_eq!(payload.consortium_database, db);

        for pem in &member_pems {
            let key = PublicKey::from_public_key_pem(pem).unwrap();
            assert!(jws.verify::<Value, _>(&key).is_ok());
        }

        let wrong_key = KeyPair::generate();
        assert!(jws.verify::<Value, _>(&wrong_key.public_key()).is_err());
        assert!(verify_consortium_jws(&jws, &[public_pem(&wrong_key)]).is_err());
    }
}

#[tokio::test]
async fn test_impostor_node_breaks_attestation() {
    let nodes = vec![bind_node().await, bind_node().await];
    let db = build_database(&nodes);
    let hosts: Vec<String> = nodes.iter().map(|n| n.host.clone()).collect();

    let mut nodes = nodes.into_iter();
    let honest = nodes.next().unwrap();
    let other = nodes.next().unwrap();
    let plugin = start_node(honest.listener, &honest.key, db.clone());
    // second node serves with a key that does not match its publicKeyPem
    start_node(other.listener, &KeyPair::generate(), db);

    let err = plugin.collect_consortium_jws().await.unwrap_err();
    assert!(matches!(err, ConsortiumError::VerificationFailed { .. }), "{:?}", err);

    let status = reqwest::Client::new()
        .post(format!(
            "{}/api/v1/plugins/cactus-plugin-consortium-manual/consortium/jws",
            hosts[0]
        ))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_node_count_metric_over_http() {
    let node = bind_node().await;
    let host = node.host.clone();
    let plugin = start_node(node.listener, &node.key, ConsortiumDatabase::default());
    let api = client(&host);

    let expected = |count: usize| {
        format!(
            "# HELP {name} Total cactus node count\n# TYPE {name} gauge\n{name}{{type=\"{name}\"}} {count}",
            name = K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT,
            count = count
        )
    };

    let metrics = api.get_prometheus_metrics().await.unwrap();
    assert!(metrics.contains(&expected(0)), "{}", metrics);

    plugin.add_cactus_node(CactusNode {
        id: String::new(),
        consortium_id: String::new(),
        member_id: String::new(),
        node_api_host: String::new(),
        public_key_pem: String::new(),
        ledger_ids: vec![],
        plugin_instance_ids: vec![],
    });
    api.get_node_jws().await.unwrap();

    let metrics = api.get_prometheus_metrics().await.unwrap();
    assert!(metrics.contains(&expected(1)), "{}", metrics);
}
