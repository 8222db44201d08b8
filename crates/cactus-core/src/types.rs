//! Consortium topology types shared by every node
//!
//! These mirror the JSON documents exchanged between nodes, so field names
//! are serialized in camelCase.

use serde::{Deserialize, Serialize};

/// A gateway node run by one consortium member.
///
/// `public_key_pem` is the verification key for everything the node signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CactusNode {
    pub id: String,
    pub consortium_id: String,
    pub member_id: String,
    pub node_api_host: String,
    pub public_key_pem: String,
    #[serde(default)]
    pub ledger_ids: Vec<String>,
    #[serde(default)]
    pub plugin_instance_ids: Vec<String>,
}

/// A named group of member organizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consortium {
    pub id: String,
    pub name: String,
    pub main_api_host: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// An organization taking part in a consortium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsortiumMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub node_ids: Vec<String>,
}

/// Ledger technology behind a [`Ledger`] entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerType {
    Besu1X,
    Besu2X,
    Burrow0X,
    Corda4X,
    Fabric2,
    Quorum2X,
    Sawtooth1X,
    Xdai1X,
}

/// A ledger reachable through one of the consortium's nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub id: String,
    pub ledger_type: LedgerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consortium_member_id: Option<String>,
}

/// A plugin instance advertised in the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInstance {
    pub id: String,
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<String>,
}

/// The full topology database every participating node holds a copy of.
///
/// The database is never signed at rest. Nodes sign it when they attest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsortiumDatabase {
    #[serde(default)]
    pub cactus_node: Vec<CactusNode>,
    #[serde(default)]
    pub consortium: Vec<Consortium>,
    #[serde(default)]
    pub consortium_member: Vec<ConsortiumMember>,
    #[serde(default)]
    pub ledger: Vec<Ledger>,
    #[serde(default)]
    pub plugin_instance: Vec<PluginInstance>,
}

impl ConsortiumDatabase {
    /// Find a node by its id
    pub fn node(&self, id: &str) -> Option<&CactusNode> {
        self.cactus_node.iter().find(|n| n.id == id)
    }

    /// Find the node whose verification key matches `public_key_pem`
    pub fn node_by_public_key_pem(&self, public_key_pem: &str) -> Option<&CactusNode> {
        let wanted = public_key_pem.trim();
        self.cactus_node
            .iter()
            .find(|n| n.public_key_pem.trim() == wanted)
    }
}
