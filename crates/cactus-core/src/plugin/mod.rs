//! Plugin model
//!
//! A plugin declares its capabilities once, when it is added to a
//! [`PluginRegistry`]. Lookups dispatch on the declared [`PluginCapability`]
//! variants rather than probing objects at runtime.

pub mod memory;
mod registry;

pub use memory::{
    KEYCHAIN_MEMORY_PACKAGE_NAME, OBJECT_STORE_MEMORY_PACKAGE_NAME,
    KeychainMemoryOptions, ObjectStoreMemoryOptions, PluginKeychainMemory,
    PluginObjectStoreMemory,
};
pub use registry::{PluginRegistry, RegisteredPlugin};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::jws::GeneralJws;
use crate::web::EndpointDescriptor;

/// Common behaviour of every plugin
pub trait CactusPlugin: Send + Sync {
    /// Identifier unique within a registry
    fn instance_id(&self) -> &str;

    /// Name of the package the plugin was built from
    fn package_name(&self) -> &str;

    /// Capability views of this plugin
    fn capabilities(self: Arc<Self>) -> Vec<PluginCapability>;
}

/// Key/value secret storage
#[async_trait]
pub trait KeychainPlugin: Send + Sync {
    fn keychain_id(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn has(&self, key: &str) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Opaque object storage
#[async_trait]
pub trait ObjectStorePlugin: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn has(&self, key: &str) -> Result<bool>;
}

/// Connector to a concrete ledger. Request and response shapes belong to the
/// connector.
#[async_trait]
pub trait LedgerConnectorPlugin: Send + Sync {
    async fn deploy_contract(&self, request: Value) -> Result<Value>;
    async fn transact(&self, request: Value) -> Result<Value>;
}

/// Plugin that contributes HTTP routes to the gateway
pub trait WebServicePlugin: Send + Sync {
    /// Operations served by [`WebServicePlugin::router`], with their scopes
    fn endpoints(&self) -> Vec<EndpointDescriptor>;

    /// Routes for this plugin, state already applied
    fn router(self: Arc<Self>) -> axum::Router;
}

/// Consortium attestation source
#[async_trait]
pub trait ConsortiumPlugin: Send + Sync {
    /// Compact JWS by this node over its view of the topology
    async fn get_node_jws(&self) -> Result<String>;

    /// Attestations of every member node combined into one general JWS
    async fn get_consortium_jws(&self) -> Result<GeneralJws>;
}

/// Capability tag with a typed handle to the implementation
#[derive(Clone)]
pub enum PluginCapability {
    Keychain(Arc<dyn KeychainPlugin>),
    LedgerConnector(Arc<dyn LedgerConnectorPlugin>),
    WebService(Arc<dyn WebServicePlugin>),
    ObjectStore(Arc<dyn ObjectStorePlugin>),
    Consortium(Arc<dyn ConsortiumPlugin>),
}

/// Discriminant of [`PluginCapability`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Keychain,
    LedgerConnector,
    WebService,
    ObjectStore,
    Consortium,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Keychain => "keychain",
            CapabilityKind::LedgerConnector => "ledger-connector",
            CapabilityKind::WebService => "web-service",
            CapabilityKind::ObjectStore => "object-store",
            CapabilityKind::Consortium => "consortium",
        };
        f.write_str(name)
    }
}

impl PluginCapability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            PluginCapability::Keychain(_) => CapabilityKind::Keychain,
            PluginCapability::LedgerConnector(_) => CapabilityKind::LedgerConnector,
            PluginCapability::WebService(_) => CapabilityKind::WebService,
            PluginCapability::ObjectStore(_) => CapabilityKind::ObjectStore,
            PluginCapability::Consortium(_) => CapabilityKind::Consortium,
        }
    }
}

impl fmt::Debug for PluginCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginCapability::{}", self.kind())
    }
}
