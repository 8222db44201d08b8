//! # Cactus Core
//!
//! Building blocks shared by the gateway and its plugins:
//!
//! - **Plugin registry**: capability-indexed catalogue of plugin instances
//! - **Consortium types**: the topology database every node holds
//! - **Signing**: Ed25519 keys and JWS attestations
//! - **Web envelope**: the response and error shapes every endpoint uses

pub mod checks;
pub mod crypto;
pub mod error;
pub mod jws;
pub mod plugin;
pub mod types;
pub mod web;

pub use crypto::{KeyPair, PublicKey};
pub use error::{CactusError, Result};
pub use jws::{GeneralJws, JwsAlgorithm, JwsSigner, JwsVerifier};
pub use plugin::{
    CactusPlugin, CapabilityKind, ConsortiumPlugin, KeychainPlugin, LedgerConnectorPlugin,
    ObjectStorePlugin, PluginCapability, PluginRegistry, RegisteredPlugin, WebServicePlugin,
};
pub use types::{CactusNode, Consortium, ConsortiumDatabase, ConsortiumMember};
pub use web::{ApiError, EndpointDescriptor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
