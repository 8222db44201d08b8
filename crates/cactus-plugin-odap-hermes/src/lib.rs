//! # Cactus Plugin: ODAP Hermes
//!
//! Gateway side of the Open Digital Asset Protocol. This crate covers
//! identity exchange and phase-1 session negotiation between a source and a
//! recipient gateway. Asset locking, commitment and rollback are not
//! implemented.

pub mod error;
pub mod gateway;
pub mod messages;
pub mod types;
pub mod web;

pub use error::{OdapError, Result};
pub use gateway::{session_object_key, OdapGateway, OdapGatewayOptions, PACKAGE_NAME};
pub use types::{
    AssetProfile, GatewayConfiguration, GatewayRole, HexPublicKey, PayloadProfile,
    SendClientV1Request, SessionData, SessionStep, TransferInitializationRequest,
    TransferInitializationResponse,
};
