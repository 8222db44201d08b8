//! ODAP wire types
//!
//! Every public key field is a [`HexPublicKey`], so a request carrying an
//! invalid key cannot be constructed or deserialized.

use std::fmt;

use cactus_core::{CactusError, PublicKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Validated Ed25519 public key in lowercase hex
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexPublicKey {
    hex: String,
    key: PublicKey,
}

impl HexPublicKey {
    pub fn parse(value: &str) -> Result<Self, CactusError> {
        let key = PublicKey::from_hex(value)?;
        Ok(Self::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    pub fn public_key(&self) -> PublicKey {
        self.key
    }
}

impl From<PublicKey> for HexPublicKey {
    fn from(key: PublicKey) -> Self {
        Self {
            hex: key.to_hex(),
            key,
        }
    }
}

impl TryFrom<String> for HexPublicKey {
    type Error = CactusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexPublicKey> for String {
    fn from(value: HexPublicKey) -> Self {
        value.hex
    }
}

impl fmt::Display for HexPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl fmt::Debug for HexPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HexPublicKey").field(&self.hex).finish()
    }
}

/// Asset being transferred. `expiration_date` is kept exactly as supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProfile {
    pub expiration_date: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssetProfile {
    pub fn new(expiration_date: impl Into<String>) -> Self {
        Self {
            expiration_date: expiration_date.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadProfile {
    pub asset_profile: AssetProfile,
    #[serde(default)]
    pub capabilities: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfiguration {
    pub api_host: String,
}

/// Transfer request submitted to the initiating gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendClientV1Request {
    pub server_gateway_configuration: GatewayConfiguration,
    pub version: String,
    pub logging_profile: String,
    pub access_control_profile: String,
    pub application_profile: String,
    pub pay_load_profile: PayloadProfile,
    pub asset_profile: AssetProfile,
    pub asset_control_profile: String,
    pub beneficiary_pubkey: HexPublicKey,
    pub client_dlt_system: String,
    pub client_identity_pubkey: HexPublicKey,
    pub originator_pubkey: HexPublicKey,
    #[serde(alias = "recipientGateWayDltSystem")]
    pub recipient_gateway_dlt_system: String,
    #[serde(alias = "recipientGateWayPubkey")]
    pub recipient_gateway_pubkey: HexPublicKey,
    pub server_dlt_system: String,
    pub server_identity_pubkey: HexPublicKey,
    #[serde(alias = "sourceGateWayDltSystem")]
    pub source_gateway_dlt_system: String,
}

pub const INIT_TRANSFER_MESSAGE_TYPE: &str = "urn:ietf:odap:msgtype:init-transfer-msg";
pub const INIT_TRANSFER_ACK_MESSAGE_TYPE: &str = "urn:ietf:odap:msgtype:init-transfer-ack-msg";

/// Phase-1 message from the client gateway to the server gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInitializationRequest {
    pub message_type: String,
    pub session_id: String,
    pub sequence_number: u64,
    pub version: String,
    pub logging_profile: String,
    pub access_control_profile: String,
    pub application_profile: String,
    pub payload_profile: PayloadProfile,
    pub asset_profile: AssetProfile,
    pub asset_control_profile: String,
    pub originator_pubkey: HexPublicKey,
    pub beneficiary_pubkey: HexPublicKey,
    pub client_identity_pubkey: HexPublicKey,
    pub server_identity_pubkey: HexPublicKey,
    pub client_dlt_system: String,
    pub server_dlt_system: String,
    pub source_gateway_pubkey: HexPublicKey,
    pub source_gateway_dlt_system: String,
    pub recipient_gateway_pubkey: HexPublicKey,
    pub recipient_gateway_dlt_system: String,
    /// Hex signature by the source gateway over the message with this field empty
    pub signature: String,
}

/// Phase-1 acknowledgement from the server gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInitializationResponse {
    pub message_type: String,
    pub session_id: String,
    pub sequence_number: u64,
    /// SHA-256 of the request as received, lowercase hex
    pub initial_request_message_hash: String,
    pub timestamp: String,
    pub server_identity_pubkey: HexPublicKey,
    /// Hex signature by the server gateway over the message with this field empty
    pub signature: String,
}

/// Which side of the negotiation a session record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GatewayRole {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStep {
    TransferInitiationSent,
    TransferInitiationAccepted,
    /// The recipient could not be reached or its answer did not check out
    TransferInitiationFailed,
}

/// Gateway-side record of a negotiated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub id: String,
    pub role: GatewayRole,
    pub step: SessionStep,
    pub initialization_request: TransferInitializationRequest,
    pub initial_request_message_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialization_response: Option<TransferInitializationResponse>,
    pub updated_at: DateTime<Utc>,
}
