//! Signing and hashing of ODAP messages
//!
//! A message is signed over its JSON serialization with the `signature`
//! field set to the empty string. Field order is fixed by the struct
//! definitions, so both gateways serialize identical bytes.

use cactus_core::{KeyPair, PublicKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{OdapError, Result};
use crate::types::{TransferInitializationRequest, TransferInitializationResponse};

pub trait SignedMessage: Serialize + Clone {
    fn signature(&self) -> &str;
    fn set_signature(&mut self, signature: String);
}

impl SignedMessage for TransferInitializationRequest {
    fn signature(&self) -> &str {
        &self.signature
    }

    fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }
}

impl SignedMessage for TransferInitializationResponse {
    fn signature(&self) -> &str {
        &self.signature
    }

    fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }
}

fn unsigned_bytes<M: SignedMessage>(message: &M) -> Result<Vec<u8>> {
    let mut unsigned = message.clone();
    unsigned.set_signature(String::new());
    serde_json::to_vec(&unsigned).map_err(|e| cactus_core::CactusError::from(e).into())
}

pub fn sign_message<M: SignedMessage>(message: &mut M, key_pair: &KeyPair) -> Result<()> {
    let bytes = unsigned_bytes(message)?;
    message.set_signature(hex::encode(key_pair.sign(&bytes)));
    Ok(())
}

pub fn verify_message<M: SignedMessage>(message: &M, public_key: &PublicKey) -> Result<()> {
    let signature = hex::decode(message.signature())
        .map_err(|e| OdapError::VerificationFailed(format!("signature is not hex: {}", e)))?;
    let bytes = unsigned_bytes(message)?;
    public_key
        .verify(&bytes, &signature)
        .map_err(|e| OdapError::VerificationFailed(e.to_string()))
}

/// Lowercase hex SHA-256 of the signed message as sent on the wire
pub fn message_hash<M: Serialize>(message: &M) -> Result<String> {
    let bytes = serde_json::to_vec(message).map_err(cactus_core::CactusError::from)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
