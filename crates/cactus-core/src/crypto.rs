//! Ed25519 key material for node and gateway identities
//!
//! Private keys travel as PKCS#8 PEM, public keys as SPKI PEM (consortium
//! nodes) or as the 32-byte point in lowercase hex (transfer gateways).

use crate::error::{CactusError, Result};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, KeypairBytes,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

/// Ed25519 key pair used to sign attestations and gateway messages
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.verifying_key.as_bytes()))
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Create a key pair from an existing signing key
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Load a key pair from a PKCS#8 PEM document
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| CactusError::CryptoError(format!("Invalid private key PEM: {}", e)))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Encode the private key as PKCS#8 PEM
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let pem = self
            .keypair_bytes()
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CactusError::CryptoError(e.to_string()))?;
        Ok(pem.to_string())
    }

    /// Encode the private key as a PKCS#8 DER document
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let der = self
            .keypair_bytes()
            .to_pkcs8_der()
            .map_err(|e| CactusError::CryptoError(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    // v1 document: ring rejects the v2 public key encoding
    fn keypair_bytes(&self) -> KeypairBytes {
        KeypairBytes {
            secret_key: self.signing_key.to_bytes(),
            public_key: None,
        }
    }

    /// Get the public half
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.verifying_key,
        }
    }

    /// Sign a message, returning the 64-byte signature
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

impl PublicKey {
    /// Create a public key from raw bytes.
    ///
    /// Rejects encodings that do not decompress to a curve point and
    /// small-order points.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CactusError::InvalidArgument(format!(
                "Invalid public key length: {}, expected 32",
                bytes.len()
            ))
        })?;
        let verifying_key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| CactusError::InvalidArgument(format!("Invalid public key: {}", e)))?;
        if verifying_key.is_weak() {
            return Err(CactusError::InvalidArgument(
                "Invalid public key: small-order point".into(),
            ));
        }
        Ok(Self { verifying_key })
    }

    /// Parse a hex-encoded public key
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value.trim())
            .map_err(|e| CactusError::InvalidArgument(format!("Invalid public key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse an SPKI PEM public key
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        let verifying_key = VerifyingKey::from_public_key_pem(pem.trim())
            .map_err(|e| CactusError::CryptoError(format!("Invalid public key PEM: {}", e)))?;
        Ok(Self { verifying_key })
    }

    /// Encode as SPKI PEM
    pub fn to_public_key_pem(&self) -> Result<String> {
        self.verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CactusError::CryptoError(e.to_string()))
    }

    /// Lowercase hex of the 32 key bytes
    pub fn to_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Get the raw key bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::from_slice(signature)
            .map_err(|_| CactusError::VerificationFailed("Invalid signature length".into()))?;
        self.verifying_key
            .verify(message, &signature)
            .map_err(CactusError::from)
    }
}
