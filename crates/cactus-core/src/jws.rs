//! JSON Web Signatures over consortium payloads
//!
//! Supports the compact serialization (`header.payload.signature`) for a
//! single signer and the general JSON serialization for several signers over
//! one payload. Compact tokens are produced and checked by `jsonwebtoken`;
//! callers hand it keys through the [`JwsSigner`] and [`JwsVerifier`] traits.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::crypto::{KeyPair, PublicKey};
use crate::error::{CactusError, Result};

/// Signature algorithms understood by this module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwsAlgorithm {
    EdDsa,
}

impl JwsAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            JwsAlgorithm::EdDsa => "EdDSA",
        }
    }

    fn jwt_algorithm(&self) -> Algorithm {
        match self {
            JwsAlgorithm::EdDsa => Algorithm::EdDSA,
        }
    }
}

impl TryFrom<Algorithm> for JwsAlgorithm {
    type Error = CactusError;

    fn try_from(alg: Algorithm) -> Result<Self> {
        match alg {
            Algorithm::EdDSA => Ok(JwsAlgorithm::EdDsa),
            other => Err(CactusError::VerificationFailed(format!(
                "Unsupported JWS algorithm {:?}",
                other
            ))),
        }
    }
}

/// Key material that can sign a JWS
pub trait JwsSigner {
    fn algorithm(&self) -> JwsAlgorithm;
    fn encoding_key(&self) -> Result<EncodingKey>;
}

/// Key material that can check a JWS
pub trait JwsVerifier {
    fn algorithm(&self) -> JwsAlgorithm;
    fn decoding_key(&self) -> DecodingKey;
}

impl JwsSigner for KeyPair {
    fn algorithm(&self) -> JwsAlgorithm {
        JwsAlgorithm::EdDsa
    }

    fn encoding_key(&self) -> Result<EncodingKey> {
        Ok(EncodingKey::from_ed_der(&self.to_pkcs8_der()?))
    }
}

impl JwsVerifier for PublicKey {
    fn algorithm(&self) -> JwsAlgorithm {
        JwsAlgorithm::EdDsa
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_ed_der(&self.to_bytes())
    }
}

/// Protected JWS header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwsHeader {
    pub alg: JwsAlgorithm,
    pub kid: Option<String>,
}

/// Sign `payload` and return the compact serialization
pub fn sign_compact<T, S>(payload: &T, signer: &S, kid: Option<&str>) -> Result<String>
where
    T: Serialize,
    S: JwsSigner + ?Sized,
{
    let mut header = Header::new(signer.algorithm().jwt_algorithm());
    header.kid = kid.map(str::to_string);
    Ok(jsonwebtoken::encode(&header, payload, &signer.encoding_key()?)?)
}

/// Verify a compact JWS and decode its payload
pub fn verify_compact<T, V>(jws: &str, verifier: &V) -> Result<T>
where
    T: DeserializeOwned,
    V: JwsVerifier + ?Sized,
{
    split_compact(jws)?;
    let data = jsonwebtoken::decode::<T>(
        jws.trim(),
        &verifier.decoding_key(),
        &validation(verifier.algorithm()),
    )?;
    Ok(data.claims)
}

/// Decode the protected header of a compact JWS without verifying it
pub fn decode_header(jws: &str) -> Result<JwsHeader> {
    split_compact(jws)?;
    let header = jsonwebtoken::decode_header(jws.trim())?;
    Ok(JwsHeader {
        alg: JwsAlgorithm::try_from(header.alg)?,
        kid: header.kid,
    })
}

/// One signer's entry in a general JWS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsSignature {
    pub protected: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<UnprotectedHeader>,
}

/// Unprotected per-signature header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprotectedHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// JWS JSON general serialization: one payload, many signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralJws {
    pub payload: String,
    pub signatures: Vec<JwsSignature>,
}

impl GeneralJws {
    /// Combine compact JWSs that carry the same payload.
    ///
    /// Each entry pairs a compact JWS with an optional key id recorded in
    /// the unprotected header. Fails if the list is empty or if any payload
    /// differs from the first.
    pub fn from_compact<'a, I>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<String>)>,
    {
        let mut payload: Option<&str> = None;
        let mut signatures = Vec::new();

        for (jws, kid) in parts {
            let (protected, this_payload, signature) = split_compact(jws)?;
            match payload {
                None => payload = Some(this_payload),
                Some(expected) if expected != this_payload => {
                    return Err(CactusError::VerificationFailed(
                        "Attestations disagree on the signed payload".into(),
                    ));
                }
                Some(_) => {}
            }
            signatures.push(JwsSignature {
                protected: protected.to_string(),
                signature: signature.to_string(),
                header: kid.map(|kid| UnprotectedHeader { kid: Some(kid) }),
            });
        }

        let payload = payload.ok_or_else(|| {
            CactusError::InvalidArgument("Cannot build a JWS without signatures".into())
        })?;

        Ok(Self {
            payload: payload.to_string(),
            signatures,
        })
    }

    /// Verify against one key.
    ///
    /// Succeeds when any signature verifies, matching how a holder of a
    /// single member key checks a multi-signer attestation.
    pub fn verify<T, V>(&self, verifier: &V) -> Result<T>
    where
        T: DeserializeOwned,
        V: JwsVerifier + ?Sized,
    {
        let key = verifier.decoding_key();
        let validation = validation(verifier.algorithm());

        for sig in &self.signatures {
            let compact = self.join(sig);
            match jsonwebtoken::decode::<T>(&compact, &key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(CactusError::VerificationFailed(
            "No signature matched the supplied key".into(),
        ))
    }

    /// Compact form of the `index`th signature
    pub fn to_compact(&self, index: usize) -> Option<String> {
        self.signatures.get(index).map(|sig| self.join(sig))
    }

    fn join(&self, sig: &JwsSignature) -> String {
        format!("{}.{}.{}", sig.protected, self.payload, sig.signature)
    }
}

/// Signature-only validation: attestations carry no registered claims
fn validation(algorithm: JwsAlgorithm) -> Validation {
    let mut validation = Validation::new(algorithm.jwt_algorithm());
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation
}

fn split_compact(jws: &str) -> Result<(&str, &str, &str)> {
    let mut parts = jws.trim().split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !s.is_empty() => Ok((h, p, s)),
        _ => Err(CactusError::InvalidArgument(
            "Compact JWS must have exactly three dot-separated parts".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_compact_sign_and_verify() {
        let kp = KeyPair::generate();
        let jws = sign_compact(&json!({"hello": "world"}), &kp, Some("node-1")).unwrap();

        assert_eq!(jws.split('.').count(), 3);
        let payload: Value = verify_compact(&jws, &kp.public_key()).unwrap();
        assert_eq!(payload["hello"], "world");

        let header = decode_header(&jws).unwrap();
        assert_eq!(header.alg, JwsAlgorithm::EdDsa);
        assert_eq!(header.kid.as_deref(), Some("node-1"));
    }

    #[test]
    fn test_token_from_pem_key_verifies() {
        // Same key loaded the way jsonwebtoken users usually load it
        let kp = KeyPair::generate();
        let pem = kp.to_pkcs8_pem().unwrap();
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some("node-1".into());
        let jws = jsonwebtoken::encode(
            &header,
            &json!({"memberId": "m-1"}),
            &EncodingKey::from_ed_pem(pem.as_bytes()).unwrap(),
        )
        .unwrap();

        let payload: Value = verify_compact(&jws, &kp.public_key()).unwrap();
        assert_eq!(payload["memberId"], "m-1");
    }

    #[test]
    fn test_non_eddsa_token_rejected() {
        let kp = KeyPair::generate();
        let jws = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"n": 1}),
            &EncodingKey::from_secret(b"shared"),
        )
        .unwrap();

        let err = verify_compact::<Value, _>(&jws, &kp.public_key()).unwrap_err();
        assert!(matches!(err, CactusError::VerificationFailed(_)));
        assert!(matches!(
            decode_header(&jws),
            Err(CactusError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let kp = KeyPair::generate();
        let jws = sign_compact(&json!({"n": 1}), &kp, None).unwrap();
        let other = sign_compact(&json!({"n": 2}), &kp, None).unwrap();
        let parts: Vec<&str> = jws.split('.').collect();
        let forged_payload = other.split('.').nth(1).unwrap();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let err = verify_compact::<Value, _>(&forged, &kp.public_key()).unwrap_err();
        assert!(matches!(err, CactusError::VerificationFailed(_)));
    }

    #[test]
    fn test_malformed_compact_rejected() {
        let kp = KeyPair::generate();
        for jws in ["", "a.b", "a.b.c.d", ".b.c", "a.b.c"] {
            assert!(verify_compact::<Value, _>(jws, &kp.public_key()).is_err());
        }
    }

    #[test]
    fn test_general_jws_verifies_for_every_signer() {
        let signers: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let payload = json!({"consortiumDatabase": {"cactusNode": []}});
        let compacts: Vec<String> = signers
            .iter()
            .map(|kp| sign_compact(&payload, kp, None).unwrap())
            .collect();

        let general = GeneralJws::from_compact(
            compacts
                .iter()
                .enumerate()
                .map(|(i, jws)| (jws.as_str(), Some(format!("node-{}", i)))),
        )
        .unwrap();
        assert_eq!(general.signatures.len(), 3);

        for kp in &signers {
            let verified: Value = general.verify(&kp.public_key()).unwrap();
            assert_eq!(verified, payload);
        }
        let stranger = KeyPair::generate();
        let err = general
            .verify::<Value, _>(&stranger.public_key())
            .unwrap_err();
        assert!(matches!(err, CactusError::VerificationFailed(_)));

        let first = general.to_compact(0).unwrap();
        assert_eq!(first, compacts[0]);
    }

    #[test]
    fn test_general_jws_rejects_diverging_payloads() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let jws_a = sign_compact(&json!({"v": 1}), &a, None).unwrap();
        let jws_b = sign_compact(&json!({"v": 2}), &b, None).unwrap();

        let err = GeneralJws::from_compact([(jws_a.as_str(), None), (jws_b.as_str(), None)])
            .unwrap_err();
        assert!(matches!(err, CactusError::VerificationFailed(_)));
    }

    #[test]
    fn test_general_jws_requires_a_signature() {
        let err = GeneralJws::from_compact(std::iter::empty()).unwrap_err();
        assert!(matches!(err, CactusError::InvalidArgument(_)));
    }
}
