use crate::hashes::{HashAlgorithm, Hashed};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::{debug, trace};
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::prelude::*;

use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{
    Signature as P256Signature, VerifyingKey as P256VerifyingKey,
    signature::Verifier as P256Verifier,
};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p384::ecdsa::{Signature as P384Signature, VerifyingKey as P384VerifyingKey};

const EC_PUBLIC_KEY_OID: &str = "1.2.840.10045.2.1";
const ED25519_OID: &str = "1.3.101.112";
const P256_CURVE_OID: &str = "1.2.840.10045.3.1.7";
const P384_CURVE_OID: &str = "1.3.132.0.34";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported public key algorithm: {0}")]
    UnsupportedKey(String),

    #[error("malformed public key: {0}")]
    MalformedKey(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("{0} keys cannot verify prehashed {1} digests")]
    PrehashUnsupported(&'static str, HashAlgorithm),
}

/// A signing key taken from a certificate's SubjectPublicKeyInfo.
#[derive(Debug, Clone)]
pub enum PublicKey {
    P256(P256VerifyingKey),
    P384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    pub fn from_spki(public_key_info: &SubjectPublicKeyInfo) -> Result<Self, CryptoError> {
        let public_key_bytes: &[u8] = public_key_info.subject_public_key.data.as_ref();
        let algorithm = &public_key_info.algorithm;

        debug!("Public key uses algorithm: {:?}", algorithm.algorithm);

        match algorithm.algorithm.to_id_string().as_str() {
            EC_PUBLIC_KEY_OID => {
                let curve = match &algorithm.parameters {
                    Some(params) => params
                        .as_oid()
                        .map_err(|e| {
                            CryptoError::MalformedKey(format!("Failed to parse curve OID: {}", e))
                        })?
                        .to_id_string(),
                    // Fulcio only issues P-256 without explicit parameters
                    None => P256_CURVE_OID.to_string(),
                };

                match curve.as_str() {
                    P256_CURVE_OID => P256VerifyingKey::from_sec1_bytes(public_key_bytes)
                        .map(PublicKey::P256)
                        .map_err(|e| {
                            CryptoError::MalformedKey(format!("Failed to parse P-256 public key: {}", e))
                        }),
                    P384_CURVE_OID => P384VerifyingKey::from_sec1_bytes(public_key_bytes)
                        .map(PublicKey::P384)
                        .map_err(|e| {
                            CryptoError::MalformedKey(format!("Failed to parse P-384 public key: {}", e))
                        }),
                    other => Err(CryptoError::UnsupportedKey(format!("EC curve {}", other))),
                }
            }
            ED25519_OID => {
                let key_bytes: &[u8; 32] = public_key_bytes.try_into().map_err(|_| {
                    CryptoError::MalformedKey(format!(
                        "Invalid Ed25519 public key length: {} (expected 32)",
                        public_key_bytes.len()
                    ))
                })?;
                Ed25519VerifyingKey::from_bytes(key_bytes)
                    .map(PublicKey::Ed25519)
                    .map_err(|e| {
                        CryptoError::MalformedKey(format!("Failed to parse Ed25519 public key: {}", e))
                    })
            }
            other => Err(CryptoError::UnsupportedKey(other.to_string())),
        }
    }

    pub fn algorithm_name(&self) -> &'static str {
        match self {
            PublicKey::P256(_) => "ECDSA-P256",
            PublicKey::P384(_) => "ECDSA-P384",
            PublicKey::Ed25519(_) => "Ed25519",
        }
    }

    /// Verify `signature` over `message`, hashing with the key's native digest.
    ///
    /// ECDSA signatures may be DER-encoded or raw `r || s`.
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> Result<(), CryptoError> {
        trace!(
            "Verifying {} signature ({} bytes) over {} bytes",
            self.algorithm_name(),
            signature.len(),
            message.len()
        );

        match self {
            PublicKey::P256(key) => {
                let signature = parse_p256_signature(signature)?;
                key.verify(message, &signature)
                    .map_err(|_| CryptoError::InvalidSignature)
            }
            PublicKey::P384(key) => {
                let signature = P384Signature::from_der(signature)
                    .or_else(|_| P384Signature::from_slice(signature))
                    .map_err(|_| CryptoError::InvalidSignature)?;

                use p384::ecdsa::signature::Verifier;
                key.verify(message, &signature)
                    .map_err(|_| CryptoError::InvalidSignature)
            }
            PublicKey::Ed25519(key) => {
                let signature = Ed25519Signature::from_slice(signature)
                    .map_err(|_| CryptoError::InvalidSignature)?;

                use ed25519_dalek::Verifier;
                key.verify(message, &signature)
                    .map_err(|_| CryptoError::InvalidSignature)
            }
        }
    }

    /// Verify `signature` over an already computed digest.
    pub fn verify_prehashed(&self, signature: &[u8], digest: &Hashed) -> Result<(), CryptoError> {
        use p256::ecdsa::signature::hazmat::PrehashVerifier;

        match self {
            PublicKey::P256(key) => {
                let signature = parse_p256_signature(signature)?;
                key.verify_prehash(digest.digest(), &signature)
                    .map_err(|_| CryptoError::InvalidSignature)
            }
            PublicKey::P384(key) => {
                let signature = P384Signature::from_der(signature)
                    .or_else(|_| P384Signature::from_slice(signature))
                    .map_err(|_| CryptoError::InvalidSignature)?;
                key.verify_prehash(digest.digest(), &signature)
                    .map_err(|_| CryptoError::InvalidSignature)
            }
            PublicKey::Ed25519(_) => Err(CryptoError::PrehashUnsupported(
                self.algorithm_name(),
                digest.algorithm(),
            )),
        }
    }

    /// Base64 of the PEM-encoded SubjectPublicKeyInfo, as the log indexes keys.
    pub fn to_pem_base64(&self) -> Result<String, CryptoError> {
        let pem = match self {
            PublicKey::P256(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::P384(key) => key.to_public_key_pem(LineEnding::LF),
            PublicKey::Ed25519(key) => key.to_public_key_pem(LineEnding::LF),
        }
        .map_err(|e| CryptoError::MalformedKey(format!("Failed to encode public key: {}", e)))?;

        Ok(BASE64.encode(pem.as_bytes()))
    }
}

/// A transparency log's ECDSA P-256 key together with its RFC 6962 key ID.
#[derive(Debug, Clone)]
pub struct LogPublicKey {
    key: P256VerifyingKey,
    key_id: [u8; 32],
}

impl LogPublicKey {
    pub fn from_pem(pem: &[u8]) -> Result<Self, CryptoError> {
        let pem_str = std::str::from_utf8(pem)
            .map_err(|e| CryptoError::MalformedKey(format!("Invalid PEM: {}", e)))?;

        let key = P256VerifyingKey::from_public_key_pem(pem_str.trim()).map_err(|e| {
            CryptoError::UnsupportedKey(format!("log keys must be ECDSA P-256 ({})", e))
        })?;

        Self::from_verifying_key(key)
    }

    pub fn from_verifying_key(key: P256VerifyingKey) -> Result<Self, CryptoError> {
        let der = key
            .to_public_key_der()
            .map_err(|e| CryptoError::MalformedKey(format!("Failed to encode log key: {}", e)))?;
        let key_id = Sha256::digest(der.as_bytes()).into();

        Ok(Self { key, key_id })
    }

    /// `SHA256(DER(SubjectPublicKeyInfo))`
    pub fn key_id(&self) -> &[u8; 32] {
        &self.key_id
    }

    /// ECDSA over SHA-256. Malformed signature encodings are reported as
    /// `InvalidSignature`, like a wrong signature.
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> Result<(), CryptoError> {
        let signature = parse_p256_signature(signature)?;
        self.key
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

fn parse_p256_signature(signature: &[u8]) -> Result<P256Signature, CryptoError> {
    P256Signature::from_der(signature)
        .or_else(|_| P256Signature::from_slice(signature))
        .map_err(|_| CryptoError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REKOR_PUB: &[u8] = include_bytes!("../tests/fixtures/rekor.pub");

    #[test]
    fn test_log_key_id_is_sha256_of_spki() {
        let key = LogPublicKey::from_pem(REKOR_PUB).unwrap();
        assert_eq!(
            hex::encode(key.key_id()),
            "220e7523bb537a1a5da37eddaac8b2c5ff21148199ebd7fb4a2ce43b66c37b14"
        );
    }

    #[test]
    fn test_log_key_rejects_garbage_signature() {
        let key = LogPublicKey::from_pem(REKOR_PUB).unwrap();
        assert_eq!(
            key.verify(b"not a signature", b"message"),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_log_key_rejects_non_pem() {
        assert!(LogPublicKey::from_pem(b"-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----").is_err());
    }
}
