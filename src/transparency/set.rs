//! Signed Entry Timestamps.
//!
//! The log signs the RFC 8785 canonical form of the entry with the
//! `verification` and `attestation` members removed.

use crate::crypto::LogPublicKey;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::{debug, trace};
use serde_json::{Map, Value};
use thiserror::Error;

const EXCLUDED_FIELDS: [&str; 2] = ["verification", "attestation"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetError {
    #[error("Failed to decode SET: {0}")]
    Malformed(String),

    #[error("Failed to canonicalize log entry: {0}")]
    Canonicalization(String),

    #[error("log entry was signed by an unknown log: {0}")]
    UnknownLog(String),

    #[error("Signed Entry Timestamp verification failed")]
    InvalidSignature,
}

/// Canonical bytes the log signed for `entry`.
pub fn canonical_entry_payload(entry: &Map<String, Value>) -> Result<Vec<u8>, SetError> {
    let mut payload = entry.clone();
    for field in EXCLUDED_FIELDS {
        payload.remove(field);
    }

    serde_jcs::to_vec(&payload).map_err(|e| SetError::Canonicalization(e.to_string()))
}

/// Verify a base64 `signed_entry_timestamp` over `entry`.
pub fn verify_set(
    entry: &Map<String, Value>,
    signed_entry_timestamp: &str,
    log_key: &LogPublicKey,
) -> Result<(), SetError> {
    let signature = BASE64
        .decode(signed_entry_timestamp.trim())
        .map_err(|e| SetError::Malformed(e.to_string()))?;

    let payload = canonical_entry_payload(entry)?;
    trace!("Canonical SET payload is {} bytes", payload.len());

    log_key
        .verify(&signature, &payload)
        .map_err(|_| SetError::InvalidSignature)?;

    debug!("SET verified with log key");
    Ok(())
}
