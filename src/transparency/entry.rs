use super::merkle::{self, InclusionError};
use super::set::{self, SetError};
use crate::certificate::Certificate;
use crate::crypto::LogPublicKey;
use crate::hashes::{HashAlgorithm, Hashed};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::{debug, trace};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("malformed log entry: {0}")]
    Malformed(String),

    #[error(transparent)]
    Inclusion(#[from] InclusionError),

    #[error(transparent)]
    Set(#[from] SetError),

    #[error(
        "entry integrated at {integrated_time} outside certificate validity ({not_before}..{not_after})"
    )]
    OutsideValidity {
        integrated_time: i64,
        not_before: i64,
        not_after: i64,
    },

    #[error("log entry body does not match: {0}")]
    BodyMismatch(String),
}

/// Audit path from a leaf to a published tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf_index: u64,
    pub tree_size: u64,
    pub root_hash: Vec<u8>,
    pub audit_path: Vec<Vec<u8>>,
}

impl InclusionProof {
    pub fn new(
        leaf_index: i64,
        tree_size: i64,
        root_hash: Vec<u8>,
        audit_path: Vec<Vec<u8>>,
    ) -> Result<Self, InclusionError> {
        let leaf_index = u64::try_from(leaf_index).map_err(|_| {
            InclusionError::MalformedProof(format!("invalid log index: {} < 0", leaf_index))
        })?;
        let tree_size = u64::try_from(tree_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                InclusionError::MalformedProof(format!("invalid tree size: {}", tree_size))
            })?;
        if leaf_index >= tree_size {
            return Err(InclusionError::MalformedProof(format!(
                "log index {} is not below tree size {}",
                leaf_index, tree_size
            )));
        }

        Ok(Self {
            leaf_index,
            tree_size,
            root_hash,
            audit_path,
        })
    }

    pub fn verify(&self, leaf_hash: &[u8]) -> Result<(), InclusionError> {
        merkle::verify_inclusion(
            self.leaf_index,
            self.tree_size,
            leaf_hash,
            &self.audit_path,
            &self.root_hash,
        )
    }
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    body: String,
    #[serde(rename = "integratedTime")]
    integrated_time: i64,
    #[serde(rename = "logID")]
    log_id: String,
    #[serde(rename = "logIndex")]
    log_index: i64,
    verification: WireVerification,
}

#[derive(Debug, Deserialize)]
struct WireVerification {
    #[serde(rename = "inclusionProof")]
    inclusion_proof: Option<WireInclusionProof>,
    #[serde(rename = "signedEntryTimestamp")]
    signed_entry_timestamp: String,
}

#[derive(Debug, Deserialize)]
struct WireInclusionProof {
    #[serde(rename = "logIndex")]
    log_index: i64,
    #[serde(rename = "rootHash")]
    root_hash: String,
    #[serde(rename = "treeSize")]
    tree_size: i64,
    hashes: Vec<String>,
}

impl WireInclusionProof {
    fn into_proof(self) -> Result<InclusionProof, InclusionError> {
        let decode = |value: &str| {
            hex::decode(value).map_err(|e| {
                InclusionError::MalformedProof(format!("Failed to decode proof hash: {}", e))
            })
        };

        let root_hash = decode(&self.root_hash)?;
        let audit_path = self
            .hashes
            .iter()
            .map(|h| decode(h))
            .collect::<Result<Vec<_>, _>>()?;

        InclusionProof::new(self.log_index, self.tree_size, root_hash, audit_path)
    }
}

/// A transparency-log entry as returned by the log's entry endpoints.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub uuid: Option<String>,
    /// Base64 of the entry body the log stored
    pub body: String,
    /// Seconds since the epoch
    pub integrated_time: i64,
    /// Hex key ID of the log that integrated the entry
    pub log_id: String,
    pub log_index: i64,
    /// Absent for entries that were never fetched from an online log
    pub inclusion_proof: Option<InclusionProof>,
    pub signed_entry_timestamp: String,
    raw: Map<String, Value>,
    /// Set when the entry carried a proof that could not be decoded
    proof_error: Option<InclusionError>,
}

impl LogEntry {
    /// Parse a `{uuid: entry}` response holding exactly one entry.
    pub fn from_response(response: &Value) -> Result<Self, EntryError> {
        let entries = response
            .as_object()
            .ok_or_else(|| EntryError::Malformed("response is not a JSON object".into()))?;

        if entries.len() != 1 {
            return Err(EntryError::Malformed(format!(
                "expected exactly one entry in response, got {}",
                entries.len()
            )));
        }

        let (uuid, entry) = entries
            .iter()
            .next()
            .ok_or_else(|| EntryError::Malformed("empty response".into()))?;

        let mut parsed = Self::from_entry(entry)?;
        parsed.uuid = Some(uuid.clone());
        Ok(parsed)
    }

    /// Parse a bare entry object (no surrounding UUID).
    pub fn from_entry(entry: &Value) -> Result<Self, EntryError> {
        let raw = entry
            .as_object()
            .cloned()
            .ok_or_else(|| EntryError::Malformed("entry is not a JSON object".into()))?;

        let wire: WireEntry = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| EntryError::Malformed(e.to_string()))?;

        let (inclusion_proof, proof_error) = match wire
            .verification
            .inclusion_proof
            .map(WireInclusionProof::into_proof)
        {
            Some(Ok(proof)) => (Some(proof), None),
            Some(Err(e)) => {
                debug!("Log entry {} has a malformed inclusion proof: {}", wire.log_index, e);
                (None, Some(e))
            }
            None => (None, None),
        };

        Ok(Self {
            uuid: None,
            body: wire.body,
            integrated_time: wire.integrated_time,
            log_id: wire.log_id,
            log_index: wire.log_index,
            inclusion_proof,
            signed_entry_timestamp: wire.verification.signed_entry_timestamp,
            raw,
            proof_error,
        })
    }

    /// Why the entry's inclusion proof was rejected while parsing, if it was
    pub fn proof_error(&self) -> Option<&InclusionError> {
        self.proof_error.as_ref()
    }

    /// The entry object exactly as received
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn decoded_body(&self) -> Result<Vec<u8>, EntryError> {
        BASE64
            .decode(&self.body)
            .map_err(|e| EntryError::Malformed(format!("Failed to decode body: {}", e)))
    }

    /// RFC 6962 leaf hash of the decoded body
    pub fn leaf_hash(&self) -> Result<[u8; merkle::HASH_LEN], EntryError> {
        Ok(merkle::hash_leaf(&self.decoded_body()?))
    }

    pub fn display_id(&self) -> String {
        match &self.uuid {
            Some(uuid) => uuid.clone(),
            None => format!("log index {}", self.log_index),
        }
    }
}

/// Order entries oldest first; ties keep their input order.
pub fn oldest_first(entries: &[LogEntry]) -> Vec<&LogEntry> {
    let mut ordered: Vec<&LogEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.integrated_time);
    ordered
}

/// What a log entry must agree with to count for a given signature.
#[derive(Debug, Clone, Copy)]
pub struct EntryExpectations<'a> {
    pub artifact_digest: &'a Hashed,
    pub signature: &'a [u8],
    pub certificate: &'a Certificate,
    pub not_before: i64,
    pub not_after: i64,
    pub check_body: bool,
}

/// Inclusion proof, then SET, then the entry's binding to this signature.
pub fn verify_entry(
    entry: &LogEntry,
    expected: &EntryExpectations<'_>,
    log_key: &LogPublicKey,
) -> Result<(), EntryError> {
    if let Some(e) = &entry.proof_error {
        return Err(e.clone().into());
    }
    let proof = entry
        .inclusion_proof
        .as_ref()
        .ok_or(InclusionError::MissingProof)?;
    proof.verify(&entry.leaf_hash()?)?;

    if !entry.log_id.eq_ignore_ascii_case(&hex::encode(log_key.key_id())) {
        return Err(SetError::UnknownLog(entry.log_id.clone()).into());
    }
    set::verify_set(entry.raw(), &entry.signed_entry_timestamp, log_key)?;

    if entry.integrated_time < expected.not_before || entry.integrated_time > expected.not_after {
        return Err(EntryError::OutsideValidity {
            integrated_time: entry.integrated_time,
            not_before: expected.not_before,
            not_after: expected.not_after,
        });
    }

    if expected.check_body {
        check_hashedrekord_body(&entry.decoded_body()?, expected)?;
    }

    debug!(
        "Transparency log entry {} verified (integrated at {})",
        entry.display_id(),
        entry.integrated_time
    );
    Ok(())
}

fn check_hashedrekord_body(body: &[u8], expected: &EntryExpectations<'_>) -> Result<(), EntryError> {
    let body: Value = serde_json::from_slice(body)
        .map_err(|e| EntryError::Malformed(format!("Failed to parse body: {}", e)))?;

    let kind = body.get("kind").and_then(|k| k.as_str()).unwrap_or("");
    if kind != "hashedrekord" {
        return Err(EntryError::BodyMismatch(format!(
            "unsupported entry kind '{}'",
            kind
        )));
    }

    let spec = body
        .get("spec")
        .ok_or_else(|| EntryError::BodyMismatch("missing spec".into()))?;

    let hash = spec.get("data").and_then(|d| d.get("hash"));
    let algorithm = hash
        .and_then(|h| h.get("algorithm"))
        .and_then(|a| a.as_str())
        .ok_or_else(|| EntryError::BodyMismatch("missing hash algorithm".into()))?;
    let value = hash
        .and_then(|h| h.get("value"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| EntryError::BodyMismatch("missing hash value".into()))?;

    let algorithm: HashAlgorithm = algorithm
        .parse()
        .map_err(|e| EntryError::BodyMismatch(format!("{}", e)))?;
    if algorithm != expected.artifact_digest.algorithm()
        || !value.eq_ignore_ascii_case(&expected.artifact_digest.hex())
    {
        return Err(EntryError::BodyMismatch(format!(
            "artifact digest {}:{} does not match {}",
            algorithm, value, expected.artifact_digest
        )));
    }

    let signature = spec.get("signature");
    let content = signature
        .and_then(|s| s.get("content"))
        .and_then(|c| c.as_str())
        .and_then(|c| BASE64.decode(c).ok())
        .ok_or_else(|| EntryError::BodyMismatch("missing or undecodable signature".into()))?;
    if content != expected.signature {
        return Err(EntryError::BodyMismatch(
            "signature does not match the artifact signature".into(),
        ));
    }

    let certificate = signature
        .and_then(|s| s.get("publicKey"))
        .and_then(|k| k.get("content"))
        .and_then(|c| c.as_str())
        .and_then(|c| Certificate::from_base64_pem(c).ok())
        .ok_or_else(|| EntryError::BodyMismatch("missing or undecodable certificate".into()))?;
    if certificate != *expected.certificate {
        return Err(EntryError::BodyMismatch(
            "certificate does not match the signing certificate".into(),
        ));
    }

    trace!("hashedrekord body matches artifact, signature and certificate");
    Ok(())
}
