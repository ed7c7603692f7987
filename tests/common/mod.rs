#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;
use sigstore_verifier::{
    ArtifactVerifier, Certificate, LogEntry, SignedCertificateTimestamp, TrustMaterial,
    VerificationPolicy, VerifierOptions,
};

pub const ROOT_PEM: &[u8] = include_bytes!("../fixtures/root.pem");
pub const CHAIN_PEM: &[u8] = include_bytes!("../fixtures/chain.pem");
pub const INTERMEDIATE_PEM: &[u8] = include_bytes!("../fixtures/intermediate.pem");
pub const REKOR_PUB: &[u8] = include_bytes!("../fixtures/rekor.pub");
pub const CTFE_PUB: &[u8] = include_bytes!("../fixtures/ctfe.pub");

pub const LEAF_PEM: &[u8] = include_bytes!("../fixtures/leaf.pem");
pub const ARTIFACT: &[u8] = include_bytes!("../fixtures/artifact.txt");
pub const SIGNATURE_B64: &str = include_str!("../fixtures/artifact.sig");
pub const SCT_B64: &str = include_str!("../fixtures/sct.b64");
pub const SCT_UNFRAMED_B64: &str = include_str!("../fixtures/sct-unframed.b64");
pub const ENTRY_JSON: &str = include_str!("../fixtures/entry.json");
pub const ENTRIES_JSONL: &str = include_str!("../fixtures/entries.jsonl");

pub const ISSUER: &str = "https://token.actions.githubusercontent.com";
pub const EMAIL: &str = "alice@example.com";
pub const WORKFLOW_URI: &str =
    "https://github.com/example/repo/.github/workflows/release.yml@refs/heads/main";
pub const OTHER_NAME: &str = "alice-machine-identity";
pub const ARTIFACT_SHA256: &str =
    "9fdcb091b07f3e3a991231827103111d4ab2c88b89c8cf61d3e4bb01c0a45fd4";

/// Seconds since the epoch of the leaf's validity window
pub const LEAF_NOT_BEFORE: i64 = 1772366400;
pub const LEAF_NOT_AFTER: i64 = 1772367000;

pub fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {}", path, e))
}

pub fn certificate(name: &str) -> Certificate {
    Certificate::from_pem(&fixture(name)).unwrap()
}

pub fn leaf() -> Certificate {
    Certificate::from_pem(LEAF_PEM).unwrap()
}

pub fn signature() -> Vec<u8> {
    BASE64.decode(SIGNATURE_B64.trim()).unwrap()
}

pub fn sct() -> SignedCertificateTimestamp {
    SignedCertificateTimestamp::from_base64_json(SCT_B64).unwrap()
}

pub fn trust() -> TrustMaterial {
    TrustMaterial::from_pem(ROOT_PEM, REKOR_PUB, CTFE_PUB).unwrap()
}

pub fn verifier() -> ArtifactVerifier {
    ArtifactVerifier::new(trust(), VerifierOptions::default())
}

pub fn identity_policy() -> VerificationPolicy {
    VerificationPolicy::identity(EMAIL, ISSUER)
}

/// The fixture `{uuid: entry}` response as JSON, for tampering.
pub fn entry_response() -> Value {
    serde_json::from_str(ENTRY_JSON).unwrap()
}

/// The inner entry object of a `{uuid: entry}` response.
pub fn inner_mut(response: &mut Value) -> &mut Value {
    response
        .as_object_mut()
        .unwrap()
        .values_mut()
        .next()
        .unwrap()
}

pub fn entry() -> LogEntry {
    LogEntry::from_response(&entry_response()).unwrap()
}

pub fn entry_from(response: &Value) -> LogEntry {
    LogEntry::from_response(response).unwrap()
}

/// Re-key a response under a different UUID.
pub fn with_uuid(response: &Value, uuid: &str) -> Value {
    let inner = response.as_object().unwrap().values().next().unwrap().clone();
    let mut map = serde_json::Map::new();
    map.insert(uuid.to_string(), inner);
    Value::Object(map)
}
