use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

pub mod certificate;
pub mod chain;
pub mod crypto;
pub mod hashes;
pub mod policy;
pub mod sources;
pub mod transparency;
pub mod trust;
pub mod verify;

// Re-export commonly used types
pub use certificate::{Certificate, CertificateError, split_certificate_chain};
pub use chain::{CertificateChainValidator, ChainError};
pub use crypto::{CryptoError, LogPublicKey, PublicKey};
pub use hashes::{HashAlgorithm, HashError, Hashed};
pub use policy::{ExtensionKind, ExtensionPolicy, VerificationPolicy};
pub use sources::{EntryQuery, LogEntrySource};
pub use transparency::{
    EntryError, InclusionError, InclusionProof, LogEntry, SctError, SetError,
    SignedCertificateTimestamp,
};
pub use trust::TrustMaterial;
pub use verify::{
    ArtifactVerifier, LookupError, VerificationError, VerificationResult, VerifierOptions,
};

/// Failures while loading verification inputs. Verification outcomes
/// themselves are [`VerificationResult`]s.
#[derive(Debug, Error)]
pub enum SigstoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Sct(#[from] SctError),

    #[error(transparent)]
    Entry(#[from] EntryError),
}

pub type Result<T> = std::result::Result<T, SigstoreError>;

/// Verify a blob signed with a Fulcio certificate, reading every input from
/// disk.
///
/// * `certificate_path` - PEM certificate, or a PEM chain whose first entry is
///   the signing certificate
/// * `signature_path` - base64 signature, as written by `cosign sign-blob`
/// * `sct_path` - optional base64 detached SCT from the certificate authority
/// * `source` - optional transparency-log entry source
#[allow(clippy::too_many_arguments)]
pub async fn verify_blob_files(
    verifier: &ArtifactVerifier,
    artifact_path: &Path,
    certificate_path: &Path,
    signature_path: &Path,
    sct_path: Option<&Path>,
    policy: &VerificationPolicy,
    source: Option<&dyn LogEntrySource>,
) -> Result<VerificationResult> {
    let artifact = fs::read(artifact_path).await?;

    let certificate_pem = fs::read(certificate_path).await?;
    let certificate = split_certificate_chain(&certificate_pem)?
        .into_iter()
        .next()
        .ok_or(CertificateError::EmptyChain)?;

    let signature = fs::read_to_string(signature_path).await?;
    let signature = BASE64.decode(signature.trim())?;

    let sct = match sct_path {
        Some(path) => {
            let header = fs::read_to_string(path).await?;
            Some(SignedCertificateTimestamp::from_base64_json(&header)?)
        }
        None => None,
    };

    let result: VerificationResult = match source {
        Some(source) => verifier
            .verify_with_source(
                &artifact,
                &certificate,
                &signature,
                sct.as_ref(),
                policy,
                source,
            )
            .await
            .into(),
        None => verifier.verify(
            &artifact,
            &certificate,
            &signature,
            sct.as_ref(),
            policy,
            None,
        ),
    };

    Ok(result)
}
