use crate::certificate::{Certificate, CertificateError};
use crate::chain::{CertificateChainValidator, ChainError};
use crate::crypto::{CryptoError, PublicKey};
use crate::hashes::Hashed;
use crate::policy::VerificationPolicy;
use crate::sources::{EntryQuery, LogEntrySource};
use crate::transparency::{
    EntryExpectations, LogEntry, SctError, SignedCertificateTimestamp, oldest_first, verify_entry,
    verify_sct,
};
use crate::trust::TrustMaterial;
use log::{debug, warn};
use thiserror::Error;

/// Outcome of a verification. There is no partial success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Success,
    Failure(String),
}

impl VerificationResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        VerificationResult::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerificationResult::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            VerificationResult::Success => None,
            VerificationResult::Failure(reason) => Some(reason),
        }
    }
}

impl From<Result<(), VerificationError>> for VerificationResult {
    fn from(result: Result<(), VerificationError>) -> Self {
        match result {
            Ok(()) => VerificationResult::Success,
            Err(e) => VerificationResult::Failure(e.to_string()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no transparency-log entries supplied and online lookup unavailable")]
    Unavailable,

    #[error("no valid transparency-log entries found ({})", summarize(.0))]
    NoValidEntries(Vec<String>),

    #[error("transparency-log lookup via {source_type} failed: {reason}")]
    Source {
        source_type: &'static str,
        reason: String,
    },
}

fn summarize(failures: &[String]) -> String {
    if failures.is_empty() {
        "0 attempted".to_string()
    } else {
        format!("{} attempted: {}", failures.len(), failures.join("; "))
    }
}

/// The first failing step of a verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Sct(#[from] SctError),

    #[error("{0}")]
    Policy(String),

    #[error("artifact signature: {0}")]
    Signature(#[from] CryptoError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl From<CertificateError> for VerificationError {
    fn from(e: CertificateError) -> Self {
        VerificationError::Chain(ChainError::Certificate(e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierOptions {
    /// Fail unless some transparency-log entry verifies
    pub require_transparency_log: bool,
    /// Fail when no SCT accompanies the certificate
    pub require_sct: bool,
    /// Match the entry's `hashedrekord` body against the artifact, signature
    /// and certificate being verified
    pub check_entry_body: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            require_transparency_log: true,
            require_sct: false,
            check_entry_body: true,
        }
    }
}

impl VerifierOptions {
    pub fn with_require_transparency_log(mut self, require: bool) -> Self {
        self.require_transparency_log = require;
        self
    }

    pub fn with_require_sct(mut self, require: bool) -> Self {
        self.require_sct = require;
        self
    }

    pub fn with_check_entry_body(mut self, check: bool) -> Self {
        self.check_entry_body = check;
        self
    }
}

/// Verifies artifact signatures made with short-lived Fulcio certificates.
pub struct ArtifactVerifier {
    trust: TrustMaterial,
    options: VerifierOptions,
    chain_validator: CertificateChainValidator,
}

impl ArtifactVerifier {
    pub fn new(trust: TrustMaterial, options: VerifierOptions) -> Self {
        let chain_validator = CertificateChainValidator::new(trust.root().clone())
            .with_intermediates(trust.intermediates().to_vec());

        Self {
            trust,
            options,
            chain_validator,
        }
    }

    pub fn options(&self) -> &VerifierOptions {
        &self.options
    }

    /// Verify `signature` over `artifact`. `entries` of `None` means no entries
    /// were supplied and none can be looked up.
    pub fn verify(
        &self,
        artifact: &[u8],
        certificate: &Certificate,
        signature: &[u8],
        sct: Option<&SignedCertificateTimestamp>,
        policy: &VerificationPolicy,
        entries: Option<&[LogEntry]>,
    ) -> VerificationResult {
        let result =
            self.verify_detailed(artifact, certificate, signature, sct, policy, entries);
        if let Err(e) = &result {
            debug!("Verification failed: {}", e);
        }
        result.into()
    }

    /// Like [`verify`](Self::verify), keeping the structured error.
    pub fn verify_detailed(
        &self,
        artifact: &[u8],
        certificate: &Certificate,
        signature: &[u8],
        sct: Option<&SignedCertificateTimestamp>,
        policy: &VerificationPolicy,
        entries: Option<&[LogEntry]>,
    ) -> Result<(), VerificationError> {
        let digest = Hashed::sha256(artifact);
        debug!("Verifying artifact {}", digest);

        let cert = certificate.parse()?;
        self.chain_validator.validate_at_issuance(&cert)?;

        match sct {
            Some(sct) => verify_sct(sct, certificate, self.trust.ctfe_key())?,
            None if self.options.require_sct => return Err(SctError::Missing.into()),
            None => debug!("No SCT supplied, skipping SCT verification"),
        }

        if let VerificationResult::Failure(reason) = policy.verify(&cert) {
            return Err(VerificationError::Policy(reason));
        }
        debug!("Certificate satisfies verification policy");

        let key = PublicKey::from_spki(cert.public_key())?;
        match key {
            PublicKey::Ed25519(_) => key.verify(signature, artifact)?,
            _ => key.verify_prehashed(signature, &digest)?,
        }
        debug!("Artifact signature verified with {} key", key.algorithm_name());

        let entries = match entries {
            Some(entries) => entries,
            None if self.options.require_transparency_log => {
                return Err(LookupError::Unavailable.into());
            }
            None => {
                warn!("Transparency log verification skipped: no entries supplied");
                return Ok(());
            }
        };

        let validity = cert.validity();
        let expected = EntryExpectations {
            artifact_digest: &digest,
            signature,
            certificate,
            not_before: validity.not_before.timestamp(),
            not_after: validity.not_after.timestamp(),
            check_body: self.options.check_entry_body,
        };

        self.verify_entries(entries, &expected)
    }

    fn verify_entries(
        &self,
        entries: &[LogEntry],
        expected: &EntryExpectations<'_>,
    ) -> Result<(), VerificationError> {
        let mut failures = Vec::new();

        for entry in oldest_first(entries) {
            match verify_entry(entry, expected, self.trust.rekor_key()) {
                Ok(()) => {
                    debug!("Accepted transparency log entry {}", entry.display_id());
                    return Ok(());
                }
                Err(e) => {
                    debug!("Skipping transparency log entry {}: {}", entry.display_id(), e);
                    failures.push(format!("{}: {}", entry.display_id(), e));
                }
            }
        }

        if failures.is_empty() && !self.options.require_transparency_log {
            warn!("Transparency log verification skipped: entry list is empty");
            return Ok(());
        }

        Err(LookupError::NoValidEntries(failures).into())
    }

    /// Fetch entries for the artifact and the certificate's key from `source`,
    /// then verify.
    pub async fn verify_with_source(
        &self,
        artifact: &[u8],
        certificate: &Certificate,
        signature: &[u8],
        sct: Option<&SignedCertificateTimestamp>,
        policy: &VerificationPolicy,
        source: &dyn LogEntrySource,
    ) -> Result<(), VerificationError> {
        let public_key = {
            let cert = certificate.parse()?;
            PublicKey::from_spki(cert.public_key())?.to_pem_base64()?
        };
        let query = EntryQuery::new(Hashed::sha256(artifact), public_key);

        let entries = source.fetch_entries(&query).await.map_err(|e| {
            VerificationError::Lookup(LookupError::Source {
                source_type: source.source_type(),
                reason: e.to_string(),
            })
        })?;
        debug!(
            "{} source returned {} transparency log entries",
            source.source_type(),
            entries.len()
        );

        self.verify_detailed(artifact, certificate, signature, sct, policy, Some(&entries))
    }
}
