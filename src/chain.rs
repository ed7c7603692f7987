use crate::certificate::{Certificate, CertificateError};
use log::debug;
use thiserror::Error;
use x509_parser::prelude::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("certificate path validation failed: {0}")]
    PathValidation(String),

    #[error("Key usage is not of type `digital signature`")]
    WrongKeyUsage,

    #[error("Extended usage does not contain `code signing`")]
    WrongExtendedKeyUsage,

    #[error(transparent)]
    Certificate(#[from] CertificateError),
}

/// Validates signing certificates against a single trusted root.
///
/// Intermediates, when present, are given in issuing order: the first one
/// issued the leaf and the last one was issued by the root.
#[derive(Debug, Clone)]
pub struct CertificateChainValidator {
    trusted_root: Certificate,
    intermediates: Vec<Certificate>,
}

impl CertificateChainValidator {
    pub fn new(trusted_root: Certificate) -> Self {
        Self {
            trusted_root,
            intermediates: Vec::new(),
        }
    }

    pub fn with_intermediates(mut self, intermediates: Vec<Certificate>) -> Self {
        self.intermediates = intermediates;
        self
    }

    pub fn trusted_root(&self) -> &Certificate {
        &self.trusted_root
    }

    /// Validate `cert` at the instant it claims to become valid.
    pub fn validate_at_issuance(&self, cert: &X509Certificate<'_>) -> Result<(), ChainError> {
        self.validate(cert, cert.validity().not_before)
    }

    /// Check usage extensions first, then the signature path to the root at
    /// `reference_time`.
    pub fn validate(
        &self,
        cert: &X509Certificate<'_>,
        reference_time: ASN1Time,
    ) -> Result<(), ChainError> {
        check_key_usage(cert)?;
        check_extended_key_usage(cert)?;

        let root = self.trusted_root.parse()?;
        let intermediates = self
            .intermediates
            .iter()
            .map(Certificate::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let mut path: Vec<&X509Certificate<'_>> = Vec::with_capacity(intermediates.len() + 2);
        path.push(cert);
        path.extend(intermediates.iter());
        path.push(&root);

        for (position, certificate) in path.iter().enumerate() {
            if !certificate.validity().is_valid_at(reference_time) {
                return Err(ChainError::PathValidation(format!(
                    "certificate at depth {} is not valid at {}",
                    position, reference_time
                )));
            }
        }

        for (depth, link) in path.windows(2).enumerate() {
            let (subject, issuer) = (link[0], link[1]);
            verify_issued_by(subject, issuer).map_err(|reason| {
                ChainError::PathValidation(format!("depth {}: {}", depth, reason))
            })?;
        }

        debug!(
            "Certificate chain verified against trusted root ({} intermediates)",
            intermediates.len()
        );
        Ok(())
    }
}

fn verify_issued_by(
    subject: &X509Certificate<'_>,
    issuer: &X509Certificate<'_>,
) -> Result<(), String> {
    if subject.issuer().as_raw() != issuer.subject().as_raw() {
        return Err(format!(
            "issuer '{}' does not match '{}'",
            subject.issuer(),
            issuer.subject()
        ));
    }

    if !issuer.is_ca() {
        return Err(format!("issuer '{}' is not a CA", issuer.subject()));
    }

    subject
        .verify_signature(Some(issuer.public_key()))
        .map_err(|e| format!("signature by '{}' does not verify: {}", issuer.subject(), e))
}

fn check_key_usage(cert: &X509Certificate<'_>) -> Result<(), ChainError> {
    match cert.key_usage() {
        Ok(Some(key_usage)) if key_usage.value.digital_signature() => Ok(()),
        _ => Err(ChainError::WrongKeyUsage),
    }
}

fn check_extended_key_usage(cert: &X509Certificate<'_>) -> Result<(), ChainError> {
    match cert.extended_key_usage() {
        Ok(Some(eku)) if eku.value.code_signing => Ok(()),
        _ => Err(ChainError::WrongExtendedKeyUsage),
    }
}
