use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use x509_parser::pem::{Pem, parse_x509_pem};
use x509_parser::prelude::*;

/// Certificate extension OIDs registered by Fulcio.
///
/// See <https://github.com/sigstore/fulcio/blob/main/docs/oid-info.md>
pub mod oids {
    pub const OIDC_ISSUER: &str = "1.3.6.1.4.1.57264.1.1";
    pub const GITHUB_WORKFLOW_TRIGGER: &str = "1.3.6.1.4.1.57264.1.2";
    pub const GITHUB_WORKFLOW_SHA: &str = "1.3.6.1.4.1.57264.1.3";
    pub const GITHUB_WORKFLOW_NAME: &str = "1.3.6.1.4.1.57264.1.4";
    pub const GITHUB_WORKFLOW_REPOSITORY: &str = "1.3.6.1.4.1.57264.1.5";
    pub const GITHUB_WORKFLOW_REF: &str = "1.3.6.1.4.1.57264.1.6";
    pub const OTHERNAME_SAN: &str = "1.3.6.1.4.1.57264.1.7";
}

const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CertificateError {
    #[error("Failed to decode certificate: {0}")]
    Decode(String),

    #[error("Failed to parse certificate: {0}")]
    Parse(String),

    #[error("empty PEM file")]
    EmptyChain,

    #[error("encountered unrecognized content before first PEM entry")]
    UnexpectedContent,
}

/// An owned, DER-encoded X.509 certificate.
///
/// The encoding is checked to parse when the value is built; `parse` hands out
/// borrowed views for inspection.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Self, CertificateError> {
        let (rest, _) = X509Certificate::from_der(&der)
            .map_err(|e| CertificateError::Parse(e.to_string()))?;
        if !rest.is_empty() {
            return Err(CertificateError::Parse(format!(
                "{} bytes of trailing data after certificate",
                rest.len()
            )));
        }
        Ok(Self { der })
    }

    /// Parse the first certificate in a PEM buffer
    pub fn from_pem(pem: &[u8]) -> Result<Self, CertificateError> {
        let (_, pem) = parse_x509_pem(pem).map_err(|e| CertificateError::Decode(e.to_string()))?;
        if pem.label != "CERTIFICATE" {
            return Err(CertificateError::Decode(format!(
                "unexpected PEM label: {}",
                pem.label
            )));
        }
        Self::from_der(pem.contents)
    }

    /// Bundles carry the certificate as base64 DER (`rawBytes`)
    pub fn from_base64_der(encoded: &str) -> Result<Self, CertificateError> {
        let der = BASE64
            .decode(encoded.trim())
            .map_err(|e| CertificateError::Decode(e.to_string()))?;
        Self::from_der(der)
    }

    /// The log stores certificates as base64 of their PEM encoding
    pub fn from_base64_pem(encoded: &str) -> Result<Self, CertificateError> {
        let pem = BASE64
            .decode(encoded.trim())
            .map_err(|e| CertificateError::Decode(e.to_string()))?;
        Self::from_pem(&pem)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn parse(&self) -> Result<X509Certificate<'_>, CertificateError> {
        X509Certificate::from_der(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|e| CertificateError::Parse(e.to_string()))
    }

    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("sha256", &self.fingerprint())
            .finish()
    }
}

/// Split a PEM bundle into its certificates, preserving order.
pub fn split_certificate_chain(chain_pem: &[u8]) -> Result<Vec<Certificate>, CertificateError> {
    let text = std::str::from_utf8(chain_pem)
        .map_err(|e| CertificateError::Decode(e.to_string()))?
        .trim_start();

    if text.is_empty() {
        return Err(CertificateError::EmptyChain);
    }
    if !text.starts_with(PEM_CERTIFICATE_HEADER) {
        return Err(CertificateError::UnexpectedContent);
    }

    let mut certificates = Vec::new();
    for pem in Pem::iter_from_buffer(text.as_bytes()) {
        let pem = pem.map_err(|e| CertificateError::Decode(e.to_string()))?;
        certificates.push(Certificate::from_der(pem.contents)?);
    }

    Ok(certificates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF_PEM: &[u8] = include_bytes!("../tests/fixtures/leaf.pem");
    const CHAIN_PEM: &[u8] = include_bytes!("../tests/fixtures/chain.pem");

    #[test]
    fn test_pem_and_base64_der_agree() {
        let from_pem = Certificate::from_pem(LEAF_PEM).unwrap();
        let encoded = BASE64.encode(from_pem.der());
        let from_b64 = Certificate::from_base64_der(&encoded).unwrap();
        assert_eq!(from_pem, from_b64);

        let from_b64_pem = Certificate::from_base64_pem(&BASE64.encode(LEAF_PEM)).unwrap();
        assert_eq!(from_pem, from_b64_pem);
    }

    #[test]
    fn test_split_chain_preserves_order() {
        let chain = split_certificate_chain(CHAIN_PEM).unwrap();
        assert_eq!(chain.len(), 2);

        let intermediate = chain[0].parse().unwrap();
        let root = chain[1].parse().unwrap();
        assert_eq!(intermediate.issuer().as_raw(), root.subject().as_raw());
    }

    #[test]
    fn test_split_chain_rejects_bad_input() {
        assert_eq!(split_certificate_chain(b"  \n"), Err(CertificateError::EmptyChain));

        let mut prefixed = b"garbage\n".to_vec();
        prefixed.extend_from_slice(CHAIN_PEM);
        assert_eq!(
            split_certificate_chain(&prefixed),
            Err(CertificateError::UnexpectedContent)
        );
    }

    #[test]
    fn test_rejects_trailing_data() {
        let cert = Certificate::from_pem(LEAF_PEM).unwrap();
        let mut padded = cert.der().to_vec();
        padded.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(
            Certificate::from_der(padded),
            Err(CertificateError::Parse(
                "2 bytes of trailing data after certificate".into()
            ))
        );
        assert_eq!(
            Certificate::from_base64_der(&BASE64.encode([cert.der(), b"junk"].concat())),
            Err(CertificateError::Parse(
                "4 bytes of trailing data after certificate".into()
            ))
        );
    }

    #[test]
    fn test_rejects_truncated_der() {
        let cert = Certificate::from_pem(LEAF_PEM).unwrap();
        let truncated = cert.der()[..cert.der().len() / 2].to_vec();
        assert!(matches!(
            Certificate::from_der(truncated),
            Err(CertificateError::Parse(_))
        ));
    }
}
