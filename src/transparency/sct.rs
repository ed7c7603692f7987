//! Signed Certificate Timestamps for detached (header-delivered) SCTs.
//!
//! The CA returns the SCT out of band, so the log signed the plain X.509
//! entry of the leaf rather than a precertificate.

use crate::certificate::Certificate;
use crate::crypto::LogPublicKey;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// Largest length representable in the 3-byte `ASN.1Cert` length prefix
const MAX_CERT_LEN: usize = (1 << 24) - 1;

/// TLS `SignatureAndHashAlgorithm` for SHA-256 / ECDSA
const SHA256_ECDSA: [u8; 2] = [0x04, 0x03];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SctError {
    #[error("Failed to decode SCT: {0}")]
    Malformed(String),

    #[error("unsupported SCT version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unexpectedly large certificate length: {0}")]
    OversizedCertificate(usize),

    #[error("Unexpectedly large SCT extensions length: {0}")]
    OversizedExtensions(usize),

    #[error("SCT was issued by an unknown log: {0}")]
    UnknownLog(String),

    #[error("SCT signature verification failed")]
    InvalidSignature,

    #[error("no SCT supplied for the signing certificate")]
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryType {
    X509Certificate = 0,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificateTimestamp {
    pub version: u8,
    pub log_id: Vec<u8>,
    /// Milliseconds since the epoch
    pub timestamp: u64,
    pub entry_type: LogEntryType,
    pub extensions: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Deserialize)]
struct DetachedSct {
    sct_version: u8,
    id: String,
    timestamp: u64,
    #[serde(default)]
    extensions: String,
    signature: String,
}

impl SignedCertificateTimestamp {
    /// Decode the CA's `SCT` response header: base64 of a JSON document whose
    /// byte fields are themselves base64.
    pub fn from_base64_json(header: &str) -> Result<Self, SctError> {
        let json = BASE64
            .decode(header.trim())
            .map_err(|e| SctError::Malformed(e.to_string()))?;
        let detached: DetachedSct =
            serde_json::from_slice(&json).map_err(|e| SctError::Malformed(e.to_string()))?;

        if detached.sct_version != 0 {
            return Err(SctError::UnsupportedVersion(detached.sct_version));
        }

        let decode = |field: &str, value: &str| {
            BASE64
                .decode(value)
                .map_err(|e| SctError::Malformed(format!("{}: {}", field, e)))
        };

        Ok(Self {
            version: detached.sct_version,
            log_id: decode("id", &detached.id)?,
            timestamp: detached.timestamp,
            entry_type: LogEntryType::X509Certificate,
            extensions: decode("extensions", &detached.extensions)?,
            signature: decode("signature", &detached.signature)?,
        })
    }

    /// The signature with any TLS `DigitallySigned` framing removed.
    ///
    /// Framed signatures carry two algorithm bytes and a 2-byte length before
    /// the DER signature. Unframed signatures are returned as is.
    pub fn signature_bytes(&self) -> &[u8] {
        match self.signature.as_slice() {
            [hash, sig, hi, lo, rest @ ..]
                if [*hash, *sig] == SHA256_ECDSA
                    && usize::from(u16::from_be_bytes([*hi, *lo])) == rest.len() =>
            {
                rest
            }
            other => other,
        }
    }
}

/// Reconstruct the RFC 6962 section 3.2 `digitally-signed` payload for an
/// X.509 entry, big-endian and without padding.
pub(crate) fn pack_digitally_signed(
    sct: &SignedCertificateTimestamp,
    cert_der: &[u8],
) -> Result<Vec<u8>, SctError> {
    if cert_der.len() > MAX_CERT_LEN {
        return Err(SctError::OversizedCertificate(cert_der.len()));
    }
    let extensions_len = u16::try_from(sct.extensions.len())
        .map_err(|_| SctError::OversizedExtensions(sct.extensions.len()))?;

    let mut data = Vec::with_capacity(17 + cert_der.len() + sct.extensions.len());

    data.push(sct.version);
    data.push(0); // signature_type = certificate_timestamp
    data.extend_from_slice(&sct.timestamp.to_be_bytes());
    data.extend_from_slice(&(sct.entry_type as u16).to_be_bytes());
    data.extend_from_slice(&(cert_der.len() as u32).to_be_bytes()[1..]);
    data.extend_from_slice(cert_der);
    data.extend_from_slice(&extensions_len.to_be_bytes());
    data.extend_from_slice(&sct.extensions);

    Ok(data)
}

/// Verify that `log_key` signed `sct` for `cert`.
pub fn verify_sct(
    sct: &SignedCertificateTimestamp,
    cert: &Certificate,
    log_key: &LogPublicKey,
) -> Result<(), SctError> {
    if sct.log_id.as_slice() != log_key.key_id().as_slice() {
        return Err(SctError::UnknownLog(hex::encode(&sct.log_id)));
    }

    let digitally_signed = pack_digitally_signed(sct, cert.der())?;

    log_key
        .verify(sct.signature_bytes(), &digitally_signed)
        .map_err(|_| SctError::InvalidSignature)?;

    debug!("SCT verified (timestamp {})", sct.timestamp);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sct(signature: Vec<u8>, extensions: Vec<u8>) -> SignedCertificateTimestamp {
        SignedCertificateTimestamp {
            version: 0,
            log_id: vec![0xaa; 32],
            timestamp: 0x0102_0304_0506_0708,
            entry_type: LogEntryType::X509Certificate,
            extensions,
            signature,
        }
    }

    #[test]
    fn test_pack_layout() {
        let packed = pack_digitally_signed(&sct(vec![], vec![0xee, 0xff]), &[0xc0, 0xc1, 0xc2]).unwrap();
        assert_eq!(
            packed,
            vec![
                0x00, // version
                0x00, // signature type
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, // timestamp
                0x00, 0x00, // entry type
                0x00, 0x00, 0x03, // certificate length
                0xc0, 0xc1, 0xc2, // certificate
                0x00, 0x02, // extensions length
                0xee, 0xff, // extensions
            ]
        );
    }

    #[test]
    fn test_pack_keeps_length_field_for_empty_extensions() {
        let packed = pack_digitally_signed(&sct(vec![], vec![]), &[0x30]).unwrap();
        assert_eq!(&packed[packed.len() - 2..], &[0x00, 0x00]);
        assert_eq!(packed.len(), 1 + 1 + 8 + 2 + 3 + 1 + 2);
    }

    #[test]
    fn test_pack_rejects_oversized_certificate() {
        let der = vec![0u8; MAX_CERT_LEN + 1];
        assert_eq!(
            pack_digitally_signed(&sct(vec![], vec![]), &der),
            Err(SctError::OversizedCertificate(MAX_CERT_LEN + 1))
        );
    }

    #[test]
    fn test_signature_framing_is_stripped_only_when_consistent() {
        let framed = sct(vec![0x04, 0x03, 0x00, 0x02, 0x30, 0x00], vec![]);
        assert_eq!(framed.signature_bytes(), &[0x30, 0x00]);

        // Length prefix disagrees with the payload
        let bogus = sct(vec![0x04, 0x03, 0x00, 0x05, 0x30, 0x00], vec![]);
        assert_eq!(bogus.signature_bytes(), bogus.signature.as_slice());

        let bare = sct(vec![0x30, 0x44, 0x02], vec![]);
        assert_eq!(bare.signature_bytes(), bare.signature.as_slice());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let header = BASE64.encode(
            r#"{"sct_version":1,"id":"","timestamp":0,"extensions":"","signature":""}"#,
        );
        assert_eq!(
            SignedCertificateTimestamp::from_base64_json(&header),
            Err(SctError::UnsupportedVersion(1))
        );
    }
}
