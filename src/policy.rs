//! Identity policies evaluated against a signing certificate.

use crate::certificate::oids;
use crate::verify::VerificationResult;
use log::debug;
use x509_parser::prelude::*;

const SUBJECT_ALT_NAME_OID: &str = "2.5.29.17";

/// Fulcio extensions that carry a single string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Issuer,
    GitHubWorkflowTrigger,
    GitHubWorkflowSha,
    GitHubWorkflowName,
    GitHubWorkflowRepository,
    GitHubWorkflowRef,
}

impl ExtensionKind {
    pub fn oid(&self) -> &'static str {
        match self {
            ExtensionKind::Issuer => oids::OIDC_ISSUER,
            ExtensionKind::GitHubWorkflowTrigger => oids::GITHUB_WORKFLOW_TRIGGER,
            ExtensionKind::GitHubWorkflowSha => oids::GITHUB_WORKFLOW_SHA,
            ExtensionKind::GitHubWorkflowName => oids::GITHUB_WORKFLOW_NAME,
            ExtensionKind::GitHubWorkflowRepository => oids::GITHUB_WORKFLOW_REPOSITORY,
            ExtensionKind::GitHubWorkflowRef => oids::GITHUB_WORKFLOW_REF,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtensionKind::Issuer => "Issuer",
            ExtensionKind::GitHubWorkflowTrigger => "GitHubWorkflowTrigger",
            ExtensionKind::GitHubWorkflowSha => "GitHubWorkflowSHA",
            ExtensionKind::GitHubWorkflowName => "GitHubWorkflowName",
            ExtensionKind::GitHubWorkflowRepository => "GitHubWorkflowRepository",
            ExtensionKind::GitHubWorkflowRef => "GitHubWorkflowRef",
        }
    }
}

/// Requires one extension to hold exactly `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPolicy {
    pub kind: ExtensionKind,
    pub expected: String,
}

impl ExtensionPolicy {
    pub fn new(kind: ExtensionKind, expected: impl Into<String>) -> Self {
        Self {
            kind,
            expected: expected.into(),
        }
    }

    pub fn verify(&self, cert: &X509Certificate<'_>) -> VerificationResult {
        let oid = self.kind.oid();
        let name = self.kind.name();

        let Some(ext) = cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
        else {
            return VerificationResult::failure(format!(
                "Certificate does not contain {} ({}) extension",
                name, oid
            ));
        };

        let value = match std::str::from_utf8(ext.value) {
            Ok(value) => value,
            Err(_) => {
                return VerificationResult::failure(format!(
                    "Certificate's {} ({}) extension is not valid UTF-8",
                    name, oid
                ));
            }
        };

        if value != self.expected {
            return VerificationResult::failure(format!(
                "Certificate's {} does not match (got {}, expected {})",
                name, value, self.expected
            ));
        }

        VerificationResult::Success
    }
}

/// A predicate over the identity claims of a signing certificate.
///
/// Composite policies own their children; evaluation has no side effects, so a
/// policy can be reused across verifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationPolicy {
    Extension(ExtensionPolicy),
    /// A SAN (email, URI or Sigstore otherName) under a given OIDC issuer
    Identity { identity: String, issuer: String },
    AnyOf(Vec<VerificationPolicy>),
    AllOf(Vec<VerificationPolicy>),
}

impl VerificationPolicy {
    pub fn issuer(expected: impl Into<String>) -> Self {
        Self::Extension(ExtensionPolicy::new(ExtensionKind::Issuer, expected))
    }

    pub fn github_workflow_ref(expected: impl Into<String>) -> Self {
        Self::Extension(ExtensionPolicy::new(ExtensionKind::GitHubWorkflowRef, expected))
    }

    pub fn extension(kind: ExtensionKind, expected: impl Into<String>) -> Self {
        Self::Extension(ExtensionPolicy::new(kind, expected))
    }

    pub fn identity(identity: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self::Identity {
            identity: identity.into(),
            issuer: issuer.into(),
        }
    }

    pub fn verify(&self, cert: &X509Certificate<'_>) -> VerificationResult {
        match self {
            VerificationPolicy::Extension(policy) => policy.verify(cert),
            VerificationPolicy::Identity { identity, issuer } => {
                let issuer_result =
                    ExtensionPolicy::new(ExtensionKind::Issuer, issuer.as_str()).verify(cert);
                if !issuer_result.is_success() {
                    return issuer_result;
                }

                if san_matches(cert, identity) {
                    VerificationResult::Success
                } else {
                    VerificationResult::failure(format!(
                        "Certificate's SANs do not match {}",
                        identity
                    ))
                }
            }
            VerificationPolicy::AnyOf(children) => {
                if children.iter().any(|child| child.verify(cert).is_success()) {
                    VerificationResult::Success
                } else {
                    VerificationResult::failure(format!(
                        "0 of {} policies succeeded",
                        children.len()
                    ))
                }
            }
            VerificationPolicy::AllOf(children) => {
                if children.is_empty() {
                    return VerificationResult::failure("no child policies to verify");
                }

                let failures: Vec<String> = children
                    .iter()
                    .filter_map(|child| child.verify(cert).reason().map(str::to_string))
                    .collect();

                if failures.is_empty() {
                    VerificationResult::Success
                } else {
                    VerificationResult::failure(format!(
                        "{} of {} policies failed: {}",
                        failures.len(),
                        children.len(),
                        failures.join(", ")
                    ))
                }
            }
        }
    }
}

fn san_matches(cert: &X509Certificate<'_>, identity: &str) -> bool {
    for ext in cert.extensions() {
        if ext.oid.to_id_string() != SUBJECT_ALT_NAME_OID {
            continue;
        }
        let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() else {
            debug!("Subject alternative name extension did not parse");
            return false;
        };

        return san.general_names.iter().any(|name| match name {
            GeneralName::RFC822Name(email) => *email == identity,
            GeneralName::URI(uri) => *uri == identity,
            GeneralName::OtherName(oid, value) => {
                oid.to_id_string() == oids::OTHERNAME_SAN
                    && other_name_utf8(value) == Some(identity.as_bytes())
            }
            _ => false,
        });
    }

    false
}

/// Unwrap a Sigstore otherName value, `[0] EXPLICIT UTF8String`. The outer
/// context tag is optional since parsers differ on whether they strip it.
fn other_name_utf8(value: &[u8]) -> Option<&[u8]> {
    let inner = match value.first() {
        Some(0xa0) => der_content(value)?,
        _ => value,
    };
    match inner.first() {
        Some(0x0c) => der_content(inner),
        _ => None,
    }
}

/// Content octets of a single definite-length TLV that spans all of `tlv`.
fn der_content(tlv: &[u8]) -> Option<&[u8]> {
    let (&first, rest) = tlv.get(1..)?.split_first()?;
    let (len, rest) = match first {
        len @ 0x00..=0x7f => (usize::from(len), rest),
        0x81 => {
            let (&len, rest) = rest.split_first()?;
            (usize::from(len), rest)
        }
        0x82 => {
            let bytes = rest.get(..2)?;
            (usize::from(u16::from_be_bytes([bytes[0], bytes[1]])), &rest[2..])
        }
        _ => return None,
    };
    (rest.len() == len).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_name_with_and_without_context_tag() {
        let bare = [0x0c, 0x02, b'h', b'i'];
        assert_eq!(other_name_utf8(&bare), Some(&b"hi"[..]));

        let wrapped = [0xa0, 0x04, 0x0c, 0x02, b'h', b'i'];
        assert_eq!(other_name_utf8(&wrapped), Some(&b"hi"[..]));
    }

    #[test]
    fn test_other_name_rejects_inconsistent_lengths() {
        assert_eq!(other_name_utf8(&[0x0c, 0x05, b'h', b'i']), None);
        assert_eq!(other_name_utf8(&[0xa0, 0x01, 0x0c, 0x00]), None);
        // Wrong inner type (IA5String)
        assert_eq!(other_name_utf8(&[0x16, 0x02, b'h', b'i']), None);
        assert_eq!(other_name_utf8(&[]), None);
    }

    #[test]
    fn test_long_form_length() {
        let mut value = vec![0x0c, 0x81, 0x80];
        value.extend(std::iter::repeat(b'a').take(0x80));
        assert_eq!(other_name_utf8(&value).map(|v| v.len()), Some(0x80));
    }
}
