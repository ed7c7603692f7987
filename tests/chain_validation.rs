mod common;

use common::*;
use sigstore_verifier::{Certificate, CertificateChainValidator, ChainError, TrustMaterial};
use x509_parser::prelude::ASN1Time;

fn root_validator() -> CertificateChainValidator {
    CertificateChainValidator::new(Certificate::from_pem(ROOT_PEM).unwrap())
}

fn validate(validator: &CertificateChainValidator, name: &str) -> Result<(), ChainError> {
    let cert = certificate(name);
    let parsed = cert.parse().unwrap();
    validator.validate_at_issuance(&parsed)
}

#[test]
fn test_leaf_chains_to_root() {
    assert_eq!(validate(&root_validator(), "leaf.pem"), Ok(()));
    assert_eq!(validate(&root_validator(), "leaf-noext.pem"), Ok(()));
}

#[test]
fn test_usage_failures_are_never_path_failures() {
    let validator = root_validator();
    assert_eq!(
        validate(&validator, "leaf-wrong-ku.pem"),
        Err(ChainError::WrongKeyUsage)
    );
    assert_eq!(
        validate(&validator, "leaf-wrong-eku.pem"),
        Err(ChainError::WrongExtendedKeyUsage)
    );
    // Also untrusted, but the usage check comes first
    assert_eq!(
        validate(&validator, "leaf-wrong-ku-untrusted.pem"),
        Err(ChainError::WrongKeyUsage)
    );
}

#[test]
fn test_untrusted_issuer_fails_path_validation() {
    assert!(matches!(
        validate(&root_validator(), "leaf-untrusted.pem"),
        Err(ChainError::PathValidation(_))
    ));
}

#[test]
fn test_intermediates() {
    assert!(matches!(
        validate(&root_validator(), "leaf-via-intermediate.pem"),
        Err(ChainError::PathValidation(_))
    ));

    let validator =
        root_validator().with_intermediates(vec![Certificate::from_pem(INTERMEDIATE_PEM).unwrap()]);
    assert_eq!(validate(&validator, "leaf-via-intermediate.pem"), Ok(()));
    // A leaf signed directly by the root does not chain through the intermediate
    assert!(matches!(
        validate(&validator, "leaf.pem"),
        Err(ChainError::PathValidation(_))
    ));
}

#[test]
fn test_trust_material_from_chain_pem() {
    let trust = TrustMaterial::from_pem(CHAIN_PEM, REKOR_PUB, CTFE_PUB).unwrap();
    assert_eq!(trust.intermediates().len(), 1);
    assert_eq!(trust.root(), &Certificate::from_pem(ROOT_PEM).unwrap());

    let validator = CertificateChainValidator::new(trust.root().clone())
        .with_intermediates(trust.intermediates().to_vec());
    assert_eq!(validate(&validator, "leaf-via-intermediate.pem"), Ok(()));
}

#[test]
fn test_reference_time_is_checked() {
    let validator = root_validator();
    let cert = leaf();
    let parsed = cert.parse().unwrap();

    let inside = ASN1Time::from_timestamp(LEAF_NOT_BEFORE + 60).unwrap();
    assert_eq!(validator.validate(&parsed, inside), Ok(()));

    let after_expiry = ASN1Time::from_timestamp(LEAF_NOT_AFTER + 1).unwrap();
    assert!(matches!(
        validator.validate(&parsed, after_expiry),
        Err(ChainError::PathValidation(_))
    ));

    let before_issuance = ASN1Time::from_timestamp(LEAF_NOT_BEFORE - 1).unwrap();
    assert!(matches!(
        validator.validate(&parsed, before_issuance),
        Err(ChainError::PathValidation(_))
    ));
}
