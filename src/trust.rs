use crate::certificate::{Certificate, split_certificate_chain};
use crate::crypto::LogPublicKey;
use crate::{Result, SigstoreError};
use log::debug;
use std::path::Path;
use tokio::fs;

/// Trust anchors shared by every verification: the Fulcio root, the Rekor
/// key and the CT log key.
///
/// Load once and pass to [`crate::ArtifactVerifier::new`]; wrap in an `Arc`
/// to share across tasks.
#[derive(Debug, Clone)]
pub struct TrustMaterial {
    root: Certificate,
    intermediates: Vec<Certificate>,
    rekor_key: LogPublicKey,
    ctfe_key: LogPublicKey,
}

impl TrustMaterial {
    pub fn new(root: Certificate, rekor_key: LogPublicKey, ctfe_key: LogPublicKey) -> Self {
        Self {
            root,
            intermediates: Vec::new(),
            rekor_key,
            ctfe_key,
        }
    }

    /// Build from PEM encodings. `root_pem` may be a chain: the last
    /// certificate is the trust anchor and the ones before it are
    /// intermediates in issuing order.
    pub fn from_pem(root_pem: &[u8], rekor_key_pem: &[u8], ctfe_key_pem: &[u8]) -> Result<Self> {
        let mut chain = split_certificate_chain(root_pem)?;
        let root = chain
            .pop()
            .ok_or(SigstoreError::Certificate(crate::CertificateError::EmptyChain))?;

        let rekor_key = LogPublicKey::from_pem(rekor_key_pem)?;
        let ctfe_key = LogPublicKey::from_pem(ctfe_key_pem)?;

        debug!(
            "Loaded trust root {} with {} intermediates, rekor key {}, ctfe key {}",
            root.fingerprint(),
            chain.len(),
            hex::encode(rekor_key.key_id()),
            hex::encode(ctfe_key.key_id())
        );

        Ok(Self::new(root, rekor_key, ctfe_key).with_intermediates(chain))
    }

    pub async fn from_files(
        root_path: &Path,
        rekor_key_path: &Path,
        ctfe_key_path: &Path,
    ) -> Result<Self> {
        let root = fs::read(root_path).await?;
        let rekor_key = fs::read(rekor_key_path).await?;
        let ctfe_key = fs::read(ctfe_key_path).await?;

        Self::from_pem(&root, &rekor_key, &ctfe_key)
    }

    pub fn with_intermediates(mut self, intermediates: Vec<Certificate>) -> Self {
        self.intermediates = intermediates;
        self
    }

    pub fn root(&self) -> &Certificate {
        &self.root
    }

    pub fn intermediates(&self) -> &[Certificate] {
        &self.intermediates
    }

    pub fn rekor_key(&self) -> &LogPublicKey {
        &self.rekor_key
    }

    pub fn ctfe_key(&self) -> &LogPublicKey {
        &self.ctfe_key
    }
}
