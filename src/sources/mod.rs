pub mod file;
pub mod memory;

use crate::Result;
use crate::hashes::Hashed;
use crate::transparency::LogEntry;
use async_trait::async_trait;

/// Lookup key the transparency log indexes entries by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    /// Digest of the signed artifact
    pub artifact_digest: Hashed,
    /// Base64 of the signer's PEM-encoded public key
    pub public_key: String,
}

impl EntryQuery {
    pub fn new(artifact_digest: Hashed, public_key: impl Into<String>) -> Self {
        Self {
            artifact_digest,
            public_key: public_key.into(),
        }
    }
}

/// Trait for different sources of transparency-log entries
#[async_trait]
pub trait LogEntrySource: Send + Sync {
    /// Fetch the entries recorded for a given artifact and key
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<LogEntry>>;

    /// Get the source type name for logging
    fn source_type(&self) -> &'static str;
}
