//! Transparency proofs: SCTs from the certificate log, and inclusion proofs
//! plus SETs from the artifact log.

pub mod entry;
pub mod merkle;
pub mod sct;
pub mod set;

pub use entry::{EntryError, EntryExpectations, InclusionProof, LogEntry, oldest_first, verify_entry};
pub use merkle::{InclusionError, verify_inclusion};
pub use sct::{LogEntryType, SctError, SignedCertificateTimestamp, verify_sct};
pub use set::{SetError, canonical_entry_payload, verify_set};
