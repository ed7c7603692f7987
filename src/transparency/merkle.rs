//! RFC 6962 Merkle tree inclusion proofs.

use log::{debug, trace};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const HASH_LEN: usize = 32;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InclusionError {
    #[error("missing inclusion proof")]
    MissingProof,

    #[error("malformed inclusion proof: {0}")]
    MalformedProof(String),

    #[error("Merkle inclusion proof verification failed: root hash mismatch")]
    RootMismatch,
}

/// `SHA256(0x00 || data)`
pub fn hash_leaf(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA256(0x01 || left || right)`
pub fn hash_children(left: &[u8], right: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Number of audit-path hashes an inclusion proof for `index` in a tree of
/// `size` leaves must carry: `(inner, border)`.
///
/// `inner` hashes sit below the point where the leaf's path leaves the
/// tree's perfect left subtrees; `border` hashes are the left siblings along
/// the incomplete right edge.
fn decompose_proof_len(index: u64, size: u64) -> (usize, usize) {
    let inner = (u64::BITS - (index ^ (size - 1)).leading_zeros()) as usize;
    let border = (index >> inner).count_ones() as usize;
    (inner, border)
}

/// Replay `audit_path` from `leaf_hash` and compare against `expected_root`.
pub fn verify_inclusion(
    leaf_index: u64,
    tree_size: u64,
    leaf_hash: &[u8],
    audit_path: &[Vec<u8>],
    expected_root: &[u8],
) -> Result<(), InclusionError> {
    if tree_size == 0 {
        return Err(InclusionError::MalformedProof("empty tree".into()));
    }
    if leaf_index >= tree_size {
        return Err(InclusionError::MalformedProof(format!(
            "leaf index {} is not below tree size {}",
            leaf_index, tree_size
        )));
    }
    if leaf_hash.len() != HASH_LEN || expected_root.len() != HASH_LEN {
        return Err(InclusionError::MalformedProof(
            "leaf and root hashes must be 32 bytes".into(),
        ));
    }
    if let Some(bad) = audit_path.iter().position(|h| h.len() != HASH_LEN) {
        return Err(InclusionError::MalformedProof(format!(
            "audit path hash {} is {} bytes",
            bad,
            audit_path[bad].len()
        )));
    }

    let (inner, border) = decompose_proof_len(leaf_index, tree_size);
    if audit_path.len() != inner + border {
        return Err(InclusionError::MalformedProof(format!(
            "expected {} audit path hashes for leaf {} of {}, got {}",
            inner + border,
            leaf_index,
            tree_size,
            audit_path.len()
        )));
    }

    trace!(
        "Replaying inclusion proof: {} inner + {} border hashes",
        inner, border
    );

    let mut current = [0u8; HASH_LEN];
    current.copy_from_slice(leaf_hash);

    for (level, sibling) in audit_path[..inner].iter().enumerate() {
        current = if (leaf_index >> level) & 1 == 0 {
            hash_children(&current, sibling)
        } else {
            hash_children(sibling, &current)
        };
    }
    for sibling in &audit_path[inner..] {
        current = hash_children(sibling, &current);
    }

    if current.as_slice() != expected_root {
        return Err(InclusionError::RootMismatch);
    }

    debug!("Merkle inclusion proof verified successfully");
    Ok(())
}
