//! Merkle Tree Module
//! Append-only Poseidon trees anchoring coin commitments
pub mod incremental_tree;

// Re-export main types
pub use incremental_tree::{compute_root, MerkleProof, MerkleTree, PendingInsert, DEFAULT_DEPTH};
