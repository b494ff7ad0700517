//! Private Graph Pool
//!
//! A shielded, Sybil-resistant voting pool. Identity holders receive voting
//! power as hidden coins, pour it anonymously to candidates, and verified
//! candidates later reclaim it together with an epoch reward.

// Core modules
pub mod coin;
pub mod config;
pub mod crypto;
pub mod error;
pub mod graph;
pub mod merkle;
pub mod pour;


// Re-export main types for easy access
pub use coin::{mint, verify_mint, verify_registration, Address, Coin, MintTransaction, Minted};
pub use config::PoolConfig;
pub use crypto::{CryptoUtils, EphemeralKeyPair, FieldElement};
pub use error::{ErrorKind, PoolError, PoolResult};
pub use graph::{
    Ballot, Candidate, CandidateId, CandidateStatus, ClaimReceipt, ClaimRequest, PoolEvent, PrivateGraph,
    Registration, RewardEpoch, SharedGraph, Verification, VoteReceipt,
};
pub use merkle::{MerkleProof, MerkleTree};
pub use pour::{
    pour, verify_pour, Proof, ProofBackend, ProofInputs, PourOutput, PourRequest, PourTransaction,
    ProverError, ReferenceProver, VariantTag,
};
