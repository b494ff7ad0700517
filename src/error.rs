//! Pool Error Types
//!
//! Every failure the pool can surface, grouped into four kinds so callers can
//! tell recoverable policy failures apart from cryptographic faults.

use crate::graph::CandidateStatus;

/// Broad classification of a [`PoolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied an argument the operation can never accept
    InvalidArgument,
    /// The request conflicts with the current pool state
    StateViolation,
    /// A commitment, signature, binding hash or proof did not check out
    CryptographicFailure,
    /// The proof backend or another collaborator failed
    ExternalCollaboratorFailure,
}

/// Pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Leaf value cannot be the zero sentinel")]
    ZeroLeaf,

    #[error("Leaf index {index} is out of range (tree holds {len} leaves)")]
    LeafIndexOutOfRange { index: usize, len: usize },

    #[error("Leaf at index {0} has already been removed")]
    LeafRemoved(usize),

    #[error("Tree is full (capacity {0})")]
    TreeFull(u64),

    #[error("Commitment {0} is not a member of the tree")]
    UnknownCommitment(String),

    #[error("Nullifier {0} has already been revealed")]
    DoubleSpend(String),

    #[error("Root {0} is not a known anchor")]
    UnknownRoot(String),

    #[error("Candidate {0} does not exist")]
    UnknownCandidate(usize),

    #[error("Vote cap exceeded: {current} + {weight} > {cap}")]
    ThresholdExceeded { current: u64, weight: u64, cap: u64 },

    #[error("Insufficient voting power: {power} < {threshold}")]
    InsufficientPower { power: u64, threshold: u64 },

    #[error("Candidate status is {actual:?}, operation requires {required:?}")]
    WrongStatus {
        required: CandidateStatus,
        actual: CandidateStatus,
    },

    #[error("Candidate verified in epoch {verification_epoch}, cannot claim in epoch {current_epoch}")]
    EpochNotReached {
        verification_epoch: u64,
        current_epoch: u64,
    },

    #[error("Reward pool for epoch {epoch} is exhausted")]
    RewardPoolExhausted { epoch: u64 },

    #[error("Value overflow: {0}")]
    ValueOverflow(String),

    #[error("Commitment mismatch: {0}")]
    CommitmentMismatch(String),

    #[error("Binding hash mismatch")]
    BindingHashMismatch,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Proof rejected: {0}")]
    ProofRejected(String),

    #[error("Hash function error: {0}")]
    HashError(String),

    #[error("Secure randomness unavailable: {0}")]
    Randomness(String),

    #[error("Proof backend failure: {0}")]
    ProofBackend(String),
}

impl PoolError {
    /// Classify this error into one of the four error kinds
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::InvalidArgument(_)
            | PoolError::InvalidConfig(_)
            | PoolError::MalformedEncoding(_)
            | PoolError::ZeroLeaf
            | PoolError::LeafIndexOutOfRange { .. }
            | PoolError::ValueOverflow(_) => ErrorKind::InvalidArgument,

            PoolError::LeafRemoved(_)
            | PoolError::TreeFull(_)
            | PoolError::UnknownCommitment(_)
            | PoolError::DoubleSpend(_)
            | PoolError::UnknownRoot(_)
            | PoolError::UnknownCandidate(_)
            | PoolError::ThresholdExceeded { .. }
            | PoolError::InsufficientPower { .. }
            | PoolError::WrongStatus { .. }
            | PoolError::EpochNotReached { .. }
            | PoolError::RewardPoolExhausted { .. } => ErrorKind::StateViolation,

            PoolError::CommitmentMismatch(_)
            | PoolError::BindingHashMismatch
            | PoolError::InvalidSignature(_)
            | PoolError::ProofRejected(_)
            | PoolError::HashError(_) => ErrorKind::CryptographicFailure,

            PoolError::Randomness(_) | PoolError::ProofBackend(_) => {
                ErrorKind::ExternalCollaboratorFailure
            }
        }
    }

    /// True for the outcomes a verification function reports as `false`
    /// rather than as an error.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PoolError::DoubleSpend(_)
                | PoolError::UnknownRoot(_)
                | PoolError::BindingHashMismatch
                | PoolError::InvalidSignature(_)
                | PoolError::ProofRejected(_)
        )
    }
}

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PoolError::ZeroLeaf.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            PoolError::DoubleSpend("1".to_string()).kind(),
            ErrorKind::StateViolation
        );
        assert_eq!(
            PoolError::ThresholdExceeded { current: 900, weight: 200, cap: 1000 }.kind(),
            ErrorKind::StateViolation
        );
        assert_eq!(PoolError::BindingHashMismatch.kind(), ErrorKind::CryptographicFailure);
        assert_eq!(
            PoolError::ProofBackend("offline".to_string()).kind(),
            ErrorKind::ExternalCollaboratorFailure
        );
    }

    #[test]
    fn test_rejections() {
        assert!(PoolError::UnknownRoot("7".to_string()).is_rejection());
        assert!(!PoolError::MalformedEncoding("bad".to_string()).is_rejection());
        assert!(!PoolError::ProofBackend("down".to_string()).is_rejection());
    }
}
