//! Candidate registry entries

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::FieldElement;
use crate::error::PoolResult;
use crate::merkle::MerkleTree;

/// Index of a candidate in the graph's registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub usize);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Candidate lifecycle. Candidate -> Verified only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    Candidate,
    Verified,
}

/// A recommended user and the coins voters have poured to it
#[derive(Debug, Clone)]
pub struct Candidate {
    pub(crate) id: CandidateId,
    pub(crate) name: String,
    pub(crate) verification_epoch: u64,
    pub(crate) status: CandidateStatus,
    pub(crate) own_pour_tree: MerkleTree,
    pub(crate) accumulated_power: u64,
    pub(crate) vote_count: u64,
    pub(crate) claimed_power: u64,
    pub(crate) nullifiers: HashSet<FieldElement>,
}

impl Candidate {
    pub(crate) fn new(id: CandidateId, name: String, epoch: u64, tree_depth: usize) -> PoolResult<Self> {
        Ok(Self {
            id,
            name,
            verification_epoch: epoch,
            status: CandidateStatus::Candidate,
            own_pour_tree: MerkleTree::new(tree_depth)?,
            accumulated_power: 0,
            vote_count: 0,
            claimed_power: 0,
            nullifiers: HashSet::new(),
        })
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registration epoch until verified, then the verification epoch
    pub fn verification_epoch(&self) -> u64 {
        self.verification_epoch
    }

    pub fn status(&self) -> CandidateStatus {
        self.status
    }

    pub fn is_verified(&self) -> bool {
        self.status == CandidateStatus::Verified
    }

    /// Tree holding the recommendation coins poured to this candidate
    pub fn own_pour_tree(&self) -> &MerkleTree {
        &self.own_pour_tree
    }

    pub fn accumulated_power(&self) -> u64 {
        self.accumulated_power
    }

    pub fn vote_count(&self) -> u64 {
        self.vote_count
    }

    /// Power already reclaimed through claims
    pub fn claimed_power(&self) -> u64 {
        self.claimed_power
    }

    /// Nullifiers revealed by claims against this candidate's tree
    pub fn nullifiers(&self) -> &HashSet<FieldElement> {
        &self.nullifiers
    }

    /// Serializable view
    pub fn snapshot(&self) -> CandidateSnapshot {
        CandidateSnapshot {
            id: self.id,
            name: self.name.clone(),
            verification_epoch: self.verification_epoch,
            status: self.status,
            accumulated_power: self.accumulated_power,
            vote_count: self.vote_count,
            claimed_power: self.claimed_power,
            tree_root: self.own_pour_tree.root(),
            tree_size: self.own_pour_tree.len(),
        }
    }
}

/// Candidate state without the tree itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub id: CandidateId,
    pub name: String,
    pub verification_epoch: u64,
    pub status: CandidateStatus,
    pub accumulated_power: u64,
    pub vote_count: u64,
    pub claimed_power: u64,
    pub tree_root: FieldElement,
    pub tree_size: usize,
}
