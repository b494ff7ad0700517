//! Incremental Merkle Tree
//!
//! Fixed-depth binary tree over Poseidon with zero as the empty leaf. Only the
//! populated prefix of each level is stored; everything to the right of it is
//! an empty subtree whose hash comes from a precomputed table. Every mutation
//! appends the new root to an append-only history so that proofs built
//! against an older root remain usable as anchors.

use serde::{Deserialize, Serialize};

use crate::crypto::{hash2, FieldElement};
use crate::error::{PoolError, PoolResult};

/// Depth used by every pool tree
pub const DEFAULT_DEPTH: usize = 32;

/// Largest supported depth
pub const MAX_DEPTH: usize = 32;

/// Membership proof for a single leaf
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    /// The proven leaf
    pub leaf: FieldElement,
    /// Leaf position
    pub leaf_index: usize,
    /// Sibling hashes, leaf level first
    pub siblings: Vec<FieldElement>,
    /// Path bits (0 = node is a left child, 1 = right child)
    pub path_indices: Vec<u8>,
    /// Root the proof was generated against
    pub root: FieldElement,
}

/// A leaf insertion whose hashes have been computed but not yet written.
///
/// Splitting insertion in two lets the pool hash every path a transition
/// touches before mutating any tree.
#[derive(Debug, Clone)]
#[must_use]
pub struct PendingInsert {
    index: usize,
    root_before: FieldElement,
    path: Vec<FieldElement>,
}

impl PendingInsert {
    /// Position the leaf will occupy
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Append-only authenticated tree over commitments
#[derive(Debug, Clone)]
pub struct MerkleTree {
    depth: usize,
    /// zeros[l] is the root of an empty subtree of height l
    zeros: Vec<FieldElement>,
    /// nodes[0] are the leaves, nodes[depth] holds the root once non-empty
    nodes: Vec<Vec<FieldElement>>,
    roots: Vec<FieldElement>,
}

impl MerkleTree {
    /// Create an empty tree of the given depth
    pub fn new(depth: usize) -> PoolResult<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(PoolError::InvalidArgument(format!(
                "tree depth must be in 1..={}, got {}",
                MAX_DEPTH, depth
            )));
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(FieldElement::zero());
        for level in 0..depth {
            let below = zeros[level];
            zeros.push(hash2(below, below)?);
        }

        let empty_root = zeros[depth];
        Ok(Self {
            depth,
            zeros,
            nodes: vec![Vec::new(); depth + 1],
            roots: vec![empty_root],
        })
    }

    /// Tree depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Maximum number of leaves
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Number of leaves, including removed (zeroed) slots
    pub fn len(&self) -> usize {
        self.nodes[0].len()
    }

    /// True if no leaf was ever inserted
    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }

    /// Current leaves in insertion order
    pub fn leaves(&self) -> &[FieldElement] {
        &self.nodes[0]
    }

    /// Current root
    pub fn root(&self) -> FieldElement {
        self.nodes[self.depth]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.depth])
    }

    /// Every root this tree has ever had, oldest first
    pub fn roots(&self) -> &[FieldElement] {
        &self.roots
    }

    /// True if `root` appears anywhere in the root history
    pub fn is_known_root(&self, root: &FieldElement) -> bool {
        self.roots.iter().rev().any(|r| r == root)
    }

    /// Index of the first occurrence of `leaf`
    pub fn index_of(&self, leaf: &FieldElement) -> Option<usize> {
        if leaf.is_zero() {
            return None;
        }
        self.nodes[0].iter().position(|l| l == leaf)
    }

    /// Append a leaf and return its index
    pub fn add_member(&mut self, leaf: FieldElement) -> PoolResult<usize> {
        let pending = self.prepare_insert(leaf)?;
        self.commit_insert(pending)
    }

    /// Hash the path for appending `leaf` without touching the tree
    pub fn prepare_insert(&self, leaf: FieldElement) -> PoolResult<PendingInsert> {
        if leaf.is_zero() {
            return Err(PoolError::ZeroLeaf);
        }
        if self.len() as u64 >= self.capacity() {
            return Err(PoolError::TreeFull(self.capacity()));
        }

        let index = self.len();
        Ok(PendingInsert {
            index,
            root_before: self.root(),
            path: self.compute_path(index, leaf)?,
        })
    }

    /// Write a previously prepared insertion
    pub fn commit_insert(&mut self, pending: PendingInsert) -> PoolResult<usize> {
        if pending.index != self.len() || pending.root_before != self.root() {
            return Err(PoolError::InvalidArgument(
                "pending insert was prepared against a different tree state".to_string(),
            ));
        }
        self.write_path(pending.index, &pending.path);
        Ok(pending.index)
    }

    /// Replace the leaf at `index` with a new non-zero value
    pub fn update_member(&mut self, index: usize, leaf: FieldElement) -> PoolResult<()> {
        if leaf.is_zero() {
            return Err(PoolError::ZeroLeaf);
        }
        self.ensure_live(index)?;
        let path = self.compute_path(index, leaf)?;
        self.write_path(index, &path);
        Ok(())
    }

    /// Zero the leaf at `index`
    pub fn remove_member(&mut self, index: usize) -> PoolResult<()> {
        self.ensure_live(index)?;
        let path = self.compute_path(index, FieldElement::zero())?;
        self.write_path(index, &path);
        Ok(())
    }

    /// Build a membership proof for the leaf at `index` against the current root
    pub fn generate_merkle_proof(&self, index: usize) -> PoolResult<MerkleProof> {
        if index >= self.len() {
            return Err(PoolError::LeafIndexOutOfRange { index, len: self.len() });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        let mut position = index;

        for level in 0..self.depth {
            siblings.push(self.node(level, position ^ 1));
            path_indices.push((position & 1) as u8);
            position >>= 1;
        }

        Ok(MerkleProof {
            leaf: self.nodes[0][index],
            leaf_index: index,
            siblings,
            path_indices,
            root: self.root(),
        })
    }

    /// Recompute the root from the proof and compare it to `proof.root`.
    /// A proof of the wrong shape is an error, not a `false`.
    pub fn verify_merkle_proof(&self, proof: &MerkleProof) -> PoolResult<bool> {
        if proof.siblings.len() != self.depth {
            return Err(PoolError::MalformedEncoding(format!(
                "proof has {} siblings, tree depth is {}",
                proof.siblings.len(),
                self.depth
            )));
        }
        let computed = compute_root(proof.leaf, &proof.siblings, &proof.path_indices)?;
        Ok(computed == proof.root)
    }

    fn ensure_live(&self, index: usize) -> PoolResult<()> {
        match self.nodes[0].get(index) {
            None => Err(PoolError::LeafIndexOutOfRange { index, len: self.len() }),
            Some(leaf) if leaf.is_zero() => Err(PoolError::LeafRemoved(index)),
            Some(_) => Ok(()),
        }
    }

    fn node(&self, level: usize, position: usize) -> FieldElement {
        self.nodes[level]
            .get(position)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Node values from the leaf up to the root for `leaf` placed at `index`
    fn compute_path(&self, index: usize, leaf: FieldElement) -> PoolResult<Vec<FieldElement>> {
        let mut path = Vec::with_capacity(self.depth + 1);
        let mut current = leaf;
        let mut position = index;
        path.push(current);

        for level in 0..self.depth {
            let sibling = self.node(level, position ^ 1);
            current = if position & 1 == 0 {
                hash2(current, sibling)?
            } else {
                hash2(sibling, current)?
            };
            position >>= 1;
            path.push(current);
        }
        Ok(path)
    }

    fn write_path(&mut self, index: usize, path: &[FieldElement]) {
        for (level, value) in path.iter().enumerate() {
            let position = index >> level;
            let row = &mut self.nodes[level];
            if position == row.len() {
                row.push(*value);
            } else {
                row[position] = *value;
            }
        }
        self.roots.push(self.root());
    }
}

/// Fold a leaf up through its siblings. Used by the tree and by proof
/// backends that check membership on their own.
pub fn compute_root(
    leaf: FieldElement,
    siblings: &[FieldElement],
    path_indices: &[u8],
) -> PoolResult<FieldElement> {
    if siblings.len() != path_indices.len() {
        return Err(PoolError::MalformedEncoding(format!(
            "{} siblings but {} path bits",
            siblings.len(),
            path_indices.len()
        )));
    }

    let mut current = leaf;
    for (sibling, bit) in siblings.iter().zip(path_indices) {
        current = match bit {
            0 => hash2(current, *sibling)?,
            1 => hash2(*sibling, current)?,
            other => {
                return Err(PoolError::MalformedEncoding(format!(
                    "path bit must be 0 or 1, got {}",
                    other
                )))
            }
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from(v)
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.capacity(), 1u64 << 32);

        let zero = FieldElement::zero();
        let mut expected = zero;
        for _ in 0..DEFAULT_DEPTH {
            expected = hash2(expected, expected).unwrap();
        }
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_add_member() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        assert_eq!(tree.add_member(fe(101)).unwrap(), 0);
        assert_eq!(tree.add_member(fe(102)).unwrap(), 1);
        assert_eq!(tree.add_member(fe(103)).unwrap(), 2);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.roots().len(), 4);
        assert_eq!(tree.index_of(&fe(102)), Some(1));
        assert_eq!(tree.index_of(&fe(999)), None);
    }

    #[test]
    fn test_zero_leaf_rejected() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        let root = tree.root();
        assert!(matches!(tree.add_member(FieldElement::zero()), Err(PoolError::ZeroLeaf)));
        assert_eq!(tree.root(), root);
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn test_root_matches_manual_computation() {
        let mut tree = MerkleTree::new(2).unwrap();
        tree.add_member(fe(1)).unwrap();
        tree.add_member(fe(2)).unwrap();
        tree.add_member(fe(3)).unwrap();

        let left = hash2(fe(1), fe(2)).unwrap();
        let right = hash2(fe(3), FieldElement::zero()).unwrap();
        assert_eq!(tree.root(), hash2(left, right).unwrap());
    }

    #[test]
    fn test_proof_generation_and_verification() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        for v in 1..=5 {
            tree.add_member(fe(v * 11)).unwrap();
        }

        for index in 0..5 {
            let proof = tree.generate_merkle_proof(index).unwrap();
            assert_eq!(proof.siblings.len(), DEFAULT_DEPTH);
            assert_eq!(proof.path_indices.len(), DEFAULT_DEPTH);
            assert_eq!(proof.root, tree.root());
            assert!(tree.verify_merkle_proof(&proof).unwrap());
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        tree.add_member(fe(7)).unwrap();
        tree.add_member(fe(8)).unwrap();

        let mut proof = tree.generate_merkle_proof(1).unwrap();
        proof.leaf = fe(9);
        assert!(!tree.verify_merkle_proof(&proof).unwrap());

        let mut proof = tree.generate_merkle_proof(1).unwrap();
        proof.path_indices[0] = 0;
        assert!(!tree.verify_merkle_proof(&proof).unwrap());
    }

    #[test]
    fn test_malformed_proof_is_an_error() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        tree.add_member(fe(7)).unwrap();

        let mut proof = tree.generate_merkle_proof(0).unwrap();
        proof.siblings.pop();
        assert!(tree.verify_merkle_proof(&proof).is_err());

        let mut proof = tree.generate_merkle_proof(0).unwrap();
        proof.path_indices[3] = 2;
        assert!(tree.verify_merkle_proof(&proof).is_err());

        assert!(tree.generate_merkle_proof(1).is_err());
    }

    #[test]
    fn test_old_proofs_remain_anchored() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        tree.add_member(fe(1)).unwrap();
        let old = tree.generate_merkle_proof(0).unwrap();

        tree.add_member(fe(2)).unwrap();
        tree.add_member(fe(3)).unwrap();

        assert_ne!(old.root, tree.root());
        assert!(tree.is_known_root(&old.root));
        assert!(tree.verify_merkle_proof(&old).unwrap());
        assert!(!tree.is_known_root(&fe(12345)));
    }

    #[test]
    fn test_update_and_remove() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        tree.add_member(fe(1)).unwrap();
        tree.add_member(fe(2)).unwrap();

        tree.update_member(0, fe(10)).unwrap();
        assert_eq!(tree.leaves()[0], fe(10));
        assert!(matches!(tree.update_member(0, FieldElement::zero()), Err(PoolError::ZeroLeaf)));

        tree.remove_member(0).unwrap();
        assert!(tree.leaves()[0].is_zero());
        assert!(matches!(tree.remove_member(0), Err(PoolError::LeafRemoved(0))));
        assert!(matches!(tree.update_member(0, fe(5)), Err(PoolError::LeafRemoved(0))));
        assert!(tree.remove_member(9).is_err());

        let proof = tree.generate_merkle_proof(1).unwrap();
        assert!(tree.verify_merkle_proof(&proof).unwrap());
        assert_eq!(tree.roots().len(), 5);
    }

    #[test]
    fn test_tree_full() {
        let mut tree = MerkleTree::new(1).unwrap();
        tree.add_member(fe(1)).unwrap();
        tree.add_member(fe(2)).unwrap();
        assert!(matches!(tree.add_member(fe(3)), Err(PoolError::TreeFull(2))));
    }

    #[test]
    fn test_stale_pending_insert() {
        let mut tree = MerkleTree::new(DEFAULT_DEPTH).unwrap();
        let first = tree.prepare_insert(fe(1)).unwrap();
        let second = tree.prepare_insert(fe(2)).unwrap();
        assert_eq!(first.index(), 0);

        tree.commit_insert(first).unwrap();
        assert!(tree.commit_insert(second).is_err());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_invalid_depth() {
        assert!(MerkleTree::new(0).is_err());
        assert!(MerkleTree::new(MAX_DEPTH + 1).is_err());
    }
}
