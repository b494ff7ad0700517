//! Poseidon Hash Family
//!
//! Fixed-arity Poseidon over the BN254 scalar field with circomlib parameters
//! (x^5 S-box, 8 full rounds), so digests agree with the circuits and the
//! on-chain PoseidonT2..T5 libraries. Arity 1 through 4 are used by the pool.

use std::cell::RefCell;
use std::collections::HashMap;

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};

use crate::crypto::FieldElement;
use crate::error::{PoolError, PoolResult};

thread_local! {
    /// Round constants are expensive to expand; keep one sponge per arity.
    static SPONGES: RefCell<HashMap<usize, Poseidon<Fr>>> = RefCell::new(HashMap::new());
}

/// Hash an arbitrary number of field elements (1..=12) with the sponge of
/// matching width.
pub fn poseidon_hash(inputs: &[FieldElement]) -> PoolResult<FieldElement> {
    let arity = inputs.len();
    if arity == 0 {
        return Err(PoolError::HashError("Poseidon needs at least one input".to_string()));
    }
    let frs: Vec<Fr> = inputs.iter().map(|x| x.to_fr()).collect();

    SPONGES.with(|cell| {
        let mut sponges = cell.borrow_mut();
        if !sponges.contains_key(&arity) {
            let sponge = Poseidon::<Fr>::new_circom(arity)
                .map_err(|e| PoolError::HashError(format!("arity {}: {}", arity, e)))?;
            sponges.insert(arity, sponge);
        }
        let sponge = sponges
            .get_mut(&arity)
            .ok_or_else(|| PoolError::HashError(format!("no sponge for arity {}", arity)))?;
        sponge
            .hash(&frs)
            .map(FieldElement::from_fr)
            .map_err(|e| PoolError::HashError(e.to_string()))
    })
}

/// Poseidon with one input
pub fn hash1(a: FieldElement) -> PoolResult<FieldElement> {
    poseidon_hash(&[a])
}

/// Poseidon with two inputs; also the Merkle node hash
pub fn hash2(a: FieldElement, b: FieldElement) -> PoolResult<FieldElement> {
    poseidon_hash(&[a, b])
}

/// Poseidon with three inputs
pub fn hash3(a: FieldElement, b: FieldElement, c: FieldElement) -> PoolResult<FieldElement> {
    poseidon_hash(&[a, b, c])
}

/// Poseidon with four inputs
pub fn hash4(
    a: FieldElement,
    b: FieldElement,
    c: FieldElement,
    d: FieldElement,
) -> PoolResult<FieldElement> {
    poseidon_hash(&[a, b, c, d])
}
