//! Coin and Address Model
//!
//! Addresses and coins of the shielded pool, plus the derivation rules that
//! tie them together:
//!
//! ```text
//! public     = Hash2(secret, 0)
//! k          = Hash2(r, Hash2(public, seed))
//! commitment = Hash3(k, 0, value)
//! nullifier  = Hash3(secret, 1, seed)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash2, hash3, FieldElement};
use crate::error::PoolResult;

pub mod mint;

pub use mint::{mint, verify_mint, verify_registration, MintTransaction, Minted};

/// Domain tags mixed into the Poseidon inputs
pub mod tags {
    /// Address derivation and coin commitments
    pub const COMMITMENT: u64 = 0;
    /// Serial numbers
    pub const NULLIFIER: u64 = 1;
    /// Binding of the one-time signing key to the spender
    pub const BINDING: u64 = 2;
}

/// Shielded address: a secret and the public key derived from it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Spending secret, never shared
    pub secret: FieldElement,
    /// Public key coins are addressed to
    pub public: FieldElement,
}

impl Address {
    /// Sample a fresh address
    pub fn generate() -> PoolResult<Self> {
        Self::from_secret(FieldElement::random()?)
    }

    /// Rebuild an address from its secret
    pub fn from_secret(secret: FieldElement) -> PoolResult<Self> {
        Ok(Self {
            secret,
            public: derive_public_key(secret)?,
        })
    }

    /// Serial number this address reveals when spending a coin with `seed`
    pub fn nullifier(&self, seed: FieldElement) -> PoolResult<FieldElement> {
        derive_nullifier(self.secret, seed)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A shielded coin. Only its commitment is ever published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Public key of the owner
    pub owner_public_key: FieldElement,
    /// Voting power carried by the coin
    pub value: u64,
    /// Nullifier seed
    pub seed: FieldElement,
    /// Commitment trapdoor
    pub trapdoor_r: FieldElement,
    /// Second trapdoor, carried for the mint transaction but not committed to
    pub trapdoor_s: FieldElement,
    /// Hash3(k, 0, value)
    pub commitment: FieldElement,
}

impl Coin {
    /// Create a coin for `owner_public_key` with freshly sampled seed and trapdoors
    pub fn new(owner_public_key: FieldElement, value: u64) -> PoolResult<Self> {
        Self::from_parts(
            owner_public_key,
            value,
            FieldElement::random()?,
            FieldElement::random()?,
            FieldElement::random()?,
        )
    }

    /// Assemble a coin from explicit randomness
    pub fn from_parts(
        owner_public_key: FieldElement,
        value: u64,
        seed: FieldElement,
        trapdoor_r: FieldElement,
        trapdoor_s: FieldElement,
    ) -> PoolResult<Self> {
        let k = derive_k(owner_public_key, seed, trapdoor_r)?;
        Ok(Self {
            owner_public_key,
            value,
            seed,
            trapdoor_r,
            trapdoor_s,
            commitment: commit(k, value)?,
        })
    }

    /// The intermediate commitment k
    pub fn k(&self) -> PoolResult<FieldElement> {
        derive_k(self.owner_public_key, self.seed, self.trapdoor_r)
    }

    /// Recompute the commitment from the coin's fields
    pub fn is_well_formed(&self) -> PoolResult<bool> {
        Ok(commit(self.k()?, self.value)? == self.commitment)
    }
}

/// public = Hash2(secret, 0)
pub fn derive_public_key(secret: FieldElement) -> PoolResult<FieldElement> {
    hash2(secret, FieldElement::from(tags::COMMITMENT))
}

/// k = Hash2(r, Hash2(public, seed))
pub fn derive_k(
    owner_public_key: FieldElement,
    seed: FieldElement,
    trapdoor_r: FieldElement,
) -> PoolResult<FieldElement> {
    hash2(trapdoor_r, hash2(owner_public_key, seed)?)
}

/// commitment = Hash3(k, 0, value)
pub fn commit(k: FieldElement, value: u64) -> PoolResult<FieldElement> {
    hash3(k, FieldElement::from(tags::COMMITMENT), FieldElement::from(value))
}

/// nullifier = Hash3(secret, 1, seed)
pub fn derive_nullifier(secret: FieldElement, seed: FieldElement) -> PoolResult<FieldElement> {
    hash3(secret, FieldElement::from(tags::NULLIFIER), seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_derivation() {
        let address = Address::generate().unwrap();
        assert_eq!(
            address.public,
            hash2(address.secret, FieldElement::zero()).unwrap()
        );
        assert_eq!(Address::from_secret(address.secret).unwrap(), address);
    }

    #[test]
    fn test_address_debug_hides_secret() {
        let address = Address::generate().unwrap();
        let rendered = format!("{:?}", address);
        assert!(!rendered.contains(&address.secret.to_string()));
        assert!(rendered.contains(&address.public.to_string()));
    }

    #[test]
    fn test_coin_commitment() {
        let owner = Address::generate().unwrap();
        let coin = Coin::new(owner.public, 100).unwrap();
        assert!(coin.is_well_formed().unwrap());

        let k = hash2(coin.trapdoor_r, hash2(owner.public, coin.seed).unwrap()).unwrap();
        assert_eq!(
            coin.commitment,
            hash3(k, FieldElement::zero(), FieldElement::from(100u64)).unwrap()
        );
    }

    #[test]
    fn test_trapdoor_s_not_committed() {
        let owner = FieldElement::from(77u64);
        let seed = FieldElement::from(1u64);
        let r = FieldElement::from(2u64);
        let a = Coin::from_parts(owner, 5, seed, r, FieldElement::from(3u64)).unwrap();
        let b = Coin::from_parts(owner, 5, seed, r, FieldElement::from(4u64)).unwrap();
        assert_eq!(a.commitment, b.commitment);

        let c = Coin::from_parts(owner, 6, seed, r, FieldElement::from(3u64)).unwrap();
        assert_ne!(a.commitment, c.commitment);
    }

    #[test]
    fn test_tampered_coin_is_not_well_formed() {
        let mut coin = Coin::new(FieldElement::from(9u64), 40).unwrap();
        coin.value = 41;
        assert!(!coin.is_well_formed().unwrap());
    }

    #[test]
    fn test_nullifier_determinism() {
        let a = Address::generate().unwrap();
        let b = Address::generate().unwrap();
        let seed = FieldElement::random().unwrap();

        assert_eq!(a.nullifier(seed).unwrap(), a.nullifier(seed).unwrap());
        assert_eq!(a.nullifier(seed).unwrap(), derive_nullifier(a.secret, seed).unwrap());
        assert_ne!(a.nullifier(seed).unwrap(), b.nullifier(seed).unwrap());
    }
}
