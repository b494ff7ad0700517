//! Mint Transactions
//!
//! A mint commits fresh value to an owner's public key and publishes the
//! pieces anyone needs to check the commitment without learning the owner.

use serde::{Deserialize, Serialize};

use crate::coin::{commit, Coin};
use crate::crypto::FieldElement;
use crate::error::PoolResult;

/// Public artifact of a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintTransaction {
    pub commitment: FieldElement,
    pub value: u64,
    pub k: FieldElement,
    pub trapdoor_s: FieldElement,
}

/// Result of [`mint`]: the private coin and its public transaction
#[derive(Debug, Clone)]
pub struct Minted {
    pub coin: Coin,
    pub mint_tx: MintTransaction,
}

/// Mint a coin of `value` for `owner_public_key`.
///
/// Seed and trapdoors are sampled from the OS RNG; the only failure mode is
/// the RNG itself.
pub fn mint(owner_public_key: FieldElement, value: u64) -> PoolResult<Minted> {
    let coin = Coin::new(owner_public_key, value)?;
    let mint_tx = MintTransaction {
        commitment: coin.commitment,
        value,
        k: coin.k()?,
        trapdoor_s: coin.trapdoor_s,
    };
    Ok(Minted { coin, mint_tx })
}

/// Check `commitment == Hash3(k, 0, value)`
pub fn verify_mint(commitment: FieldElement, value: u64, k: FieldElement) -> PoolResult<bool> {
    Ok(commit(k, value)? == commitment)
}

/// Ledger-side registration check: the mint verifies and carries exactly the
/// registration value.
pub fn verify_registration(mint_tx: &MintTransaction, registration_value: u64) -> PoolResult<bool> {
    if mint_tx.value != registration_value {
        return Ok(false);
    }
    verify_mint(mint_tx.commitment, mint_tx.value, mint_tx.k)
}

impl MintTransaction {
    /// Verify this transaction's commitment
    pub fn verify(&self) -> PoolResult<bool> {
        verify_mint(self.commitment, self.value, self.k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::Address;

    #[test]
    fn test_mint_round_trip() {
        let owner = Address::generate().unwrap();
        let minted = mint(owner.public, 100).unwrap();

        assert_eq!(minted.coin.value, 100);
        assert_eq!(minted.coin.owner_public_key, owner.public);
        assert_eq!(minted.mint_tx.commitment, minted.coin.commitment);
        assert!(verify_mint(minted.mint_tx.commitment, 100, minted.mint_tx.k).unwrap());
        assert!(minted.mint_tx.verify().unwrap());
    }

    #[test]
    fn test_mint_rejects_wrong_value() {
        let minted = mint(FieldElement::from(5u64), 100).unwrap();
        assert!(!verify_mint(minted.mint_tx.commitment, 99, minted.mint_tx.k).unwrap());
    }

    #[test]
    fn test_independent_mints_do_not_cross_verify() {
        let owner = Address::generate().unwrap();
        let a = mint(owner.public, 100).unwrap();
        let b = mint(owner.public, 100).unwrap();

        assert_ne!(a.mint_tx.commitment, b.mint_tx.commitment);
        assert!(!verify_mint(a.mint_tx.commitment, 100, b.mint_tx.k).unwrap());
    }

    #[test]
    fn test_verify_registration() {
        let owner = Address::generate().unwrap();
        let registration = mint(owner.public, 100).unwrap();
        assert!(verify_registration(&registration.mint_tx, 100).unwrap());

        let short = mint(owner.public, 1).unwrap();
        assert!(!verify_registration(&short.mint_tx, 100).unwrap());

        let mut forged = registration.mint_tx.clone();
        forged.k = FieldElement::from(1u64);
        assert!(!verify_registration(&forged, 100).unwrap());
    }

    #[test]
    fn test_mint_tx_json_uses_decimal_strings() {
        let minted = mint(FieldElement::from(3u64), 100).unwrap();
        let json = serde_json::to_value(&minted.mint_tx).unwrap();

        assert_eq!(json["value"], 100);
        assert_eq!(json["commitment"], minted.mint_tx.commitment.to_string());

        let back: MintTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, minted.mint_tx);
    }
}
