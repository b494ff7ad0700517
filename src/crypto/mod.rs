//! Cryptographic Primitives Module
//!
//! This module provides the primitives the shielded pool is built on:
//! - BN254 scalar field elements with unbiased sampling
//! - Poseidon hashes of arity 1 to 4
//! - One-time secp256k1 signatures with low-S enforcement
//! - Byte-oriented digests for transcripts

use blake2::Blake2s256;
use rand::rngs::OsRng;
use rand::RngCore;
use sha3::{Digest, Keccak256};

use crate::error::{PoolError, PoolResult};

pub mod field;
pub mod poseidon;
pub mod signatures;

pub use field::FieldElement;
pub use poseidon::{hash1, hash2, hash3, hash4};
pub use signatures::{EphemeralKeyPair, PublicKeyBytes, SignatureBytes};

/// Domain constants for byte-level digests
pub mod domains {
    /// Domain separator for reference proof transcripts
    pub const DOMAIN_PROOF: &[u8] = b"private-graph-pool-proof";
}

/// Cryptographic utilities
pub struct CryptoUtils;

impl CryptoUtils {
    /// Fill 32 bytes from the operating system RNG
    pub fn random_32() -> PoolResult<[u8; 32]> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| PoolError::Randomness(e.to_string()))?;
        Ok(bytes)
    }

    /// Hash data with Keccak-256
    pub fn keccak256(data: &[u8]) -> [u8; 32] {
        Keccak256::digest(data).into()
    }

    /// Hash data with BLAKE2s-256
    pub fn blake2s256(data: &[u8]) -> [u8; 32] {
        Blake2s256::digest(data).into()
    }

    /// Constant-time comparison of byte arrays
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        use subtle::ConstantTimeEq;
        a.ct_eq(b).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_utils() {
        let bytes = CryptoUtils::random_32().unwrap();
        assert_ne!(bytes, CryptoUtils::random_32().unwrap());

        let hash = CryptoUtils::keccak256(b"");
        assert_eq!(
            hex::encode(hash),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_ne!(CryptoUtils::blake2s256(b"test data"), [0u8; 32]);
    }

    #[test]
    fn test_constant_time_comparison() {
        let a = [1u8, 2u8, 3u8];
        let b = [1u8, 2u8, 3u8];
        let c = [1u8, 2u8, 4u8];

        assert!(CryptoUtils::constant_time_eq(&a, &b));
        assert!(!CryptoUtils::constant_time_eq(&a, &c));
    }
}
