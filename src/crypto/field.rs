//! BN254 Scalar Field Elements
//!
//! Every hash output, key, seed and trapdoor in the pool lives in the BN254
//! scalar field. Values cross process boundaries as decimal strings.

use std::fmt;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{BigInteger, BigInteger256, PrimeField, Zero};
use num_bigint::BigUint;
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::crypto::CryptoUtils;
use crate::error::{PoolError, PoolResult};

/// Upper bound on rejection-sampling attempts. The acceptance rate for a
/// 254-bit candidate is above 75%, so hitting this means the RNG is broken.
const MAX_SAMPLING_ATTEMPTS: usize = 256;

/// Element of the BN254 scalar field
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, SerializeDisplay, DeserializeFromStr)]
pub struct FieldElement(Fr);

impl FieldElement {
    /// The additive identity, also the "empty slot" sentinel of every tree
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    /// Wrap a raw field element
    pub fn from_fr(value: Fr) -> Self {
        Self(value)
    }

    /// Access the raw field element
    pub fn to_fr(self) -> Fr {
        self.0
    }

    /// True for the zero sentinel
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Sample a uniformly random field element from the OS RNG.
    ///
    /// Draws 256 bits, clears the top two so the candidate is below 2^254 and
    /// rejects any candidate that is not below the modulus. No modular
    /// reduction takes place, so the output carries no bias.
    pub fn random() -> PoolResult<Self> {
        for _ in 0..MAX_SAMPLING_ATTEMPTS {
            let mut bytes = CryptoUtils::random_32()?;
            bytes[31] &= 0x3f;
            if let Some(value) = Self::from_canonical(BigUint::from_bytes_le(&bytes)) {
                return Ok(value);
            }
        }
        Err(PoolError::Randomness(
            "rejection sampling did not produce an in-range field element".to_string(),
        ))
    }

    /// Reduce an arbitrary byte string (big-endian) into the field.
    /// Only used for public digests such as transcript hashes.
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Canonical 32-byte big-endian encoding
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        let bytes = self.0.into_bigint().to_bytes_be();
        let offset = out.len().saturating_sub(bytes.len());
        out[offset..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
        out
    }

    /// Interpret the element as a small unsigned integer, failing if it does
    /// not fit in a `u64`.
    pub fn to_u64(&self) -> PoolResult<u64> {
        let value = BigUint::from(self.0.into_bigint());
        u64::try_from(value).map_err(|_| {
            PoolError::MalformedEncoding(format!("field element {} does not fit in u64", self))
        })
    }

    fn from_canonical(value: BigUint) -> Option<Self> {
        BigInteger256::try_from(value)
            .ok()
            .and_then(Fr::from_bigint)
            .map(Self)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(Fr::from(value))
    }
}

impl From<Fr> for FieldElement {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", BigUint::from(self.0.into_bigint()))
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self)
    }
}

impl FromStr for FieldElement {
    type Err = PoolError;

    /// Parse a decimal string. Values at or above the modulus are rejected
    /// rather than silently reduced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PoolError::MalformedEncoding(format!(
                "'{}' is not a decimal field element",
                s
            )));
        }
        let value = BigUint::from_str(trimmed)
            .map_err(|e| PoolError::MalformedEncoding(e.to_string()))?;
        Self::from_canonical(value).ok_or_else(|| {
            PoolError::MalformedEncoding(format!("'{}' is not below the field modulus", s))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULUS: &str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    #[test]
    fn test_decimal_round_trip() {
        let value = FieldElement::from(1234567890u64);
        assert_eq!(value.to_string(), "1234567890");
        assert_eq!("1234567890".parse::<FieldElement>().unwrap(), value);
        assert_eq!(FieldElement::zero().to_string(), "0");
    }

    #[test]
    fn test_rejects_non_canonical() {
        assert!(MODULUS.parse::<FieldElement>().is_err());
        assert!("-1".parse::<FieldElement>().is_err());
        assert!("0x10".parse::<FieldElement>().is_err());
        assert!("".parse::<FieldElement>().is_err());

        let max = "21888242871839275222246405745257275088548364400416034343698204186575808495616";
        let parsed = max.parse::<FieldElement>().unwrap();
        assert_eq!(parsed.to_string(), max);
    }

    #[test]
    fn test_random_elements_differ() {
        let a = FieldElement::random().unwrap();
        let b = FieldElement::random().unwrap();
        assert_ne!(a, b);
        assert!(a.to_string().parse::<FieldElement>().is_ok());
    }

    #[test]
    fn test_be_bytes_and_u64() {
        let value = FieldElement::from(0x0102u64);
        let bytes = value.to_be_bytes();
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert!(bytes[..30].iter().all(|&b| b == 0));
        assert_eq!(value.to_u64().unwrap(), 0x0102);

        let big: FieldElement = "18446744073709551616".parse().unwrap();
        assert!(big.to_u64().is_err());
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let value = FieldElement::from(42u64);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"42\"");
        let back: FieldElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        assert!(serde_json::from_str::<FieldElement>("\"forty-two\"").is_err());
    }
}
