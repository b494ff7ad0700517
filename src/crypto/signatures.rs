//! One-Time Pour Signatures
//!
//! Each pour is authorised by a fresh secp256k1 key that signs the keccak-256
//! digest of the pour transcript and is then discarded. Signatures are always
//! emitted and accepted in low-S form, so a single authorisation has exactly
//! one valid encoding.

use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};

use crate::crypto::{poseidon, CryptoUtils, FieldElement};
use crate::error::{PoolError, PoolResult};

/// Compressed secp256k1 public key
pub type PublicKeyBytes = [u8; 33];

/// Compact (r || s) ECDSA signature
pub type SignatureBytes = [u8; 64];

/// Upper bound on key sampling attempts; a 32-byte string is a valid scalar
/// with probability 1 - 2^-128.
const MAX_KEY_ATTEMPTS: usize = 16;

/// Ephemeral signing key pair used for exactly one pour
pub struct EphemeralKeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new key pair from the OS RNG
    pub fn generate() -> PoolResult<Self> {
        let secp = Secp256k1::new();
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key_bytes = CryptoUtils::random_32()?;
            if let Ok(secret_key) = SecretKey::from_slice(&key_bytes) {
                let public_key = secret_key.public_key(&secp);
                return Ok(Self { secret_key, public_key });
            }
        }
        Err(PoolError::Randomness("could not sample a secp256k1 scalar".to_string()))
    }

    /// Compressed public key
    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        self.public_key.serialize()
    }

    /// Sign `message`, normalise to low-S and check the result against the
    /// public key before handing it out.
    pub fn sign(&self, message: &[u8]) -> PoolResult<SignatureBytes> {
        let secp = Secp256k1::new();
        let digest = message_digest(message)?;

        let mut signature = secp.sign_ecdsa(&digest, &self.secret_key);
        signature.normalize_s();

        secp.verify_ecdsa(&digest, &signature, &self.public_key)
            .map_err(|e| PoolError::InvalidSignature(format!("signer produced a bad signature: {}", e)))?;

        Ok(signature.serialize_compact())
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public_key", &hex::encode(self.public_key.serialize()))
            .finish_non_exhaustive()
    }
}

/// Verify a compact signature over `message`.
///
/// Returns `Ok(false)` for a well-formed signature that does not verify or is
/// not in low-S form. Unparseable keys or signatures are errors.
pub fn verify_signature(
    public_key: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> PoolResult<bool> {
    let secp = Secp256k1::new();
    let public_key = PublicKey::from_slice(public_key)
        .map_err(|e| PoolError::MalformedEncoding(format!("ephemeral public key: {}", e)))?;
    let parsed = parse_signature(signature)?;

    if !is_low_s(&parsed) {
        return Ok(false);
    }

    let digest = message_digest(message)?;
    Ok(secp.verify_ecdsa(&digest, &parsed, &public_key).is_ok())
}

/// Map a signature to its canonical low-S encoding
pub fn canonicalize_signature(signature: &SignatureBytes) -> PoolResult<SignatureBytes> {
    let mut parsed = parse_signature(signature)?;
    parsed.normalize_s();
    Ok(parsed.serialize_compact())
}

/// `Hash1` of the ephemeral public key, the value bound into `h_sig`
pub fn public_key_digest(public_key: &PublicKeyBytes) -> PoolResult<FieldElement> {
    let reduced = FieldElement::from_be_bytes_mod_order(&CryptoUtils::keccak256(public_key));
    poseidon::hash1(reduced)
}

fn parse_signature(signature: &SignatureBytes) -> PoolResult<ecdsa::Signature> {
    ecdsa::Signature::from_compact(signature)
        .map_err(|e| PoolError::MalformedEncoding(format!("signature: {}", e)))
}

fn is_low_s(signature: &ecdsa::Signature) -> bool {
    let mut normalized = *signature;
    normalized.normalize_s();
    normalized == *signature
}

fn message_digest(message: &[u8]) -> PoolResult<Message> {
    let hash = CryptoUtils::keccak256(message);
    Message::from_digest_slice(&hash).map_err(|e| PoolError::HashError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    const CURVE_ORDER: &str = "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141";

    /// Flip a signature to its high-S twin (n - s)
    fn high_s_twin(signature: &SignatureBytes) -> SignatureBytes {
        let n = BigUint::parse_bytes(CURVE_ORDER.as_bytes(), 16).unwrap();
        let s = BigUint::from_bytes_be(&signature[32..]);
        let flipped = (n - s).to_bytes_be();

        let mut out = *signature;
        out[32..].fill(0);
        out[64 - flipped.len()..].copy_from_slice(&flipped);
        out
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = EphemeralKeyPair::generate().unwrap();
        let message = b"pour transcript";

        let signature = keys.sign(message).unwrap();
        assert!(verify_signature(&keys.public_key_bytes(), message, &signature).unwrap());
        assert!(!verify_signature(&keys.public_key_bytes(), b"other transcript", &signature).unwrap());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let keys = EphemeralKeyPair::generate().unwrap();
        let other = EphemeralKeyPair::generate().unwrap();
        let signature = keys.sign(b"msg").unwrap();
        assert!(!verify_signature(&other.public_key_bytes(), b"msg", &signature).unwrap());
    }

    #[test]
    fn test_high_s_twin_is_not_accepted() {
        let keys = EphemeralKeyPair::generate().unwrap();
        let signature = keys.sign(b"malleable?").unwrap();
        let twin = high_s_twin(&signature);

        assert_ne!(twin, signature);
        assert!(!verify_signature(&keys.public_key_bytes(), b"malleable?", &twin).unwrap());
        assert_eq!(canonicalize_signature(&twin).unwrap(), signature);
        assert_eq!(canonicalize_signature(&signature).unwrap(), signature);
    }

    #[test]
    fn test_malformed_key_is_an_error() {
        let keys = EphemeralKeyPair::generate().unwrap();
        let signature = keys.sign(b"msg").unwrap();
        let bogus = [7u8; 33];
        assert!(verify_signature(&bogus, b"msg", &signature).is_err());
    }

    #[test]
    fn test_public_key_digest_is_stable() {
        let keys = EphemeralKeyPair::generate().unwrap();
        let pk = keys.public_key_bytes();
        assert_eq!(public_key_digest(&pk).unwrap(), public_key_digest(&pk).unwrap());
    }
}
