//! Pour Engine
//!
//! A pour spends one coin and creates two. The spender reveals the old coin's
//! nullifier, publishes the two new commitments, proves the relation through
//! a [`ProofBackend`] and authorises the whole transcript with a one-time
//! secp256k1 key that is bound to the spender's secret by `h`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::coin::{derive_nullifier, tags, Coin};
use crate::crypto::signatures::{public_key_digest, verify_signature};
use crate::crypto::{hash4, CryptoUtils, EphemeralKeyPair, FieldElement, PublicKeyBytes, SignatureBytes};
use crate::error::{PoolError, PoolResult};
use crate::merkle::{MerkleProof, MerkleTree};

pub mod prover;

pub use prover::{InputValue, Proof, ProofBackend, ProofInputs, ProverError, ReferenceProver};

/// Pour context. Mixed into the binding hash and selects the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum VariantTag {
    Vote = 1,
    Claim = 2,
}

impl VariantTag {
    pub fn as_field(self) -> FieldElement {
        FieldElement::from(self as u64)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariantTag::Vote => "vote",
            VariantTag::Claim => "claim",
        }
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public pour transaction
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PourTransaction {
    /// Anchor the membership path was built against
    pub root: FieldElement,
    /// Serial number of the spent coin
    pub nullifier: FieldElement,
    pub new_commitment_1: FieldElement,
    pub new_commitment_2: FieldElement,
    /// Publicly visible amount (vote weight or claimed value)
    pub public_value: u64,
    /// Caller-defined memo, covered by the signature
    #[serde_as(as = "Bytes")]
    pub info: Vec<u8>,
    pub variant: VariantTag,
    #[serde_as(as = "Bytes")]
    pub ephemeral_public_key: PublicKeyBytes,
    /// Hash4(secret, 2, variant, Hash1(ephemeral key))
    pub binding_hash: FieldElement,
    pub proof: Proof,
    /// Low-S compact signature over the transcript
    #[serde_as(as = "Bytes")]
    pub signature: SignatureBytes,
}

impl PourTransaction {
    /// `(root, nullifier, cm1, cm2, v_pub, h_sig, h)`
    pub fn public_instance(&self) -> PoolResult<Vec<FieldElement>> {
        Ok(vec![
            self.root,
            self.nullifier,
            self.new_commitment_1,
            self.new_commitment_2,
            FieldElement::from(self.public_value),
            public_key_digest(&self.ephemeral_public_key)?,
            self.binding_hash,
        ])
    }

    /// Bytes covered by the ephemeral signature
    pub fn signing_message(&self) -> PoolResult<Vec<u8>> {
        Ok(signing_message(&self.public_instance()?, &self.proof.bytes, &self.info))
    }
}

/// Everything a spender supplies to [`pour`]
#[derive(Debug, Clone)]
pub struct PourRequest<'a> {
    pub root: FieldElement,
    pub old_coin: &'a Coin,
    pub old_secret: FieldElement,
    pub membership_proof: &'a MerkleProof,
    pub value_1: u64,
    pub value_2: u64,
    pub new_public_key_1: FieldElement,
    pub new_public_key_2: FieldElement,
    pub public_value: u64,
    pub info: Vec<u8>,
    pub variant: VariantTag,
}

/// Private outputs and public transaction of a pour
#[derive(Debug, Clone)]
pub struct PourOutput {
    pub coin_1: Coin,
    pub coin_2: Coin,
    pub tx: PourTransaction,
}

/// h = Hash4(secret, 2, variant, h_sig)
pub fn binding_hash(
    secret: FieldElement,
    variant: VariantTag,
    h_sig: FieldElement,
) -> PoolResult<FieldElement> {
    hash4(secret, FieldElement::from(tags::BINDING), variant.as_field(), h_sig)
}

/// Instance words as 32-byte big-endian integers, then the proof, then info
pub fn signing_message(instance: &[FieldElement], proof: &[u8], info: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(32 * instance.len() + proof.len() + info.len());
    for word in instance {
        message.extend_from_slice(&word.to_be_bytes());
    }
    message.extend_from_slice(proof);
    message.extend_from_slice(info);
    message
}

/// Build a pour transaction.
///
/// No external call happens before the nullifier and the new coins exist; the
/// only suspension point is the proof request.
pub async fn pour<B: ProofBackend>(backend: &B, request: PourRequest<'_>) -> PoolResult<PourOutput> {
    let old_coin = request.old_coin;
    let nullifier = derive_nullifier(request.old_secret, old_coin.seed)?;

    if request.membership_proof.leaf != old_coin.commitment {
        return Err(PoolError::CommitmentMismatch(format!(
            "membership proof is for {}, spent coin is {}",
            request.membership_proof.leaf, old_coin.commitment
        )));
    }

    let coin_1 = Coin::new(request.new_public_key_1, request.value_1)?;
    let coin_2 = Coin::new(request.new_public_key_2, request.value_2)?;

    let keys = EphemeralKeyPair::generate()?;
    let ephemeral_public_key = keys.public_key_bytes();
    let h_sig = public_key_digest(&ephemeral_public_key)?;
    let h = binding_hash(request.old_secret, request.variant, h_sig)?;

    let mut inputs = ProofInputs::new();
    inputs.insert_field("root", request.root);
    inputs.insert_field("old_sn", nullifier);
    inputs.insert_field("new_cm_1", coin_1.commitment);
    inputs.insert_field("new_cm_2", coin_2.commitment);
    inputs.insert_u64("v_pub", request.public_value);
    inputs.insert_field("h_sig", h_sig);
    inputs.insert_field("h", h);
    inputs.insert_array("siblings", &request.membership_proof.siblings);
    inputs.insert_array("indices", &request.membership_proof.path_indices);
    inputs.insert_field("old_sk", request.old_secret);
    insert_coin(&mut inputs, "old", "", old_coin);
    insert_coin(&mut inputs, "new", "_1", &coin_1);
    insert_coin(&mut inputs, "new", "_2", &coin_2);

    log::debug!("Requesting {} proof for nullifier {}", request.variant, nullifier);
    let proof = backend.prove(request.variant, &inputs).await?;

    let mut tx = PourTransaction {
        root: request.root,
        nullifier,
        new_commitment_1: coin_1.commitment,
        new_commitment_2: coin_2.commitment,
        public_value: request.public_value,
        info: request.info,
        variant: request.variant,
        ephemeral_public_key,
        binding_hash: h,
        proof,
        signature: [0u8; 64],
    };

    if tx.proof.public_inputs != tx.public_instance()? {
        return Err(PoolError::ProofRejected(
            "backend attested to a different public instance".to_string(),
        ));
    }

    let message = tx.signing_message()?;
    tx.signature = keys.sign(&message)?;

    Ok(PourOutput { coin_1, coin_2, tx })
}

fn insert_coin(inputs: &mut ProofInputs, prefix: &str, suffix: &str, coin: &Coin) {
    inputs.insert_field(&format!("{}_pk{}", prefix, suffix), coin.owner_public_key);
    inputs.insert_u64(&format!("{}_value{}", prefix, suffix), coin.value);
    inputs.insert_field(&format!("{}_seed{}", prefix, suffix), coin.seed);
    inputs.insert_field(&format!("{}_r{}", prefix, suffix), coin.trapdoor_r);
    inputs.insert_field(&format!("{}_s{}", prefix, suffix), coin.trapdoor_s);
    inputs.insert_field(&format!("{}_cm{}", prefix, suffix), coin.commitment);
}

/// Local checks of a pour against a tree and nullifier set, in order:
/// proof shape, double spend, anchor, binding hash, signature, instance
/// consistency.
pub fn check_pour(
    tree: &MerkleTree,
    tx: &PourTransaction,
    nullifiers: &HashSet<FieldElement>,
    old_secret: FieldElement,
) -> PoolResult<()> {
    if tx.proof.public_inputs.len() != prover::PUBLIC_INPUTS.len() {
        return Err(PoolError::MalformedEncoding(format!(
            "proof carries {} public inputs, expected {}",
            tx.proof.public_inputs.len(),
            prover::PUBLIC_INPUTS.len()
        )));
    }
    if nullifiers.contains(&tx.nullifier) {
        return Err(PoolError::DoubleSpend(tx.nullifier.to_string()));
    }
    if !tree.is_known_root(&tx.root) {
        return Err(PoolError::UnknownRoot(tx.root.to_string()));
    }

    let instance = tx.public_instance()?;
    let expected = binding_hash(old_secret, tx.variant, instance[5])?;
    if !CryptoUtils::constant_time_eq(&expected.to_be_bytes(), &tx.binding_hash.to_be_bytes()) {
        return Err(PoolError::BindingHashMismatch);
    }

    let message = signing_message(&instance, &tx.proof.bytes, &tx.info);
    if !verify_signature(&tx.ephemeral_public_key, &message, &tx.signature)? {
        return Err(PoolError::InvalidSignature(
            "signature does not cover the pour transcript".to_string(),
        ));
    }

    if tx.proof.public_inputs != instance {
        return Err(PoolError::ProofRejected(
            "proof was generated for a different instance".to_string(),
        ));
    }
    Ok(())
}

/// Run [`check_pour`] and then the backend verifier. Every rejection carries
/// its specific error.
pub async fn accept_pour<B: ProofBackend>(
    backend: &B,
    tree: &MerkleTree,
    tx: &PourTransaction,
    nullifiers: &HashSet<FieldElement>,
    old_secret: FieldElement,
) -> PoolResult<()> {
    check_pour(tree, tx, nullifiers, old_secret)?;
    if backend.verify(tx.variant, &tx.proof).await? {
        Ok(())
    } else {
        Err(PoolError::ProofRejected(format!("{} proof did not verify", tx.variant)))
    }
}

/// Verify a pour. Rejections come back as `Ok(false)`; malformed input and
/// backend failures stay errors.
pub async fn verify_pour<B: ProofBackend>(
    backend: &B,
    tree: &MerkleTree,
    tx: &PourTransaction,
    nullifiers: &HashSet<FieldElement>,
    old_secret: FieldElement,
) -> PoolResult<bool> {
    match accept_pour(backend, tree, tx, nullifiers, old_secret).await {
        Ok(()) => Ok(true),
        Err(e) if e.is_rejection() => {
            log::warn!("Rejected pour with nullifier {}: {}", tx.nullifier, e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
