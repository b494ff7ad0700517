//! Proof Backend Boundary
//!
//! The pour engine hands a name-keyed set of decimal inputs to a proof
//! backend and gets back an opaque proof plus the public instance it attests
//! to. The circuit itself lives outside this crate; [`ReferenceProver`] checks
//! the same relation natively so the pool can run end to end without it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::coin::{commit, derive_k, derive_nullifier, derive_public_key, tags};
use crate::crypto::{domains, hash4, CryptoUtils, FieldElement};
use crate::error::PoolError;
use crate::merkle::compute_root;
use crate::pour::VariantTag;

/// Names of the public inputs, in instance order
pub const PUBLIC_INPUTS: [&str; 7] = ["root", "old_sn", "new_cm_1", "new_cm_2", "v_pub", "h_sig", "h"];

/// Proof backend errors
#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    /// The witness does not satisfy the relation, or the proof is malformed
    #[error("Relation not satisfied: {0}")]
    Unsatisfied(String),

    /// The backend could not be reached or crashed
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<ProverError> for PoolError {
    fn from(err: ProverError) -> Self {
        match err {
            ProverError::Unsatisfied(msg) => PoolError::ProofRejected(msg),
            ProverError::Backend(msg) => PoolError::ProofBackend(msg),
        }
    }
}

/// A single decimal value or an array of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Single(String),
    Array(Vec<String>),
}

/// Prover inputs keyed by signal name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofInputs(BTreeMap<String, InputValue>);

impl ProofInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_field(&mut self, name: &str, value: FieldElement) {
        self.0.insert(name.to_string(), InputValue::Single(value.to_string()));
    }

    pub fn insert_u64(&mut self, name: &str, value: u64) {
        self.0.insert(name.to_string(), InputValue::Single(value.to_string()));
    }

    pub fn insert_array<T: ToString>(&mut self, name: &str, values: &[T]) {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.0.insert(name.to_string(), InputValue::Array(values));
    }

    pub fn get(&self, name: &str) -> Option<&InputValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a scalar input
    pub fn field(&self, name: &str) -> Result<FieldElement, ProverError> {
        match self.0.get(name) {
            Some(InputValue::Single(text)) => parse_input(name, text),
            Some(InputValue::Array(_)) => Err(ProverError::Unsatisfied(format!(
                "input {} is an array, expected a scalar",
                name
            ))),
            None => Err(ProverError::Unsatisfied(format!("missing input {}", name))),
        }
    }

    /// Parse an array input
    pub fn array(&self, name: &str) -> Result<Vec<FieldElement>, ProverError> {
        match self.0.get(name) {
            Some(InputValue::Array(items)) => items.iter().map(|t| parse_input(name, t)).collect(),
            Some(InputValue::Single(_)) => Err(ProverError::Unsatisfied(format!(
                "input {} is a scalar, expected an array",
                name
            ))),
            None => Err(ProverError::Unsatisfied(format!("missing input {}", name))),
        }
    }

    /// Parse a scalar input that must fit a u64
    pub fn value(&self, name: &str) -> Result<u64, ProverError> {
        self.field(name)?
            .to_u64()
            .map_err(|e| ProverError::Unsatisfied(format!("input {}: {}", name, e)))
    }

    /// The public instance in [`PUBLIC_INPUTS`] order
    pub fn public_instance(&self) -> Result<Vec<FieldElement>, ProverError> {
        PUBLIC_INPUTS.iter().map(|name| self.field(name)).collect()
    }
}

fn parse_input(name: &str, text: &str) -> Result<FieldElement, ProverError> {
    text.parse()
        .map_err(|e: PoolError| ProverError::Unsatisfied(format!("input {}: {}", name, e)))
}

/// Opaque proof plus the public instance it was generated for
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde_as(as = "Bytes")]
    pub bytes: Vec<u8>,
    pub public_inputs: Vec<FieldElement>,
}

/// External prover/verifier for pour relations, one circuit per variant
#[allow(async_fn_in_trait)]
pub trait ProofBackend {
    /// Prove the relation for `variant` over `inputs`
    async fn prove(&self, variant: VariantTag, inputs: &ProofInputs) -> Result<Proof, ProverError>;

    /// Check a proof produced for `variant`
    async fn verify(&self, variant: VariantTag, proof: &Proof) -> Result<bool, ProverError>;
}

/// In-process backend that evaluates the pour relation directly and emits a
/// BLAKE2s transcript over the public instance as its proof.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceProver;

impl ReferenceProver {
    pub fn new() -> Self {
        Self
    }

    fn transcript(variant: VariantTag, public_inputs: &[FieldElement]) -> Vec<u8> {
        let mut data = Vec::with_capacity(domains::DOMAIN_PROOF.len() + 1 + 32 * public_inputs.len());
        data.extend_from_slice(domains::DOMAIN_PROOF);
        data.push(variant as u8);
        for input in public_inputs {
            data.extend_from_slice(&input.to_be_bytes());
        }
        CryptoUtils::blake2s256(&data).to_vec()
    }

    /// Evaluate every constraint of the pour relation
    fn check_relation(variant: VariantTag, inputs: &ProofInputs) -> Result<(), ProverError> {
        let old_sk = inputs.field("old_sk")?;
        let old_pk = inputs.field("old_pk")?;
        let old_value = inputs.value("old_value")?;
        let old_seed = inputs.field("old_seed")?;
        let old_cm = inputs.field("old_cm")?;

        let map_hash = |e: PoolError| ProverError::Backend(e.to_string());

        require(derive_public_key(old_sk).map_err(map_hash)? == old_pk, "old_pk is not derived from old_sk")?;

        let old_k = derive_k(old_pk, old_seed, inputs.field("old_r")?).map_err(map_hash)?;
        require(commit(old_k, old_value).map_err(map_hash)? == old_cm, "old_cm does not open")?;

        let root = compute_root(old_cm, &inputs.array("siblings")?, &index_bits(&inputs.array("indices")?)?)
            .map_err(|e| ProverError::Unsatisfied(e.to_string()))?;
        require(root == inputs.field("root")?, "membership path does not reach root")?;

        require(
            derive_nullifier(old_sk, old_seed).map_err(map_hash)? == inputs.field("old_sn")?,
            "old_sn is not the nullifier of the spent coin",
        )?;

        let mut new_values = [0u64; 2];
        for (slot, suffix) in ["1", "2"].iter().enumerate() {
            let value = inputs.value(&format!("new_value_{}", suffix))?;
            let k = derive_k(
                inputs.field(&format!("new_pk_{}", suffix))?,
                inputs.field(&format!("new_seed_{}", suffix))?,
                inputs.field(&format!("new_r_{}", suffix))?,
            )
            .map_err(map_hash)?;
            require(
                commit(k, value).map_err(map_hash)? == inputs.field(&format!("new_cm_{}", suffix))?,
                "new commitment does not open",
            )?;
            new_values[slot] = value;
        }

        let binding = hash4(
            old_sk,
            FieldElement::from(tags::BINDING),
            variant.as_field(),
            inputs.field("h_sig")?,
        )
        .map_err(map_hash)?;
        require(binding == inputs.field("h")?, "h does not bind h_sig to old_sk")?;

        let v_pub = inputs.value("v_pub")?;
        match variant {
            VariantTag::Vote => {
                let total = u128::from(new_values[0]) + u128::from(new_values[1]);
                require(total == u128::from(old_value), "vote outputs do not conserve value")?;
                require(new_values[1] == v_pub, "vote weight differs from v_pub")
            }
            VariantTag::Claim => require(v_pub == old_value, "claim must publish the spent value"),
        }
    }
}

fn require(condition: bool, message: &str) -> Result<(), ProverError> {
    if condition {
        Ok(())
    } else {
        Err(ProverError::Unsatisfied(message.to_string()))
    }
}

fn index_bits(indices: &[FieldElement]) -> Result<Vec<u8>, ProverError> {
    indices
        .iter()
        .map(|bit| match bit.to_u64() {
            Ok(b @ (0 | 1)) => Ok(b as u8),
            _ => Err(ProverError::Unsatisfied(format!("path index {} is not a bit", bit))),
        })
        .collect()
}

impl ProofBackend for ReferenceProver {
    async fn prove(&self, variant: VariantTag, inputs: &ProofInputs) -> Result<Proof, ProverError> {
        Self::check_relation(variant, inputs)?;
        let public_inputs = inputs.public_instance()?;
        Ok(Proof {
            bytes: Self::transcript(variant, &public_inputs),
            public_inputs,
        })
    }

    async fn verify(&self, variant: VariantTag, proof: &Proof) -> Result<bool, ProverError> {
        if proof.public_inputs.len() != PUBLIC_INPUTS.len() {
            return Err(ProverError::Unsatisfied(format!(
                "expected {} public inputs, got {}",
                PUBLIC_INPUTS.len(),
                proof.public_inputs.len()
            )));
        }
        let expected = Self::transcript(variant, &proof.public_inputs);
        Ok(CryptoUtils::constant_time_eq(&expected, &proof.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_json_shape() {
        let mut inputs = ProofInputs::new();
        inputs.insert_field("root", FieldElement::from(12u64));
        inputs.insert_array("indices", &[0u8, 1u8]);

        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json["root"], "12");
        assert_eq!(json["indices"], serde_json::json!(["0", "1"]));

        let back: ProofInputs = serde_json::from_value(json).unwrap();
        assert_eq!(back, inputs);
        assert_eq!(back.len(), 2);
    }

    #[test]
    fn test_input_accessors() {
        let mut inputs = ProofInputs::new();
        inputs.insert_u64("v_pub", 50);
        inputs.insert_array("siblings", &[FieldElement::from(1u64)]);

        assert_eq!(inputs.value("v_pub").unwrap(), 50);
        assert!(matches!(inputs.field("missing"), Err(ProverError::Unsatisfied(_))));
        assert!(inputs.field("siblings").is_err());
        assert!(inputs.array("v_pub").is_err());
        assert_eq!(inputs.array("siblings").unwrap(), vec![FieldElement::from(1u64)]);
    }

    #[test]
    fn test_malformed_decimal_is_rejected() {
        let mut inputs = ProofInputs::new();
        inputs.0.insert("root".to_string(), InputValue::Single("0x12".to_string()));
        assert!(inputs.field("root").is_err());
    }

    #[test]
    fn test_prover_error_mapping() {
        let unsatisfied: PoolError = ProverError::Unsatisfied("x".to_string()).into();
        assert!(matches!(unsatisfied, PoolError::ProofRejected(_)));

        let backend: PoolError = ProverError::Backend("down".to_string()).into();
        assert!(matches!(backend, PoolError::ProofBackend(_)));
    }

    #[tokio::test]
    async fn test_incomplete_witness_is_unsatisfied() {
        let prover = ReferenceProver::new();
        let result = prover.prove(VariantTag::Vote, &ProofInputs::new()).await;
        assert!(matches!(result, Err(ProverError::Unsatisfied(_))));
    }

    #[tokio::test]
    async fn test_verify_checks_transcript() {
        let prover = ReferenceProver::new();
        let public_inputs: Vec<FieldElement> = (1..=7u64).map(FieldElement::from).collect();
        let proof = Proof {
            bytes: ReferenceProver::transcript(VariantTag::Vote, &public_inputs),
            public_inputs,
        };

        assert!(prover.verify(VariantTag::Vote, &proof).await.unwrap());
        assert!(!prover.verify(VariantTag::Claim, &proof).await.unwrap());

        let mut tampered = proof.clone();
        tampered.public_inputs[4] = FieldElement::from(999u64);
        assert!(!prover.verify(VariantTag::Vote, &tampered).await.unwrap());

        let mut short = proof;
        short.public_inputs.pop();
        assert!(prover.verify(VariantTag::Vote, &short).await.is_err());
    }
}
