//! Pool events, mirrored to the ledger contract

use serde::{Deserialize, Serialize};

use crate::crypto::FieldElement;
use crate::graph::CandidateId;

/// State transition recorded by the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum PoolEvent {
    WorldIdRegistered {
        commitment: FieldElement,
        leaf_index: usize,
    },
    CandidateRegistered {
        candidate: CandidateId,
        name: String,
        epoch: u64,
    },
    CandidateRecommended {
        candidate: CandidateId,
        nullifier: FieldElement,
        weight: u64,
    },
    CandidateVerified {
        candidate: CandidateId,
        epoch: u64,
        power: u64,
        minted_value: u64,
    },
    RewardClaimed {
        candidate: CandidateId,
        epoch: u64,
        reclaimed: u64,
        reward: u64,
    },
    Penalised {
        candidate: CandidateId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_tagged() {
        let event = PoolEvent::CandidateRecommended {
            candidate: CandidateId(2),
            nullifier: FieldElement::from(9u64),
            weight: 50,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "CandidateRecommended");
        assert_eq!(json["nullifier"], "9");
        assert_eq!(json["weight"], 50);
    }
}
