//! PrivateGraph Implementation
//!
//! This module provides the state machine that sequences mints and pours into
//! the pool's flows:
//! - World ID registration mints a fixed-value coin into the voting tree
//! - Votes pour voting power from the voting tree into a candidate's tree
//! - Verification promotes a candidate once enough power has accrued
//! - Claims pour a verified candidate's coins back out, with an epoch reward
//! - Penalties wipe an unverified candidate's tree and counters
//!
//! Every transition hashes and verifies everything it needs before it writes
//! anything, so a failed call leaves the graph exactly as it was.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::coin::{mint, Address, Coin, MintTransaction};
use crate::config::PoolConfig;
use crate::crypto::FieldElement;
use crate::error::{PoolError, PoolResult};
use crate::merkle::MerkleTree;
use crate::pour::{accept_pour, pour, PourRequest, PourTransaction, ProofBackend, VariantTag};

pub mod candidate;
pub mod events;
pub mod rewards;

// Re-export main types
pub use candidate::{Candidate, CandidateId, CandidateSnapshot, CandidateStatus};
pub use events::PoolEvent;
pub use rewards::{diminishing_weight, epoch_for_block, RewardEpoch};

/// Graph shared between tasks; the mutex serialises conflicting spends
pub type SharedGraph<B> = Arc<Mutex<PrivateGraph<B>>>;

/// Outcome of [`PrivateGraph::register_world_id`]
#[derive(Debug, Clone)]
pub struct Registration {
    pub coin: Coin,
    pub mint_tx: MintTransaction,
    pub leaf_index: usize,
}

/// A vote: spend `coin` and recommend `weight` of it to `candidate`
#[derive(Debug, Clone)]
pub struct Ballot<'a> {
    pub coin: &'a Coin,
    pub secret: FieldElement,
    /// Owner of the change coin (value - weight)
    pub change_public_key: FieldElement,
    /// Owner of the recommendation coin, normally the candidate
    pub recommendation_public_key: FieldElement,
    pub candidate: CandidateId,
    pub weight: u64,
}

/// Outcome of [`PrivateGraph::vote`]
#[derive(Debug, Clone)]
pub struct VoteReceipt {
    pub change_coin: Coin,
    pub recommendation_coin: Coin,
    pub change_index: usize,
    pub recommendation_index: usize,
    pub tx: PourTransaction,
}

/// Outcome of [`PrivateGraph::update_status_verified`]
#[derive(Debug, Clone)]
pub struct Verification {
    /// Fresh address owning the minted coin
    pub address: Address,
    pub coin: Coin,
    pub mint_tx: MintTransaction,
    pub leaf_index: usize,
}

/// A claim: spend a coin from the candidate's own tree
#[derive(Debug, Clone)]
pub struct ClaimRequest<'a> {
    pub candidate: CandidateId,
    pub coin: &'a Coin,
    pub secret: FieldElement,
    /// Owner of the reclaimed power in the voting tree
    pub reclaim_public_key: FieldElement,
    /// Owner of the reward coin in the rewards tree
    pub reward_public_key: FieldElement,
    pub current_epoch: u64,
}

/// Outcome of [`PrivateGraph::claim`]
#[derive(Debug, Clone)]
pub struct ClaimReceipt {
    pub reclaimed_coin: Coin,
    pub reward_coin: Coin,
    pub reclaimed_index: usize,
    pub reward_index: usize,
    pub epoch: u64,
    pub tx: PourTransaction,
}

/// Owner of every tree, nullifier set and candidate in a pool.
///
/// Each transition appends a [`PoolEvent`]; the log is only emptied by
/// [`PrivateGraph::drain_events`], which is the caller's job.
#[derive(Debug)]
pub struct PrivateGraph<B: ProofBackend> {
    config: PoolConfig,
    voting_tree: MerkleTree,
    rewards_tree: MerkleTree,
    vote_nullifiers: HashSet<FieldElement>,
    candidates: Vec<Candidate>,
    rewards: BTreeMap<u64, RewardEpoch>,
    events: Vec<PoolEvent>,
    backend: B,
}

impl<B: ProofBackend> PrivateGraph<B> {
    /// Create an empty pool
    pub fn new(config: PoolConfig, backend: B) -> PoolResult<Self> {
        config.validate()?;
        Ok(Self {
            voting_tree: MerkleTree::new(config.tree_depth)?,
            rewards_tree: MerkleTree::new(config.tree_depth)?,
            vote_nullifiers: HashSet::new(),
            candidates: Vec::new(),
            rewards: BTreeMap::new(),
            events: Vec::new(),
            backend,
            config,
        })
    }

    /// Wrap the graph for use from several tasks
    pub fn into_shared(self) -> SharedGraph<B> {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn voting_tree(&self) -> &MerkleTree {
        &self.voting_tree
    }

    pub fn rewards_tree(&self) -> &MerkleTree {
        &self.rewards_tree
    }

    pub fn vote_nullifiers(&self) -> &HashSet<FieldElement> {
        &self.vote_nullifiers
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn candidate(&self, id: CandidateId) -> PoolResult<&Candidate> {
        self.candidates.get(id.0).ok_or(PoolError::UnknownCandidate(id.0))
    }

    pub fn reward_epoch(&self, epoch: u64) -> Option<&RewardEpoch> {
        self.rewards.get(&epoch)
    }

    /// Epoch containing `block` under this pool's epoch length
    pub fn epoch_for_block(&self, block: u64) -> PoolResult<u64> {
        epoch_for_block(block, self.config.blocks_per_epoch)
    }

    /// Events recorded since the last drain. Reading does not clear the log;
    /// callers forwarding events to the ledger must call [`Self::drain_events`]
    /// or the log grows with every transition.
    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    /// Take every recorded event, leaving the log empty
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Sample a fresh address. The graph keeps no record of it.
    pub fn create_address(&self) -> PoolResult<Address> {
        Address::generate()
    }

    /// Mint the registration value to `public_key` and anchor it in the
    /// voting tree. Identity checks happen before this is called.
    pub fn register_world_id(&mut self, public_key: FieldElement) -> PoolResult<Registration> {
        let minted = mint(public_key, self.config.registration_value)?;
        let pending = self.voting_tree.prepare_insert(minted.coin.commitment)?;
        let leaf_index = self.voting_tree.commit_insert(pending)?;

        log::info!(
            "Registered world id: commitment {} at leaf {}",
            minted.coin.commitment,
            leaf_index
        );
        self.events.push(PoolEvent::WorldIdRegistered {
            commitment: minted.coin.commitment,
            leaf_index,
        });

        Ok(Registration {
            coin: minted.coin,
            mint_tx: minted.mint_tx,
            leaf_index,
        })
    }

    /// Add a candidate registered in `epoch`
    pub fn register_candidate(&mut self, name: &str, epoch: u64) -> PoolResult<CandidateId> {
        if name.trim().is_empty() {
            return Err(PoolError::InvalidArgument("candidate name is empty".to_string()));
        }

        let id = CandidateId(self.candidates.len());
        let candidate = Candidate::new(id, name.to_string(), epoch, self.config.tree_depth)?;
        self.candidates.push(candidate);

        log::info!("Registered candidate {} ({}) in epoch {}", id, name, epoch);
        self.events.push(PoolEvent::CandidateRegistered {
            candidate: id,
            name: name.to_string(),
            epoch,
        });
        Ok(id)
    }

    /// Spend a voting coin, keep `value - weight` as change in the voting
    /// tree and pour `weight` into the candidate's tree.
    pub async fn vote(&mut self, ballot: Ballot<'_>) -> PoolResult<VoteReceipt> {
        let coin = ballot.coin;
        if ballot.weight > coin.value {
            return Err(PoolError::InvalidArgument(format!(
                "weight {} exceeds coin value {}",
                ballot.weight, coin.value
            )));
        }
        self.candidate(ballot.candidate)?;

        let index = self
            .voting_tree
            .index_of(&coin.commitment)
            .ok_or_else(|| PoolError::UnknownCommitment(coin.commitment.to_string()))?;
        let path = self.voting_tree.generate_merkle_proof(index)?;

        let out = pour(
            &self.backend,
            PourRequest {
                root: path.root,
                old_coin: coin,
                old_secret: ballot.secret,
                membership_proof: &path,
                value_1: coin.value - ballot.weight,
                value_2: ballot.weight,
                new_public_key_1: ballot.change_public_key,
                new_public_key_2: ballot.recommendation_public_key,
                public_value: ballot.weight,
                info: ballot.candidate.0.to_be_bytes().to_vec(),
                variant: VariantTag::Vote,
            },
        )
        .await?;
        accept_pour(&self.backend, &self.voting_tree, &out.tx, &self.vote_nullifiers, ballot.secret).await?;

        let candidate = self.candidate(ballot.candidate)?;
        let current = candidate.accumulated_power;
        let new_power = current
            .checked_add(ballot.weight)
            .filter(|power| *power <= self.config.vote_cap)
            .ok_or(PoolError::ThresholdExceeded {
                current,
                weight: ballot.weight,
                cap: self.config.vote_cap,
            })?;

        // Power poured to a verified candidate joins its verification epoch's pool
        let reward = match candidate.status {
            CandidateStatus::Verified => {
                let epoch = candidate.verification_epoch;
                let reward = self.rewards.get(&epoch).copied().unwrap_or_default();
                let total_power = reward.total_power.checked_add(ballot.weight).ok_or_else(|| {
                    PoolError::ValueOverflow(format!("total power of epoch {}", epoch))
                })?;
                Some((epoch, RewardEpoch { total_power, ..reward }))
            }
            CandidateStatus::Candidate => None,
        };

        let change_insert = self.voting_tree.prepare_insert(out.tx.new_commitment_1)?;
        let recommendation_insert = candidate.own_pour_tree.prepare_insert(out.tx.new_commitment_2)?;

        self.vote_nullifiers.insert(out.tx.nullifier);
        let change_index = self.voting_tree.commit_insert(change_insert)?;
        if let Some((epoch, reward)) = reward {
            self.rewards.insert(epoch, reward);
        }
        let candidate = &mut self.candidates[ballot.candidate.0];
        let recommendation_index = candidate.own_pour_tree.commit_insert(recommendation_insert)?;
        candidate.accumulated_power = new_power;
        candidate.vote_count += 1;

        log::info!(
            "Vote of {} for candidate {}: power {} after {} votes",
            ballot.weight,
            ballot.candidate,
            new_power,
            candidate.vote_count
        );
        self.events.push(PoolEvent::CandidateRecommended {
            candidate: ballot.candidate,
            nullifier: out.tx.nullifier,
            weight: ballot.weight,
        });

        Ok(VoteReceipt {
            change_coin: out.coin_1,
            recommendation_coin: out.coin_2,
            change_index,
            recommendation_index,
            tx: out.tx,
        })
    }

    /// Promote a candidate whose power reached the verification threshold.
    /// Mints the diminishing-returns weight to a fresh address in the voting
    /// tree and adds the candidate's power to the epoch's reward pool.
    pub fn update_status_verified(
        &mut self,
        id: CandidateId,
        current_epoch: u64,
    ) -> PoolResult<Verification> {
        let candidate = self.candidate(id)?;
        if candidate.status != CandidateStatus::Candidate {
            return Err(PoolError::WrongStatus {
                required: CandidateStatus::Candidate,
                actual: candidate.status,
            });
        }
        let power = candidate.accumulated_power;
        if power < self.config.verification_threshold {
            return Err(PoolError::InsufficientPower {
                power,
                threshold: self.config.verification_threshold,
            });
        }

        let epoch = self.rewards.get(&current_epoch).copied().unwrap_or_default();
        let total_power = epoch.total_power.checked_add(power).ok_or_else(|| {
            PoolError::ValueOverflow(format!("total power of epoch {}", current_epoch))
        })?;

        let weight = diminishing_weight(power);
        let address = Address::generate()?;
        let minted = mint(address.public, weight)?;
        let pending = self.voting_tree.prepare_insert(minted.coin.commitment)?;

        let leaf_index = self.voting_tree.commit_insert(pending)?;
        self.rewards.insert(current_epoch, RewardEpoch { total_power, ..epoch });
        let candidate = &mut self.candidates[id.0];
        candidate.status = CandidateStatus::Verified;
        candidate.verification_epoch = current_epoch;

        log::info!(
            "Candidate {} verified in epoch {} with power {}, minted {}",
            id,
            current_epoch,
            power,
            weight
        );
        self.events.push(PoolEvent::CandidateVerified {
            candidate: id,
            epoch: current_epoch,
            power,
            minted_value: weight,
        });

        Ok(Verification {
            address,
            coin: minted.coin,
            mint_tx: minted.mint_tx,
            leaf_index,
        })
    }

    /// Spend a coin of value `u` from a verified candidate's tree: `u * alpha`
    /// goes back to the voting tree and `floor(u * C / total_power)` to the
    /// rewards tree.
    pub async fn claim(&mut self, request: ClaimRequest<'_>) -> PoolResult<ClaimReceipt> {
        let candidate = self.candidate(request.candidate)?;
        if candidate.status != CandidateStatus::Verified {
            return Err(PoolError::WrongStatus {
                required: CandidateStatus::Verified,
                actual: candidate.status,
            });
        }
        let epoch = candidate.verification_epoch;
        if epoch > request.current_epoch {
            return Err(PoolError::EpochNotReached {
                verification_epoch: epoch,
                current_epoch: request.current_epoch,
            });
        }

        let u = request.coin.value;
        let reward = self
            .rewards
            .get(&epoch)
            .copied()
            .filter(|reward| !reward.is_exhausted())
            .ok_or(PoolError::RewardPoolExhausted { epoch })?;
        // Each claim draws its own coin's share, so the candidate's claims sum
        // to at most its accumulated power and the epoch's to its total power
        let total_claimed = reward
            .total_claimed
            .checked_add(u)
            .filter(|claimed| *claimed <= reward.total_power)
            .ok_or(PoolError::RewardPoolExhausted { epoch })?;
        let claimed_power = candidate
            .claimed_power
            .checked_add(u)
            .filter(|claimed| *claimed <= candidate.accumulated_power)
            .ok_or(PoolError::RewardPoolExhausted { epoch })?;

        let reclaimed = u
            .checked_mul(self.config.reclaim_alpha)
            .ok_or_else(|| PoolError::ValueOverflow(format!("{} * alpha", u)))?;
        let reward_value = u64::try_from(
            u128::from(u) * u128::from(self.config.epoch_reward) / u128::from(reward.total_power),
        )
        .map_err(|_| PoolError::ValueOverflow(format!("reward for {}", u)))?;

        let tree = &candidate.own_pour_tree;
        let index = tree
            .index_of(&request.coin.commitment)
            .ok_or_else(|| PoolError::UnknownCommitment(request.coin.commitment.to_string()))?;
        let path = tree.generate_merkle_proof(index)?;

        let out = pour(
            &self.backend,
            PourRequest {
                root: path.root,
                old_coin: request.coin,
                old_secret: request.secret,
                membership_proof: &path,
                value_1: reclaimed,
                value_2: reward_value,
                new_public_key_1: request.reclaim_public_key,
                new_public_key_2: request.reward_public_key,
                public_value: u,
                info: epoch.to_be_bytes().to_vec(),
                variant: VariantTag::Claim,
            },
        )
        .await?;
        accept_pour(&self.backend, tree, &out.tx, &candidate.nullifiers, request.secret).await?;

        let reclaim_insert = self.voting_tree.prepare_insert(out.tx.new_commitment_1)?;
        let reward_insert = self.rewards_tree.prepare_insert(out.tx.new_commitment_2)?;

        let candidate = &mut self.candidates[request.candidate.0];
        candidate.nullifiers.insert(out.tx.nullifier);
        candidate.claimed_power = claimed_power;
        let reclaimed_index = self.voting_tree.commit_insert(reclaim_insert)?;
        let reward_index = self.rewards_tree.commit_insert(reward_insert)?;
        self.rewards.insert(epoch, RewardEpoch { total_claimed, ..reward });

        log::info!(
            "Candidate {} claimed in epoch {}: reclaimed {}, reward {}",
            request.candidate,
            epoch,
            reclaimed,
            reward_value
        );
        self.events.push(PoolEvent::RewardClaimed {
            candidate: request.candidate,
            epoch,
            reclaimed,
            reward: reward_value,
        });

        Ok(ClaimReceipt {
            reclaimed_coin: out.coin_1,
            reward_coin: out.coin_2,
            reclaimed_index,
            reward_index,
            epoch,
            tx: out.tx,
        })
    }

    /// Wipe an unverified candidate's tree and counters. Revealed nullifiers
    /// stay spent.
    pub fn penalise(&mut self, id: CandidateId) -> PoolResult<()> {
        let candidate = self.candidate(id)?;
        if candidate.status != CandidateStatus::Candidate {
            return Err(PoolError::WrongStatus {
                required: CandidateStatus::Candidate,
                actual: candidate.status,
            });
        }

        let empty = MerkleTree::new(self.config.tree_depth)?;
        let candidate = &mut self.candidates[id.0];
        candidate.own_pour_tree = empty;
        candidate.accumulated_power = 0;
        candidate.vote_count = 0;

        log::warn!("Penalised candidate {}", id);
        self.events.push(PoolEvent::Penalised { candidate: id });
        Ok(())
    }
}
