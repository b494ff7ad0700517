//! Pool Configuration
//!
//! Fixed parameters of a pool. Defaults are the production values; a JSON
//! file may override any subset of them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};
use crate::merkle::incremental_tree::MAX_DEPTH;
use crate::merkle::DEFAULT_DEPTH;

/// Pool parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Depth of every pool tree (default: 32)
    pub tree_depth: usize,

    /// Value minted for each verified identity (default: 100)
    pub registration_value: u64,

    /// Power a candidate needs before it can be verified, X (default: 600)
    pub verification_threshold: u64,

    /// Maximum power a single candidate can accumulate (default: 1000)
    pub vote_cap: u64,

    /// Multiplier applied to power reclaimed on claim, alpha (default: 1)
    pub reclaim_alpha: u64,

    /// Reward minted per epoch and shared by power, C (default: 1000)
    pub epoch_reward: u64,

    /// Blocks per reward epoch (default: 50064)
    pub blocks_per_epoch: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            tree_depth: DEFAULT_DEPTH,
            registration_value: 100,
            verification_threshold: 600,
            vote_cap: 1000, // 10 registrations
            reclaim_alpha: 1,
            epoch_reward: 1000,
            blocks_per_epoch: 50064,
        }
    }
}

impl PoolConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> PoolResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PoolError::InvalidConfig(format!("parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PoolError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.tree_depth == 0 || self.tree_depth > MAX_DEPTH {
            return Err(PoolError::InvalidConfig(format!(
                "tree_depth must be in 1..={}, got {}",
                MAX_DEPTH, self.tree_depth
            )));
        }
        if self.registration_value == 0 {
            return Err(PoolError::InvalidConfig("registration_value must be positive".to_string()));
        }
        if self.verification_threshold == 0 {
            return Err(PoolError::InvalidConfig("verification_threshold must be positive".to_string()));
        }
        if self.verification_threshold > self.vote_cap {
            return Err(PoolError::InvalidConfig(format!(
                "verification_threshold {} is unreachable under vote_cap {}",
                self.verification_threshold, self.vote_cap
            )));
        }
        if self.blocks_per_epoch == 0 {
            return Err(PoolError::InvalidConfig("blocks_per_epoch must be positive".to_string()));
        }
        Ok(())
    }
}
