//! Epoch reward accounting

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

/// Power verified and claimed within one epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEpoch {
    pub total_power: u64,
    pub total_claimed: u64,
}

impl RewardEpoch {
    /// Power not yet claimed
    pub fn remaining(&self) -> u64 {
        self.total_power.saturating_sub(self.total_claimed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.total_claimed >= self.total_power
    }
}

/// Diminishing-returns weight minted on verification: floor(100 - e^(-p/2))
pub fn diminishing_weight(power: u64) -> u64 {
    let y = 100.0 - (-0.5 * power as f64).exp();
    y.floor() as u64
}

/// Epoch containing `block`; epochs are 1-based
pub fn epoch_for_block(block: u64, blocks_per_epoch: u64) -> PoolResult<u64> {
    if blocks_per_epoch == 0 {
        return Err(PoolError::InvalidArgument("blocks_per_epoch must be positive".to_string()));
    }
    Ok(block / blocks_per_epoch + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diminishing_weight() {
        assert_eq!(diminishing_weight(0), 99);
        assert_eq!(diminishing_weight(1), 99);
        assert_eq!(diminishing_weight(600), 100);
        assert_eq!(diminishing_weight(u64::MAX), 100);
    }

    #[test]
    fn test_epoch_for_block() {
        assert_eq!(epoch_for_block(0, 50064).unwrap(), 1);
        assert_eq!(epoch_for_block(50063, 50064).unwrap(), 1);
        assert_eq!(epoch_for_block(50064, 50064).unwrap(), 2);
        assert!(epoch_for_block(10, 0).is_err());
    }

    #[test]
    fn test_reward_epoch() {
        let epoch = RewardEpoch { total_power: 600, total_claimed: 0 };
        assert_eq!(epoch.remaining(), 600);
        assert!(!epoch.is_exhausted());

        let spent = RewardEpoch { total_power: 600, total_claimed: 600 };
        assert!(spent.is_exhausted());
        assert_eq!(spent.remaining(), 0);
    }
}
