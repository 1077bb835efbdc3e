use super::{SignalBatch, SignalResult};
use crate::RewardSignalConfig;
use anyhow::Result;

pub(super) const NAME: &str = "extrinsic";

/// Passes the rewards of the environment through.
#[derive(Debug, Clone, PartialEq)]
pub struct Extrinsic {
    pub(super) config: RewardSignalConfig,
}

impl Extrinsic {
    /// Creates the signal.
    pub fn new(config: RewardSignalConfig) -> Self {
        Self { config }
    }

    pub(super) fn compute(&self, batch: &SignalBatch) -> Result<SignalResult> {
        let r = SignalBatch::require(&batch.environment_rewards, NAME, "environment rewards")?;
        Ok(SignalResult::new(r.clone(), self.config.strength))
    }
}
