use super::{SignalBatch, SignalResult};
use crate::RewardSignalConfig;
use anyhow::Result;

pub(super) const NAME: &str = "entropy";

/// Rewards the entropy of the policy, weighted by the strength of the signal.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropySignal {
    pub(super) config: RewardSignalConfig,
}

impl EntropySignal {
    /// Creates the signal.
    pub fn new(config: RewardSignalConfig) -> Self {
        Self { config }
    }

    pub(super) fn compute(&self, batch: &SignalBatch) -> Result<SignalResult> {
        let entropy = SignalBatch::require(&batch.entropy, NAME, "policy entropy")?;
        Ok(SignalResult::new(entropy.clone(), self.config.strength))
    }
}
