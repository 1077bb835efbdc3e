//! Boundary between the policy core and the numeric model.
use crate::{
    request::{InferenceRequest, UpdateRequest},
    BrainParameters, Record,
};
use anyhow::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Named outputs a [`PolicyModel`] can be asked for.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum OutputSlot {
    /// Actions, `(n, action_width)`.
    Action,
    /// Log probabilities per action dimension or branch.
    LogProbs,
    /// Value estimates, `(n, n_streams)`.
    Value,
    /// Policy entropy.
    Entropy,
    /// Current value of the learning rate schedule.
    LearningRate,
    /// Recurrent memory after the step.
    MemoryOut,
    /// Accumulates running normalization statistics.
    UpdateNormalization,
    /// Sum of both critic losses and the value loss.
    ValueLoss,
    /// Policy loss.
    PolicyLoss,
    /// Loss of the first critic.
    Q1Loss,
    /// Loss of the second critic.
    Q2Loss,
    /// Current entropy coefficient.
    EntropyCoef,
    /// Update of the policy parameters.
    UpdatePolicy,
    /// Update of the critic and value parameters.
    UpdateValue,
    /// Update of the entropy coefficient.
    UpdateEntropy,
}

impl OutputSlot {
    /// Key of the slot in a [`Record`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::LogProbs => "log_probs",
            Self::Value => "value",
            Self::Entropy => "entropy",
            Self::LearningRate => "learning_rate",
            Self::MemoryOut => "memory_out",
            Self::UpdateNormalization => "update_mean",
            Self::ValueLoss => "value_loss",
            Self::PolicyLoss => "policy_loss",
            Self::Q1Loss => "q1_loss",
            Self::Q2Loss => "q2_loss",
            Self::EntropyCoef => "entropy_coef",
            Self::UpdatePolicy => "update_batch",
            Self::UpdateValue => "update_value",
            Self::UpdateEntropy => "update_entropy",
        }
    }

    /// Outputs of an update pass.
    pub fn update_slots() -> Vec<Self> {
        vec![
            Self::ValueLoss,
            Self::PolicyLoss,
            Self::Q1Loss,
            Self::Q2Loss,
            Self::EntropyCoef,
            Self::Entropy,
            Self::UpdatePolicy,
            Self::UpdateValue,
            Self::UpdateEntropy,
        ]
    }
}

/// Hyperparameters handed to a model factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// Observation and action layout.
    pub brain: BrainParameters,
    /// Initial learning rate.
    pub learning_rate: f64,
    /// Width of hidden layers.
    pub hidden_units: usize,
    /// Initial entropy coefficient.
    pub init_entcoef: f64,
    /// Steps over which the learning rate decays.
    pub max_step: f64,
    /// Normalize vector observations.
    pub normalize: bool,
    /// Carry recurrent memory.
    pub use_recurrent: bool,
    /// Number of hidden layers.
    pub num_layers: usize,
    /// Size of the recurrent memory, zero if not recurrent.
    pub memory_size: usize,
    /// Random seed.
    pub seed: u64,
    /// Names of the reward streams, in the order of the reward slots.
    pub stream_names: Vec<String>,
    /// Discount factor of each reward stream.
    pub gammas: Vec<f64>,
    /// Target smoothing factor.
    pub tau: f64,
}

/// A parametric SAC model exposing typed input bindings and named outputs.
///
/// The model owns every piece of mutable training state: online and target
/// parameters, the entropy coefficient, running normalization statistics,
/// the rolling reward and the step counter.
pub trait PolicyModel {
    /// Runs a forward pass and returns the requested outputs.
    ///
    /// Besides the forward computation, the only side effect allowed is the
    /// accumulation of normalization statistics when
    /// [`OutputSlot::UpdateNormalization`] is requested.
    fn inference(&mut self, request: &InferenceRequest, fetches: &[OutputSlot]) -> Result<Record>;

    /// Returns value estimates of shape `(batch_size, n_streams)`.
    fn value(&self, request: &InferenceRequest) -> Result<Array2<f32>>;

    /// Runs the policy, value and entropy coefficient updates on a batch.
    fn update(&mut self, request: &UpdateRequest, fetches: &[OutputSlot]) -> Result<Record>;

    /// Copies the online value parameters to the target network.
    fn init_target(&mut self) -> Result<()>;

    /// Moves the target parameters toward the online parameters by `tau`.
    fn update_target(&mut self) -> Result<()>;

    /// Returns the rolling reward.
    fn last_reward(&self) -> f32;

    /// Replaces the rolling reward.
    fn set_last_reward(&mut self, reward: f32) -> Result<()>;

    /// Returns the global step counter.
    fn global_step(&self) -> u64;

    /// Advances the global step counter.
    fn increment_step(&mut self, n: u64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slot_names_are_unique() {
        let slots = [
            OutputSlot::Action,
            OutputSlot::LogProbs,
            OutputSlot::Value,
            OutputSlot::Entropy,
            OutputSlot::LearningRate,
            OutputSlot::MemoryOut,
            OutputSlot::UpdateNormalization,
            OutputSlot::ValueLoss,
            OutputSlot::PolicyLoss,
            OutputSlot::Q1Loss,
            OutputSlot::Q2Loss,
            OutputSlot::EntropyCoef,
            OutputSlot::UpdatePolicy,
            OutputSlot::UpdateValue,
            OutputSlot::UpdateEntropy,
        ];
        let names = slots.iter().map(|s| s.name()).collect::<HashSet<_>>();
        assert_eq!(names.len(), slots.len());
    }
}
