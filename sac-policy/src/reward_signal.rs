//! Reward signals blended into the value heads of the policy.
//!
//! Each signal turns a batch of experiences into one reward per experience. The
//! set of signals of a policy is held by [`RewardSignals`], whose order decides
//! the reward slot each signal is bound to.
mod bc;
mod curiosity;
mod demonstration;
mod entropy;
mod extrinsic;
mod features;
mod gail;
mod registry;
pub use bc::BehavioralCloning;
pub use curiosity::Curiosity;
pub use demonstration::Demonstration;
pub use entropy::EntropySignal;
pub use extrinsic::Extrinsic;
pub use features::action_features;
pub use gail::Gail;
pub use registry::RewardSignals;

use crate::{batch::columns, error::PolicyError, Minibatch, Record};
use anyhow::Result;
use ndarray::{Array1, Array2};

/// Column of a [`Minibatch`] holding the rewards returned by the environment.
pub const ENVIRONMENT_REWARDS: &str = "environment_rewards";

/// Column of a [`Minibatch`] holding the policy entropy of each experience.
pub const ENTROPY: &str = "entropy";

/// Experiences handed to reward signals.
///
/// Inputs are optional; a signal needing an absent input fails with
/// [`PolicyError::MissingFeature`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalBatch {
    /// Vector observations, `(n, vec_obs_size)`.
    pub observations: Option<Array2<f32>>,

    /// Vector observations of the next step.
    pub next_observations: Option<Array2<f32>>,

    /// Actions as stored in a minibatch, `(n, action_width)`.
    pub actions: Option<Array2<f32>>,

    /// Rewards returned by the environment.
    pub environment_rewards: Option<Array1<f32>>,

    /// Policy entropy.
    pub entropy: Option<Array1<f32>>,
}

impl SignalBatch {
    /// Sets vector observations and their next-step counterparts.
    pub fn observations(mut self, obs: Array2<f32>, next_obs: Array2<f32>) -> Self {
        self.observations = Some(obs);
        self.next_observations = Some(next_obs);
        self
    }

    /// Sets actions.
    pub fn actions(mut self, v: Array2<f32>) -> Self {
        self.actions = Some(v);
        self
    }

    /// Sets environment rewards.
    pub fn environment_rewards(mut self, v: Array1<f32>) -> Self {
        self.environment_rewards = Some(v);
        self
    }

    /// Sets the policy entropy.
    pub fn entropy(mut self, v: Array1<f32>) -> Self {
        self.entropy = Some(v);
        self
    }

    /// Collects the inputs present in a minibatch.
    ///
    /// Vector observations, actions and environment rewards are flattened to
    /// one row per experience.
    pub fn from_minibatch(
        mb: &Minibatch,
        vec_obs_size: usize,
        action_width: usize,
    ) -> Result<Self> {
        let rows = |key: &str, width: usize| -> Result<Option<Array2<f32>>> {
            match mb.contains(key) {
                false => Ok(None),
                true => {
                    let v = mb.get(key)?;
                    let n = v.len() / width.max(1);
                    let v = v
                        .to_shape((n, width))
                        .map_err(|_| {
                            PolicyError::shape(key, format!("(-1, {})", width), v.shape())
                        })?
                        .to_owned();
                    Ok(Some(v))
                }
            }
        };
        let flat = |key: &str| -> Result<Option<Array1<f32>>> {
            match mb.contains(key) {
                false => Ok(None),
                true => {
                    let v = mb.get(key)?;
                    Ok(Some(v.iter().copied().collect::<Array1<f32>>()))
                }
            }
        };

        let mut batch = Self::default();
        if vec_obs_size > 0 {
            batch.observations = rows(columns::VECTOR_OBS, vec_obs_size)?;
            batch.next_observations = rows(columns::NEXT_VECTOR_OBS, vec_obs_size)?;
        }
        batch.actions = rows(columns::ACTIONS, action_width)?;
        batch.environment_rewards = flat(ENVIRONMENT_REWARDS)?;
        batch.entropy = flat(ENTROPY)?;
        batch.validate()?;
        Ok(batch)
    }

    /// Number of experiences, taken from the first present input.
    pub fn rows(&self) -> Option<usize> {
        self.row_counts().first().map(|(_, n)| *n)
    }

    fn row_counts(&self) -> Vec<(&'static str, usize)> {
        let mut counts = vec![];
        if let Some(v) = &self.observations {
            counts.push(("vector observations", v.nrows()));
        }
        if let Some(v) = &self.next_observations {
            counts.push(("next vector observations", v.nrows()));
        }
        if let Some(v) = &self.actions {
            counts.push(("actions", v.nrows()));
        }
        if let Some(v) = &self.environment_rewards {
            counts.push(("environment rewards", v.len()));
        }
        if let Some(v) = &self.entropy {
            counts.push(("entropy", v.len()));
        }
        counts
    }

    /// Checks that every present input has one row per experience.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let counts = self.row_counts();
        let n = match counts.first() {
            Some((_, n)) => *n,
            None => return Ok(()),
        };
        for (what, rows) in counts.iter() {
            if *rows != n {
                return Err(PolicyError::ShapeMismatch {
                    what: what.to_string(),
                    expected: format!("{} rows", n),
                    actual: vec![*rows],
                });
            }
        }
        Ok(())
    }

    pub(crate) fn require<'a, T>(
        v: &'a Option<T>,
        signal: &str,
        feature: &str,
    ) -> Result<&'a T, PolicyError> {
        v.as_ref().ok_or_else(|| PolicyError::MissingFeature {
            signal: signal.to_string(),
            feature: feature.to_string(),
        })
    }

    /// Like [`SignalBatch::require`] for observations, checking their width.
    pub(crate) fn require_obs<'a>(
        v: &'a Option<Array2<f32>>,
        signal: &str,
        feature: &str,
        width: usize,
    ) -> Result<&'a Array2<f32>, PolicyError> {
        let obs = Self::require(v, signal, feature)?;
        match obs.ncols() == width {
            true => Ok(obs),
            false => Err(PolicyError::shape(feature, format!("(-1, {})", width), obs.shape())),
        }
    }
}

/// Rewards of one signal over a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalResult {
    /// Rewards multiplied by the strength of the signal.
    pub scaled_reward: Array1<f32>,

    /// Rewards before scaling.
    pub unscaled_reward: Array1<f32>,
}

impl SignalResult {
    pub(crate) fn new(unscaled_reward: Array1<f32>, strength: f64) -> Self {
        Self {
            scaled_reward: unscaled_reward.mapv(|r| r * strength as f32),
            unscaled_reward,
        }
    }
}

/// A reward signal.
pub enum RewardSignal {
    /// Rewards of the environment.
    Extrinsic(Extrinsic),

    /// Prediction error of a forward model.
    Curiosity(Curiosity),

    /// Discriminator-based imitation reward.
    Gail(Gail),

    /// Policy entropy.
    Entropy(EntropySignal),

    /// Distance to the nearest demonstrated action.
    BehavioralCloning(BehavioralCloning),
}

impl RewardSignal {
    /// Name under which the signal is configured.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Extrinsic(_) => extrinsic::NAME,
            Self::Curiosity(_) => curiosity::NAME,
            Self::Gail(_) => gail::NAME,
            Self::Entropy(_) => entropy::NAME,
            Self::BehavioralCloning(_) => bc::NAME,
        }
    }

    /// Scale applied to the rewards.
    pub fn strength(&self) -> f64 {
        match self {
            Self::Extrinsic(s) => s.config.strength,
            Self::Curiosity(s) => s.config.strength,
            Self::Gail(s) => s.config.strength,
            Self::Entropy(s) => s.config.strength,
            Self::BehavioralCloning(s) => s.config.strength,
        }
    }

    /// Discount factor of the value head.
    pub fn gamma(&self) -> f64 {
        match self {
            Self::Extrinsic(s) => s.config.gamma,
            Self::Curiosity(s) => s.config.gamma,
            Self::Gail(s) => s.config.gamma,
            Self::Entropy(s) => s.config.gamma,
            Self::BehavioralCloning(s) => s.config.gamma,
        }
    }

    /// Computes one reward per experience.
    pub fn compute(&self, batch: &SignalBatch) -> Result<SignalResult> {
        batch.validate()?;
        match self {
            Self::Extrinsic(s) => s.compute(batch),
            Self::Curiosity(s) => s.compute(batch),
            Self::Gail(s) => s.compute(batch),
            Self::Entropy(s) => s.compute(batch),
            Self::BehavioralCloning(s) => s.compute(batch),
        }
    }

    /// Runs one optimization step of the model of the signal, if it has one.
    pub fn update(&mut self, batch: &SignalBatch) -> Result<Record> {
        batch.validate()?;
        match self {
            Self::Curiosity(s) => s.update(batch),
            Self::Gail(s) => s.update(batch),
            _ => Ok(Record::empty()),
        }
    }
}
