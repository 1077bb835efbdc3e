use super::{action_features, features::glorot_uniform, SignalBatch, SignalResult};
use crate::{error::PolicyError, BrainParameters, Record, RewardSignalConfig};
use anyhow::Result;
use log::trace;
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::{rngs::SmallRng, SeedableRng};

pub(super) const NAME: &str = "curiosity";

const LEARNING_RATE: f32 = 1e-2;

/// Rewards experiences whose next state is hard to predict.
///
/// Observations are embedded with a fixed random encoder `phi(s) = tanh(s W_e)`.
/// A linear forward model predicts `phi(s')` from `phi(s)` and the action features,
/// and the reward is half the squared prediction error.
#[derive(Debug, Clone)]
pub struct Curiosity {
    pub(super) config: RewardSignalConfig,
    brain: BrainParameters,
    encoder: Array2<f32>,
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl Curiosity {
    /// Creates the signal with an encoding of width `enc_size`.
    pub fn new(
        config: RewardSignalConfig,
        brain: &BrainParameters,
        enc_size: usize,
        seed: u64,
    ) -> Result<Self> {
        let obs_size = brain.vec_obs_size();
        if obs_size == 0 {
            return Err(PolicyError::MissingFeature {
                signal: NAME.to_string(),
                feature: "vector observations".to_string(),
            }
            .into());
        }
        if enc_size == 0 {
            let msg = "curiosity_enc_size must be positive".to_string();
            return Err(PolicyError::InvalidConfig(msg).into());
        }

        let mut rng = SmallRng::seed_from_u64(seed);
        let in_size = enc_size + brain.action_feature_width();
        Ok(Self {
            config,
            brain: brain.clone(),
            encoder: glorot_uniform(&mut rng, obs_size, enc_size),
            weights: glorot_uniform(&mut rng, in_size, enc_size),
            bias: Array1::zeros(enc_size),
        })
    }

    fn encode(&self, obs: &Array2<f32>) -> Array2<f32> {
        obs.dot(&self.encoder).mapv(f32::tanh)
    }

    /// Returns the inputs of the forward model and its prediction errors.
    fn forward(&self, batch: &SignalBatch) -> Result<(Array2<f32>, Array2<f32>)> {
        let width = self.encoder.nrows();
        let obs =
            SignalBatch::require_obs(&batch.observations, NAME, "vector observations", width)?;
        let next_obs = SignalBatch::require_obs(
            &batch.next_observations,
            NAME,
            "next vector observations",
            width,
        )?;
        let actions = SignalBatch::require(&batch.actions, NAME, "actions")?;
        let n = obs.nrows();
        for (what, v) in [("next vector observations", next_obs), ("actions", actions)].iter() {
            if v.nrows() != n {
                return Err(PolicyError::shape(*what, format!("{} rows", n), v.shape()).into());
            }
        }

        let phi = self.encode(obs);
        let phi_next = self.encode(next_obs);
        let acts = action_features(actions, &self.brain)?;
        let x = concatenate(Axis(1), &[phi.view(), acts.view()])?;
        let err = x.dot(&self.weights) + &self.bias - &phi_next;
        Ok((x, err))
    }

    pub(super) fn compute(&self, batch: &SignalBatch) -> Result<SignalResult> {
        let (_, err) = self.forward(batch)?;
        let unscaled = err.mapv(|e| e * e).sum_axis(Axis(1)) * 0.5;
        Ok(SignalResult::new(unscaled, self.config.strength))
    }

    pub(super) fn update(&mut self, batch: &SignalBatch) -> Result<Record> {
        let (x, err) = self.forward(batch)?;
        let n = x.nrows();
        if n == 0 {
            return Ok(Record::empty());
        }

        let loss = err.mapv(|e| e * e).sum() * 0.5 / n as f32;
        let grad_w = x.t().dot(&err) / n as f32;
        let grad_b = err.sum_axis(Axis(0)) / n as f32;
        self.weights.scaled_add(-LEARNING_RATE, &grad_w);
        self.bias.scaled_add(-LEARNING_RATE, &grad_b);
        trace!("Curiosity forward loss: {}", loss);

        Ok(Record::from_scalar("curiosity_forward_loss", loss))
    }
}
