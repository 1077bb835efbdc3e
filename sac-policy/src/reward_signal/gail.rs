use super::{action_features, Demonstration, SignalBatch, SignalResult};
use crate::{error::PolicyError, BrainParameters, Record, RecordValue, RewardSignalConfig};
use anyhow::Result;
use log::trace;
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::{rngs::SmallRng, Rng, SeedableRng};

pub(super) const NAME: &str = "gail";

const LEARNING_RATE: f32 = 1e-1;
const EPSILON: f32 = 1e-7;

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Generative adversarial imitation reward.
///
/// A logistic discriminator `D(s, a)` estimates the probability that a pair was
/// demonstrated by the expert. The reward is `-ln(1 - D(s, a))`.
#[derive(Debug, Clone)]
pub struct Gail {
    pub(super) config: RewardSignalConfig,
    brain: BrainParameters,
    expert: Array2<f32>,
    weights: Array1<f32>,
    bias: f32,
    rng: SmallRng,
}

impl Gail {
    /// Creates the signal from expert demonstrations.
    pub fn new(
        config: RewardSignalConfig,
        brain: &BrainParameters,
        demo: &Demonstration,
        seed: u64,
    ) -> Result<Self> {
        if brain.vec_obs_size() == 0 {
            return Err(PolicyError::MissingFeature {
                signal: NAME.to_string(),
                feature: "vector observations".to_string(),
            }
            .into());
        }
        let acts = action_features(demo.actions(), brain)?;
        let expert = concatenate(Axis(1), &[demo.observations().view(), acts.view()])?;
        let in_size = expert.ncols();

        Ok(Self {
            config,
            brain: brain.clone(),
            expert,
            weights: Array1::zeros(in_size),
            bias: 0.0,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    fn inputs(&self, batch: &SignalBatch) -> Result<Array2<f32>> {
        let width = self.brain.vec_obs_size();
        let obs =
            SignalBatch::require_obs(&batch.observations, NAME, "vector observations", width)?;
        let actions = SignalBatch::require(&batch.actions, NAME, "actions")?;
        let acts = action_features(actions, &self.brain)?;
        Ok(concatenate(Axis(1), &[obs.view(), acts.view()])?)
    }

    /// Probability that each row was demonstrated by the expert.
    fn discriminate(&self, x: &Array2<f32>) -> Array1<f32> {
        (x.dot(&self.weights) + self.bias).mapv(sigmoid)
    }

    pub(super) fn compute(&self, batch: &SignalBatch) -> Result<SignalResult> {
        let d = self.discriminate(&self.inputs(batch)?);
        let unscaled = d.mapv(|d| -(1.0 - d + EPSILON).ln());
        Ok(SignalResult::new(unscaled, self.config.strength))
    }

    /// One gradient step of the discriminator on the batch against as many
    /// expert pairs sampled with replacement.
    pub(super) fn update(&mut self, batch: &SignalBatch) -> Result<Record> {
        let x_policy = self.inputs(batch)?;
        let n = x_policy.nrows();
        if n == 0 {
            return Ok(Record::empty());
        }
        let m = self.expert.nrows();
        let ixs = (0..n)
            .map(|_| self.rng.gen_range(0..m))
            .collect::<Vec<_>>();
        let x_expert = self.expert.select(Axis(0), &ixs);

        let d_expert = self.discriminate(&x_expert);
        let d_policy = self.discriminate(&x_policy);
        let loss = -d_expert.mapv(|d| (d + EPSILON).ln()).mean().unwrap_or(0.0)
            - d_policy.mapv(|d| (1.0 - d + EPSILON).ln()).mean().unwrap_or(0.0);

        // Gradients of the binary cross entropy with respect to the logits.
        let g_expert = d_expert.mapv(|d| d - 1.0);
        let grad_w = (x_expert.t().dot(&g_expert) + x_policy.t().dot(&d_policy)) / n as f32;
        let grad_b = (g_expert.sum() + d_policy.sum()) / n as f32;
        self.weights.scaled_add(-LEARNING_RATE, &grad_w);
        self.bias -= LEARNING_RATE * grad_b;
        trace!("GAIL discriminator loss: {}", loss);

        let mut record = Record::from_scalar("gail_loss", loss);
        record.insert("gail_expert_estimate", RecordValue::Scalar(d_expert.mean().unwrap_or(0.0)));
        record.insert("gail_policy_estimate", RecordValue::Scalar(d_policy.mean().unwrap_or(0.0)));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn demo() -> Demonstration {
        Demonstration::new(
            arr2(&[[1f32, 1.0], [1.0, 0.8], [0.8, 1.0]]),
            arr2(&[[1f32], [1.0], [1.0]]),
        )
    }

    #[test]
    fn test_initial_reward() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 1);
        let signal = Gail::new(RewardSignalConfig::new(2.0, 0.99), &brain, &demo(), 0)?;
        let batch = SignalBatch::default()
            .observations(arr2(&[[0f32, 0.0]]), arr2(&[[0f32, 0.0]]))
            .actions(arr2(&[[0f32]]));

        let r = signal.compute(&batch)?;
        let expected = -(0.5f32 + EPSILON).ln();
        assert!((r.unscaled_reward[0] - expected).abs() < 1e-6);
        assert!((r.scaled_reward[0] - 2.0 * expected).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_discriminator_separates_expert() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 1);
        let mut signal = Gail::new(RewardSignalConfig::new(1.0, 0.99), &brain, &demo(), 7)?;
        let policy = SignalBatch::default()
            .observations(
                arr2(&[[-1f32, -1.0], [-0.8, -1.0], [-1.0, -0.8]]),
                arr2(&[[0f32, 0.0], [0.0, 0.0], [0.0, 0.0]]),
            )
            .actions(arr2(&[[-1f32], [-1.0], [-1.0]]));

        let mut record = Record::empty();
        for _ in 0..100 {
            record = signal.update(&policy)?;
        }
        let expert = record.get_scalar("gail_expert_estimate")?;
        assert!(expert > record.get_scalar("gail_policy_estimate")?);

        let expert = SignalBatch::default()
            .observations(arr2(&[[1f32, 1.0]]), arr2(&[[0f32, 0.0]]))
            .actions(arr2(&[[1f32]]));
        let r_expert = signal.compute(&expert)?.unscaled_reward[0];
        let r_policy = signal.compute(&policy)?.unscaled_reward[0];
        assert!(r_expert > r_policy);
        Ok(())
    }

    #[test]
    fn test_observation_width_is_checked() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 1);
        let signal = Gail::new(RewardSignalConfig::new(1.0, 0.99), &brain, &demo(), 0)?;
        let batch = SignalBatch::default()
            .observations(arr2(&[[0f32, 0.0, 0.0]]), arr2(&[[0f32, 0.0, 0.0]]))
            .actions(arr2(&[[0f32]]));

        let err = signal.compute(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::ShapeMismatch { .. })
        ));
        Ok(())
    }
}
