use super::{action_features, Demonstration, SignalBatch, SignalResult};
use crate::{error::PolicyError, BrainParameters, RewardSignalConfig};
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1};

pub(super) const NAME: &str = "behavioral_cloning";

fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Penalizes actions that differ from the demonstrated action of the nearest
/// demonstrated observation.
#[derive(Debug, Clone)]
pub struct BehavioralCloning {
    pub(super) config: RewardSignalConfig,
    brain: BrainParameters,
    observations: Array2<f32>,
    actions: Array2<f32>,
}

impl BehavioralCloning {
    /// Creates the signal from expert demonstrations.
    pub fn new(
        config: RewardSignalConfig,
        brain: &BrainParameters,
        demo: &Demonstration,
    ) -> Result<Self> {
        if brain.vec_obs_size() == 0 {
            return Err(PolicyError::MissingFeature {
                signal: NAME.to_string(),
                feature: "vector observations".to_string(),
            }
            .into());
        }

        Ok(Self {
            config,
            brain: brain.clone(),
            observations: demo.observations().clone(),
            actions: action_features(demo.actions(), brain)?,
        })
    }

    pub(super) fn compute(&self, batch: &SignalBatch) -> Result<SignalResult> {
        let width = self.observations.ncols();
        let obs =
            SignalBatch::require_obs(&batch.observations, NAME, "vector observations", width)?;
        let actions = SignalBatch::require(&batch.actions, NAME, "actions")?;
        let acts = action_features(actions, &self.brain)?;
        if acts.nrows() != obs.nrows() {
            let expected = format!("{} rows", obs.nrows());
            return Err(PolicyError::shape("actions", expected, actions.shape()).into());
        }

        let unscaled = obs
            .rows()
            .into_iter()
            .zip(acts.rows())
            .map(|(o, a)| {
                let nearest = self
                    .observations
                    .rows()
                    .into_iter()
                    .map(|d| squared_distance(o, d))
                    .enumerate()
                    .fold((0, f32::INFINITY), |best, (i, dist)| match dist < best.1 {
                        true => (i, dist),
                        false => best,
                    })
                    .0;
                let width = a.len().max(1) as f32;
                -squared_distance(a, self.actions.row(nearest)) / width
            })
            .collect::<Array1<f32>>();

        Ok(SignalResult::new(unscaled, self.config.strength))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_penalty_of_nearest_demo() -> Result<()> {
        let brain = BrainParameters::continuous("b", 1, 2);
        let demo = Demonstration::new(arr2(&[[0f32], [10.0]]), arr2(&[[1f32, 1.0], [-1.0, -1.0]]));
        let signal = BehavioralCloning::new(RewardSignalConfig::new(0.5, 0.99), &brain, &demo)?;

        let batch = SignalBatch::default()
            .observations(arr2(&[[0.2f32], [9.0], [1.0]]), arr2(&[[0f32], [0.0], [0.0]]))
            .actions(arr2(&[[1f32, 1.0], [-1.0, -1.0], [1.0, -1.0]]));
        let r = signal.compute(&batch)?;

        assert_eq!(r.unscaled_reward, arr1(&[0f32, 0.0, -2.0]));
        assert_eq!(r.scaled_reward, arr1(&[0f32, 0.0, -1.0]));
        Ok(())
    }

    #[test]
    fn test_discrete_actions_are_one_hot() -> Result<()> {
        let brain = BrainParameters::discrete("b", 1, vec![2]);
        let demo = Demonstration::new(arr2(&[[0f32]]), arr2(&[[1f32]]));
        let signal = BehavioralCloning::new(RewardSignalConfig::new(1.0, 0.99), &brain, &demo)?;

        let batch = SignalBatch::default()
            .observations(arr2(&[[0f32], [0.0]]), arr2(&[[0f32], [0.0]]))
            .actions(arr2(&[[1f32], [0.0]]));
        assert_eq!(signal.compute(&batch)?.unscaled_reward, arr1(&[0f32, -1.0]));
        Ok(())
    }

    #[test]
    fn test_mismatched_rows_are_rejected() -> Result<()> {
        let brain = BrainParameters::continuous("b", 1, 1);
        let demo = Demonstration::new(arr2(&[[0f32]]), arr2(&[[1f32]]));
        let signal = BehavioralCloning::new(RewardSignalConfig::new(1.0, 0.99), &brain, &demo)?;

        let obs = arr2(&[[0f32], [1.0], [2.0], [3.0]]);
        let batch = SignalBatch::default()
            .observations(obs.clone(), obs)
            .actions(arr2(&[[1f32], [0.0]]));
        let err = signal.compute(&batch).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::ShapeMismatch { .. })
        ));
        Ok(())
    }
}
