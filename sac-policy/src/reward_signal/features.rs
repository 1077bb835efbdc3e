use crate::{brain::ActionSpace, error::PolicyError, BrainParameters};
use anyhow::Result;
use ndarray::{s, Array2};
use rand::{distributions::Uniform, rngs::SmallRng, Rng};

/// Converts actions as stored in a minibatch into features of reward signal models.
///
/// Continuous actions are returned as they are. Discrete actions hold one branch
/// index per column; each is one-hot encoded and the encodings are concatenated,
/// giving `total_discrete_width` columns.
pub fn action_features(actions: &Array2<f32>, brain: &BrainParameters) -> Result<Array2<f32>> {
    let width = brain.action_width();
    if actions.ncols() != width {
        let expected = format!("(-1, {})", width);
        return Err(PolicyError::shape("actions", expected, actions.shape()).into());
    }

    match brain.vector_action_space_type {
        ActionSpace::Continuous => Ok(actions.clone()),
        ActionSpace::Discrete => {
            let mut features =
                Array2::<f32>::zeros((actions.nrows(), brain.total_discrete_width()));
            let mut offset = 0;
            for (branch, &size) in brain.vector_action_space_size.iter().enumerate() {
                for (i, &a) in actions.slice(s![.., branch]).iter().enumerate() {
                    let ix = a as usize;
                    if a < 0.0 || ix >= size {
                        return Err(PolicyError::InvalidRequest(format!(
                            "action {} is out of range for branch {} of size {}",
                            a, branch, size
                        ))
                        .into());
                    }
                    features[[i, offset + ix]] = 1.0;
                }
                offset += size;
            }
            Ok(features)
        }
    }
}

/// Weights drawn uniformly from the Glorot range of a `(rows, cols)` layer.
pub(super) fn glorot_uniform(rng: &mut SmallRng, rows: usize, cols: usize) -> Array2<f32> {
    let limit = (6.0 / (rows + cols).max(1) as f32).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    Array2::from_shape_fn((rows, cols), |_| rng.sample(dist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_one_hot_per_branch() -> Result<()> {
        let brain = BrainParameters::discrete("b", 2, vec![3, 2]);
        let actions = arr2(&[[2f32, 0.0], [0.0, 1.0]]);
        let features = action_features(&actions, &brain)?;

        assert_eq!(
            features,
            arr2(&[[0f32, 0.0, 1.0, 1.0, 0.0], [1.0, 0.0, 0.0, 0.0, 1.0]])
        );
        assert!(action_features(&arr2(&[[3f32, 0.0]]), &brain).is_err());
        Ok(())
    }

    #[test]
    fn test_continuous_pass_through() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 2);
        let actions = arr2(&[[0.5f32, -0.5]]);
        assert_eq!(action_features(&actions, &brain)?, actions);
        assert!(action_features(&arr2(&[[0.5f32]]), &brain).is_err());
        Ok(())
    }
}
