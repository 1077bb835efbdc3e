//! Static description of the observations and actions of an agent group.
use serde::{Deserialize, Serialize};

/// Kind of the action space.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum ActionSpace {
    /// A real-valued action vector.
    Continuous,

    /// One categorical choice per action branch.
    Discrete,
}

/// Shape of a visual observation stream.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub struct VisualShape {
    /// Height in pixels.
    pub height: usize,

    /// Width in pixels.
    pub width: usize,

    /// Number of channels, 1 for grayscale and 3 for color images.
    pub channels: usize,
}

impl VisualShape {
    /// Creates a visual shape.
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }
}

/// Observation and action layout of the agents driven by one policy.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct BrainParameters {
    /// Name of the agent group.
    pub brain_name: String,

    /// Size of a single vector observation.
    pub vector_observation_size: usize,

    /// Number of stacked vector observations.
    pub num_stacked_vector_observations: usize,

    /// One entry per visual observation stream.
    pub camera_resolutions: Vec<VisualShape>,

    /// For continuous actions, a single entry with the action dimension.
    /// For discrete actions, the number of choices of each branch.
    pub vector_action_space_size: Vec<usize>,

    /// Kind of the action space.
    pub vector_action_space_type: ActionSpace,
}

impl BrainParameters {
    /// Brain with continuous actions of dimension `act_dim`.
    pub fn continuous(
        brain_name: impl Into<String>,
        vector_observation_size: usize,
        act_dim: usize,
    ) -> Self {
        Self {
            brain_name: brain_name.into(),
            vector_observation_size,
            num_stacked_vector_observations: 1,
            camera_resolutions: vec![],
            vector_action_space_size: vec![act_dim],
            vector_action_space_type: ActionSpace::Continuous,
        }
    }

    /// Brain with discrete actions, one entry of `branches` per action branch.
    pub fn discrete(
        brain_name: impl Into<String>,
        vector_observation_size: usize,
        branches: Vec<usize>,
    ) -> Self {
        Self {
            brain_name: brain_name.into(),
            vector_observation_size,
            num_stacked_vector_observations: 1,
            camera_resolutions: vec![],
            vector_action_space_size: branches,
            vector_action_space_type: ActionSpace::Discrete,
        }
    }

    /// Adds a visual observation stream.
    pub fn camera(mut self, shape: VisualShape) -> Self {
        self.camera_resolutions.push(shape);
        self
    }

    /// Sets the number of stacked vector observations.
    pub fn stacked(mut self, n: usize) -> Self {
        self.num_stacked_vector_observations = n;
        self
    }

    /// Width of the vector observation fed to the model.
    pub fn vec_obs_size(&self) -> usize {
        self.vector_observation_size * self.num_stacked_vector_observations
    }

    /// Number of visual observation streams.
    pub fn num_visual(&self) -> usize {
        self.camera_resolutions.len()
    }

    /// Returns `true` for continuous actions.
    pub fn is_continuous(&self) -> bool {
        self.vector_action_space_type == ActionSpace::Continuous
    }

    /// Number of action branches. A continuous action space counts as one branch.
    pub fn num_branches(&self) -> usize {
        self.vector_action_space_size.len()
    }

    /// Total number of choices over all discrete branches.
    pub fn total_discrete_width(&self) -> usize {
        self.vector_action_space_size.iter().sum()
    }

    /// Width of an action row as stored in a minibatch.
    pub fn action_width(&self) -> usize {
        match self.vector_action_space_type {
            ActionSpace::Continuous => self.vector_action_space_size.first().copied().unwrap_or(0),
            ActionSpace::Discrete => self.num_branches(),
        }
    }

    /// Width of the action features used by reward signals.
    ///
    /// Discrete actions are one-hot encoded per branch.
    pub fn action_feature_width(&self) -> usize {
        match self.vector_action_space_type {
            ActionSpace::Continuous => self.action_width(),
            ActionSpace::Discrete => self.total_discrete_width(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_sizes() {
        let brain = BrainParameters::discrete("walker", 6, vec![3, 2]).stacked(3);

        assert_eq!(brain.vec_obs_size(), 18);
        assert_eq!(brain.num_branches(), 2);
        assert_eq!(brain.total_discrete_width(), 5);
        assert_eq!(brain.action_width(), 2);
        assert_eq!(brain.action_feature_width(), 5);

        let brain = BrainParameters::continuous("crawler", 4, 3).camera(VisualShape::new(8, 8, 3));
        assert_eq!(brain.action_width(), 3);
        assert_eq!(brain.action_feature_width(), 3);
        assert_eq!(brain.num_visual(), 1);
    }
}
