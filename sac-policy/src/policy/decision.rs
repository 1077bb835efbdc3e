use crate::Record;
use ndarray::ArrayD;

/// Outputs of a policy step for a batch of agents.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInfo {
    /// Actions, one row per agent.
    pub action: ArrayD<f32>,

    /// Recurrent memory after the step, if the policy is recurrent.
    pub memory_out: Option<ArrayD<f32>>,

    /// Value estimates, one column per reward signal.
    pub value: Option<ArrayD<f32>>,

    /// Every output of the forward pass.
    pub outputs: Record,
}

/// Decision of the policy for a batch of agents.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionDecision {
    /// The batch had no agents.
    Empty,

    /// Continuous actions.
    Continuous(ActionInfo),

    /// Discrete actions.
    Discrete(ActionInfo),
}

impl ActionDecision {
    /// Returns `true` if no decision was made.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the outputs of the decision.
    pub fn info(&self) -> Option<&ActionInfo> {
        match self {
            Self::Empty => None,
            Self::Continuous(info) | Self::Discrete(info) => Some(info),
        }
    }
}
