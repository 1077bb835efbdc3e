//! Observation batches and experience minibatches supplied by the trainer.
use crate::error::PolicyError;
use ndarray::{Array2, Array4, ArrayD};
use std::collections::HashMap;

/// Observations of the agents requesting a decision.
///
/// Rows of every modality correspond to `agents`. Recurrent memories are owned
/// by the caller; a memory array with zero columns is an empty placeholder that
/// the policy replaces with zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBatch {
    /// Agent identifiers.
    pub agents: Vec<u64>,

    /// Vector observations, `(n, vec_obs_size)`.
    pub vector_observations: Array2<f32>,

    /// Visual observations, `(n, height, width, channels)` per stream.
    pub visual_observations: Vec<Array4<f32>>,

    /// Previous actions, reshapeable to `(n, num_branches)`.
    pub previous_vector_actions: ArrayD<f32>,

    /// Recurrent memories, `(n, memory_size)` or `(n, 0)`.
    pub memories: Array2<f32>,

    /// Discrete action masks, `(n, total_discrete_width)`.
    pub action_masks: Option<Array2<f32>>,
}

impl ObservationBatch {
    /// Creates a batch for the given agents with empty modalities.
    pub fn new(agents: Vec<u64>) -> Self {
        let n = agents.len();
        Self {
            agents,
            vector_observations: Array2::zeros((n, 0)),
            visual_observations: vec![],
            previous_vector_actions: Array2::<f32>::zeros((n, 0)).into_dyn(),
            memories: Array2::zeros((n, 0)),
            action_masks: None,
        }
    }

    /// A batch without agents.
    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Sets vector observations.
    pub fn vector_observations(mut self, v: Array2<f32>) -> Self {
        self.vector_observations = v;
        self
    }

    /// Appends a visual observation stream.
    pub fn visual_observation(mut self, v: Array4<f32>) -> Self {
        self.visual_observations.push(v);
        self
    }

    /// Sets previous actions.
    pub fn previous_vector_actions(mut self, v: ArrayD<f32>) -> Self {
        self.previous_vector_actions = v;
        self
    }

    /// Sets recurrent memories.
    pub fn memories(mut self, v: Array2<f32>) -> Self {
        self.memories = v;
        self
    }

    /// Sets discrete action masks.
    pub fn action_masks(mut self, v: Array2<f32>) -> Self {
        self.action_masks = Some(v);
        self
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` if the batch has no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns `true` if the memories are an empty placeholder.
    pub fn has_empty_memories(&self) -> bool {
        self.memories.ncols() == 0
    }

    /// Checks that all present modalities have one row per agent.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let n = self.len();
        let check = |what: &str, shape: &[usize]| {
            if shape[0] == n {
                Ok(())
            } else {
                Err(PolicyError::shape(what, format!("{} rows", n), shape))
            }
        };

        if self.vector_observations.ncols() > 0 {
            check("vector observations", self.vector_observations.shape())?;
        }
        for obs in self.visual_observations.iter() {
            check("visual observations", obs.shape())?;
        }
        if self.memories.ncols() > 0 {
            check("memories", self.memories.shape())?;
        }
        let prev = &self.previous_vector_actions;
        if prev.len() > 0 && (n == 0 || prev.len() % n != 0) {
            return Err(PolicyError::shape(
                "previous actions",
                format!("a multiple of {} values", n),
                prev.shape(),
            ));
        }
        if let Some(masks) = &self.action_masks {
            check("action masks", masks.shape())?;
        }

        Ok(())
    }
}

/// Column names of a [`Minibatch`].
pub mod columns {
    /// Actions taken.
    pub const ACTIONS: &str = "actions";

    /// Discrete action masks.
    pub const ACTION_MASK: &str = "action_mask";

    /// Actions of the previous step.
    pub const PREV_ACTION: &str = "prev_action";

    /// Episode termination flags.
    pub const DONE: &str = "done";

    /// Padding mask, 1 for valid steps and 0 for padding.
    pub const MASKS: &str = "masks";

    /// Recurrent memories, `(num_sequences, sequence_length, memory_size)`.
    pub const MEMORY: &str = "memory";

    /// Vector observations.
    pub const VECTOR_OBS: &str = "vector_obs";

    /// Vector observations of the next step.
    pub const NEXT_VECTOR_OBS: &str = "next_vector_obs";

    /// Visual observations of stream `i`.
    pub fn visual_obs(i: usize) -> String {
        format!("visual_obs{}", i)
    }

    /// Visual observations of stream `i` at the next step.
    pub fn next_visual_obs(i: usize) -> String {
        format!("next_visual_obs{}", i)
    }

    /// Rewards of the reward signal `name`.
    pub fn rewards(name: &str) -> String {
        format!("{}_rewards", name)
    }
}

/// Sampled experiences, stored as named columns of parallel sequences.
///
/// All columns share the leading `num_sequences * sequence_length` layout, either
/// flattened or as `(num_sequences, sequence_length, ...)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Minibatch {
    columns: HashMap<String, ArrayD<f32>>,
}

impl Minibatch {
    /// Creates an empty minibatch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, builder style.
    pub fn column(mut self, key: impl Into<String>, value: ArrayD<f32>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a column.
    pub fn insert(&mut self, key: impl Into<String>, value: ArrayD<f32>) {
        self.columns.insert(key.into(), value);
    }

    /// Returns the column of the given key.
    pub fn get(&self, key: &str) -> Result<&ArrayD<f32>, PolicyError> {
        self.columns
            .get(key)
            .ok_or_else(|| PolicyError::MissingColumn(key.to_string()))
    }

    /// Returns `true` if the column exists.
    pub fn contains(&self, key: &str) -> bool {
        self.columns.contains_key(key)
    }

    /// Returns the rewards of the reward signal `name`.
    pub fn rewards(&self, name: &str) -> Result<&ArrayD<f32>, PolicyError> {
        self.columns
            .get(&columns::rewards(name))
            .ok_or_else(|| PolicyError::MissingRewardColumn(name.to_string()))
    }

    /// Returns an iterator over the column names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if there is no column.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
