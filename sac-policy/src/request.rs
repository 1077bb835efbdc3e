//! Typed input bindings of a [`PolicyModel`](crate::PolicyModel).
//!
//! Requests are assembled with builders that check the bindings required by the
//! enabled features before any model code runs.
use crate::{brain::ActionSpace, error::PolicyError, BrainParameters, SacPolicyConfig};
use log::debug;
use ndarray::{Array1, Array2, ArrayD};

/// Features that decide which bindings a request carries.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Recurrent memory is bound.
    pub use_recurrent: bool,
    /// Kind of the action space.
    pub action_space: ActionSpace,
    /// Action dimension (continuous) or choices per branch (discrete).
    pub act_size: Vec<usize>,
    /// Width of vector observations, zero if absent.
    pub vec_obs_size: usize,
    /// Number of visual streams.
    pub num_visual: usize,
    /// Memory size, zero if not recurrent.
    pub memory_size: usize,
    /// Number of reward slots.
    pub num_reward_streams: usize,
}

impl FeatureSet {
    /// Derives the features from a brain and a configuration.
    pub fn new(
        brain: &BrainParameters,
        config: &SacPolicyConfig,
        num_reward_streams: usize,
    ) -> Self {
        Self {
            use_recurrent: config.use_recurrent,
            action_space: brain.vector_action_space_type,
            act_size: brain.vector_action_space_size.clone(),
            vec_obs_size: brain.vec_obs_size(),
            num_visual: brain.num_visual(),
            memory_size: config.effective_memory_size(),
            num_reward_streams,
        }
    }

    /// Returns `true` for continuous actions.
    pub fn is_continuous(&self) -> bool {
        self.action_space == ActionSpace::Continuous
    }

    /// Returns `true` if vector observations are bound.
    pub fn use_vec_obs(&self) -> bool {
        self.vec_obs_size > 0
    }

    /// Number of action branches.
    pub fn num_branches(&self) -> usize {
        self.act_size.len()
    }

    /// Width of a bound action row.
    pub fn action_width(&self) -> usize {
        match self.action_space {
            ActionSpace::Continuous => self.act_size.first().copied().unwrap_or(0),
            ActionSpace::Discrete => self.num_branches(),
        }
    }

    /// Width of a bound action mask row.
    pub fn total_discrete_width(&self) -> usize {
        self.act_size.iter().sum()
    }

    /// Previous actions are bound for recurrent discrete policies only.
    pub fn binds_prev_action(&self) -> bool {
        self.use_recurrent && !self.is_continuous()
    }
}

fn expect_shape(what: &str, actual: &[usize], expected: &[usize]) -> Result<(), PolicyError> {
    if actual == expected {
        Ok(())
    } else {
        Err(PolicyError::shape(what, format!("{:?}", expected), actual))
    }
}

fn expect_present<T>(what: &str, v: Option<T>) -> Result<T, PolicyError> {
    v.ok_or_else(|| PolicyError::InvalidRequest(format!("{} is not bound", what)))
}

fn expect_absent<T>(what: &str, v: &Option<T>) -> Result<(), PolicyError> {
    match v {
        None => Ok(()),
        Some(_) => Err(PolicyError::InvalidRequest(format!(
            "{} is bound but the feature is disabled",
            what
        ))),
    }
}

/// Bindings of a forward pass. Sequences are always single steps.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    /// Number of agents.
    pub batch_size: usize,
    /// Always 1.
    pub sequence_length: usize,
    /// Vector observations, `(batch_size, vec_obs_size)`.
    pub vector_obs: Option<Array2<f32>>,
    /// Visual observations, `(batch_size, h, w, c)` per stream.
    pub visual_obs: Vec<ArrayD<f32>>,
    /// Previous actions, `(batch_size, num_branches)`.
    pub prev_action: Option<Array2<f32>>,
    /// Memory in, `(batch_size, memory_size)`.
    pub memory: Option<Array2<f32>>,
    /// Action masks, `(batch_size, total_discrete_width)`.
    pub action_masks: Option<Array2<f32>>,
}

/// Builder of [`InferenceRequest`].
pub struct InferenceRequestBuilder<'a> {
    features: &'a FeatureSet,
    batch_size: usize,
    vector_obs: Option<Array2<f32>>,
    visual_obs: Vec<ArrayD<f32>>,
    prev_action: Option<Array2<f32>>,
    memory: Option<Array2<f32>>,
    action_masks: Option<Array2<f32>>,
}

impl<'a> InferenceRequestBuilder<'a> {
    /// Starts a request for `batch_size` agents.
    pub fn new(features: &'a FeatureSet, batch_size: usize) -> Self {
        Self {
            features,
            batch_size,
            vector_obs: None,
            visual_obs: vec![],
            prev_action: None,
            memory: None,
            action_masks: None,
        }
    }

    /// Binds vector observations.
    pub fn vector_obs(mut self, v: Array2<f32>) -> Self {
        self.vector_obs = Some(v);
        self
    }

    /// Binds the next visual stream.
    pub fn visual_obs(mut self, v: ArrayD<f32>) -> Self {
        self.visual_obs.push(v);
        self
    }

    /// Binds previous actions.
    pub fn prev_action(mut self, v: Array2<f32>) -> Self {
        self.prev_action = Some(v);
        self
    }

    /// Binds memory in.
    pub fn memory(mut self, v: Array2<f32>) -> Self {
        self.memory = Some(v);
        self
    }

    /// Binds action masks.
    pub fn action_masks(mut self, v: Array2<f32>) -> Self {
        self.action_masks = Some(v);
        self
    }

    /// Validates the bindings and returns the request.
    pub fn build(self) -> Result<InferenceRequest, PolicyError> {
        let f = self.features;
        let n = self.batch_size;

        if f.use_vec_obs() {
            let v = expect_present("vector observations", self.vector_obs.as_ref())?;
            expect_shape("vector observations", v.shape(), &[n, f.vec_obs_size])?;
        } else {
            expect_absent("vector observations", &self.vector_obs)?;
        }

        if self.visual_obs.len() != f.num_visual {
            return Err(PolicyError::InvalidRequest(format!(
                "{} visual streams are bound, expected {}",
                self.visual_obs.len(),
                f.num_visual
            )));
        }
        for v in self.visual_obs.iter() {
            if v.ndim() != 4 || v.shape()[0] != n {
                let expected = format!("({}, h, w, c)", n);
                return Err(PolicyError::shape("visual observations", expected, v.shape()));
            }
        }

        if f.use_recurrent {
            let m = expect_present("memory", self.memory.as_ref())?;
            expect_shape("memory", m.shape(), &[n, f.memory_size])?;
        } else {
            expect_absent("memory", &self.memory)?;
        }

        if f.binds_prev_action() {
            let a = expect_present("previous actions", self.prev_action.as_ref())?;
            expect_shape("previous actions", a.shape(), &[n, f.num_branches()])?;
        } else {
            expect_absent("previous actions", &self.prev_action)?;
        }

        if f.is_continuous() {
            expect_absent("action masks", &self.action_masks)?;
        } else {
            let masks = expect_present("action masks", self.action_masks.as_ref())?;
            expect_shape("action masks", masks.shape(), &[n, f.total_discrete_width()])?;
        }

        debug!("Inference request with batch size {}", n);

        Ok(InferenceRequest {
            batch_size: n,
            sequence_length: 1,
            vector_obs: self.vector_obs,
            visual_obs: self.visual_obs,
            prev_action: self.prev_action,
            memory: self.memory,
            action_masks: self.action_masks,
        })
    }
}

/// Bindings of an update pass.
///
/// Per-step arrays have `batch_size * sequence_length` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    /// Number of sequences.
    pub batch_size: usize,
    /// Steps per sequence.
    pub sequence_length: usize,
    /// Padding mask.
    pub masks: Array1<f32>,
    /// Rewards, one array per reward slot in registry order.
    pub rewards: Vec<Array1<f32>>,
    /// Actions, `(rows, action_width)`.
    pub actions: Array2<f32>,
    /// Action masks, `(rows, total_discrete_width)`.
    pub action_masks: Option<Array2<f32>>,
    /// Previous actions, `(rows, num_branches)`.
    pub prev_action: Option<Array2<f32>>,
    /// Vector observations, `(rows, vec_obs_size)`.
    pub vector_obs: Option<Array2<f32>>,
    /// Vector observations of the next step.
    pub next_vector_obs: Option<Array2<f32>>,
    /// Visual observations per stream.
    pub visual_obs: Vec<ArrayD<f32>>,
    /// Visual observations of the next step per stream.
    pub next_visual_obs: Vec<ArrayD<f32>>,
    /// Memory seed of each sequence, `(batch_size, memory_size)`.
    pub memory: Option<Array2<f32>>,
    /// Termination flags.
    pub dones: Array1<f32>,
}

impl UpdateRequest {
    /// Number of per-step rows.
    pub fn rows(&self) -> usize {
        self.batch_size * self.sequence_length
    }
}

/// Builder of [`UpdateRequest`].
pub struct UpdateRequestBuilder<'a> {
    features: &'a FeatureSet,
    batch_size: usize,
    sequence_length: usize,
    masks: Option<Array1<f32>>,
    rewards: Vec<Array1<f32>>,
    actions: Option<Array2<f32>>,
    action_masks: Option<Array2<f32>>,
    prev_action: Option<Array2<f32>>,
    vector_obs: Option<Array2<f32>>,
    next_vector_obs: Option<Array2<f32>>,
    visual_obs: Vec<ArrayD<f32>>,
    next_visual_obs: Vec<ArrayD<f32>>,
    memory: Option<Array2<f32>>,
    dones: Option<Array1<f32>>,
}

impl<'a> UpdateRequestBuilder<'a> {
    /// Starts a request over `batch_size` sequences of `sequence_length` steps.
    pub fn new(features: &'a FeatureSet, batch_size: usize, sequence_length: usize) -> Self {
        Self {
            features,
            batch_size,
            sequence_length,
            masks: None,
            rewards: vec![],
            actions: None,
            action_masks: None,
            prev_action: None,
            vector_obs: None,
            next_vector_obs: None,
            visual_obs: vec![],
            next_visual_obs: vec![],
            memory: None,
            dones: None,
        }
    }

    /// Binds the padding mask.
    pub fn masks(mut self, v: Array1<f32>) -> Self {
        self.masks = Some(v);
        self
    }

    /// Binds the rewards of the next reward slot.
    pub fn rewards(mut self, v: Array1<f32>) -> Self {
        self.rewards.push(v);
        self
    }

    /// Binds actions.
    pub fn actions(mut self, v: Array2<f32>) -> Self {
        self.actions = Some(v);
        self
    }

    /// Binds action masks.
    pub fn action_masks(mut self, v: Array2<f32>) -> Self {
        self.action_masks = Some(v);
        self
    }

    /// Binds previous actions.
    pub fn prev_action(mut self, v: Array2<f32>) -> Self {
        self.prev_action = Some(v);
        self
    }

    /// Binds vector observations and their next-step counterparts.
    pub fn vector_obs(mut self, obs: Array2<f32>, next_obs: Array2<f32>) -> Self {
        self.vector_obs = Some(obs);
        self.next_vector_obs = Some(next_obs);
        self
    }

    /// Binds the next visual stream and its next-step counterpart.
    pub fn visual_obs(mut self, obs: ArrayD<f32>, next_obs: ArrayD<f32>) -> Self {
        self.visual_obs.push(obs);
        self.next_visual_obs.push(next_obs);
        self
    }

    /// Binds the memory seed.
    pub fn memory(mut self, v: Array2<f32>) -> Self {
        self.memory = Some(v);
        self
    }

    /// Binds termination flags.
    pub fn dones(mut self, v: Array1<f32>) -> Self {
        self.dones = Some(v);
        self
    }

    /// Validates the bindings and returns the request.
    pub fn build(self) -> Result<UpdateRequest, PolicyError> {
        let f = self.features;
        let rows = self.batch_size * self.sequence_length;

        let masks = expect_present("padding mask", self.masks)?;
        expect_shape("padding mask", masks.shape(), &[rows])?;
        let dones = expect_present("done flags", self.dones)?;
        expect_shape("done flags", dones.shape(), &[rows])?;

        if self.rewards.len() != f.num_reward_streams {
            return Err(PolicyError::InvalidRequest(format!(
                "{} reward arrays are bound, expected {}",
                self.rewards.len(),
                f.num_reward_streams
            )));
        }
        for r in self.rewards.iter() {
            expect_shape("rewards", r.shape(), &[rows])?;
        }

        let actions = expect_present("actions", self.actions)?;
        expect_shape("actions", actions.shape(), &[rows, f.action_width()])?;

        if f.is_continuous() {
            expect_absent("action masks", &self.action_masks)?;
        } else {
            let m = expect_present("action masks", self.action_masks.as_ref())?;
            expect_shape("action masks", m.shape(), &[rows, f.total_discrete_width()])?;
        }

        if f.binds_prev_action() {
            let a = expect_present("previous actions", self.prev_action.as_ref())?;
            expect_shape("previous actions", a.shape(), &[rows, f.num_branches()])?;
        } else {
            expect_absent("previous actions", &self.prev_action)?;
        }

        if f.use_vec_obs() {
            let o = expect_present("vector observations", self.vector_obs.as_ref())?;
            expect_shape("vector observations", o.shape(), &[rows, f.vec_obs_size])?;
            let o = expect_present("next vector observations", self.next_vector_obs.as_ref())?;
            expect_shape("next vector observations", o.shape(), &[rows, f.vec_obs_size])?;
        } else {
            expect_absent("vector observations", &self.vector_obs)?;
        }

        if self.visual_obs.len() != f.num_visual || self.next_visual_obs.len() != f.num_visual {
            return Err(PolicyError::InvalidRequest(format!(
                "{} visual streams are bound, expected {}",
                self.visual_obs.len(),
                f.num_visual
            )));
        }

        if f.use_recurrent {
            let m = expect_present("memory", self.memory.as_ref())?;
            expect_shape("memory", m.shape(), &[self.batch_size, f.memory_size])?;
        } else {
            expect_absent("memory", &self.memory)?;
        }

        debug!(
            "Update request with {} sequences of length {}",
            self.batch_size, self.sequence_length
        );

        Ok(UpdateRequest {
            batch_size: self.batch_size,
            sequence_length: self.sequence_length,
            masks,
            rewards: self.rewards,
            actions,
            action_masks: self.action_masks,
            prev_action: self.prev_action,
            vector_obs: self.vector_obs,
            next_vector_obs: self.next_vector_obs,
            visual_obs: self.visual_obs,
            next_visual_obs: self.next_visual_obs,
            memory: self.memory,
            dones,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RewardSignalConfig;
    use ndarray::Array1;

    fn features(brain: &BrainParameters, config: &SacPolicyConfig) -> FeatureSet {
        FeatureSet::new(brain, config, config.reward_signals.len())
    }

    #[test]
    fn test_inference_requires_memory_when_recurrent() {
        let brain = BrainParameters::continuous("b", 3, 2);
        let config = SacPolicyConfig::default().recurrent(8, 4);
        let f = features(&brain, &config);

        let req = InferenceRequestBuilder::new(&f, 2)
            .vector_obs(Array2::zeros((2, 3)))
            .build();
        assert!(matches!(req, Err(PolicyError::InvalidRequest(_))));

        let req = InferenceRequestBuilder::new(&f, 2)
            .vector_obs(Array2::zeros((2, 3)))
            .memory(Array2::zeros((2, 8)))
            .build()
            .unwrap();
        assert_eq!(req.sequence_length, 1);
    }

    #[test]
    fn test_inference_discrete_masks() {
        let brain = BrainParameters::discrete("b", 3, vec![2, 3]);
        let config = SacPolicyConfig::default();
        let f = features(&brain, &config);

        let req = InferenceRequestBuilder::new(&f, 1)
            .vector_obs(Array2::zeros((1, 3)))
            .action_masks(Array2::ones((1, 4)))
            .build();
        assert!(matches!(req, Err(PolicyError::ShapeMismatch { .. })));

        let req = InferenceRequestBuilder::new(&f, 1)
            .vector_obs(Array2::zeros((1, 3)))
            .action_masks(Array2::ones((1, 5)))
            .build();
        assert!(req.is_ok());
    }

    #[test]
    fn test_update_reward_slot_count() {
        let brain = BrainParameters::continuous("b", 3, 2);
        let config = SacPolicyConfig::default()
            .reward_signal("entropy", RewardSignalConfig::new(0.1, 0.99));
        let f = features(&brain, &config);
        let builder = || {
            UpdateRequestBuilder::new(&f, 4, 1)
                .masks(Array1::ones(4))
                .dones(Array1::zeros(4))
                .actions(Array2::zeros((4, 2)))
                .vector_obs(Array2::zeros((4, 3)), Array2::zeros((4, 3)))
                .rewards(Array1::zeros(4))
        };

        assert!(matches!(
            builder().build(),
            Err(PolicyError::InvalidRequest(_))
        ));
        let req = builder().rewards(Array1::zeros(4)).build().unwrap();
        assert_eq!(req.rows(), 4);
        assert_eq!(req.rewards.len(), 2);
    }
}
