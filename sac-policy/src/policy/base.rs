use super::{frame, ActionDecision, ActionInfo};
use crate::{
    error::PolicyError,
    model::{ModelParams, OutputSlot, PolicyModel},
    request::FeatureSet,
    reward_signal::{RewardSignals, SignalBatch, SignalResult},
    BrainParameters, Minibatch, ObservationBatch, Record, SacPolicyConfig,
};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{info, trace};
use ndarray::Array2;

/// Soft actor-critic policy.
///
/// Binds observation batches and experience minibatches to a [`PolicyModel`],
/// owns the reward signals and triggers the soft update of the target network.
/// Recurrent memories stay with the caller; the policy only substitutes zeros
/// for an empty memory placeholder.
pub struct SacPolicy<M: PolicyModel> {
    brain: BrainParameters,
    config: SacPolicyConfig,
    features: FeatureSet,
    reward_signals: RewardSignals,
    model: M,
    is_training: bool,
    load: bool,
    sequence_length: usize,
}

fn check_outputs(outputs: &Record, fetches: &[OutputSlot]) -> Result<(), PolicyError> {
    match fetches.iter().find(|slot| !outputs.contains_key(slot.name())) {
        None => Ok(()),
        Some(slot) => Err(PolicyError::MissingOutput(slot.name().to_string())),
    }
}

impl<M: PolicyModel> SacPolicy<M> {
    /// Constructs the policy.
    ///
    /// The reward signals are built from `config` and the model is created by
    /// `build_model`. Unless the parameters were loaded from a checkpoint
    /// (`load == true`), the target network is initialized with a hard copy of
    /// the value network.
    pub fn new<F>(
        brain: BrainParameters,
        config: SacPolicyConfig,
        seed: u64,
        is_training: bool,
        load: bool,
        build_model: F,
    ) -> Result<Self>
    where
        F: FnOnce(ModelParams) -> Result<M>,
    {
        config.validate()?;
        let reward_signals = RewardSignals::from_config(&config, &brain, seed)?;
        let features = FeatureSet::new(&brain, &config, reward_signals.len());

        let params = ModelParams {
            brain: brain.clone(),
            learning_rate: config.learning_rate,
            hidden_units: config.hidden_units,
            init_entcoef: config.init_entcoef,
            max_step: config.max_steps,
            normalize: config.normalize,
            use_recurrent: config.use_recurrent,
            num_layers: config.num_layers,
            memory_size: config.effective_memory_size(),
            seed,
            stream_names: reward_signals.names(),
            gammas: reward_signals.gammas(),
            tau: config.tau,
        };
        let mut model = build_model(params).context("Failed to build the policy model")?;

        if !load {
            model.init_target()?;
        }
        info!(
            "SAC policy for {} with reward signals {:?}",
            brain.brain_name,
            reward_signals.names()
        );

        Ok(Self {
            sequence_length: config.effective_sequence_length(),
            brain,
            config,
            features,
            reward_signals,
            model,
            is_training,
            load,
        })
    }

    /// Outputs requested by a forward pass.
    pub fn inference_fetches(&self) -> Vec<OutputSlot> {
        let mut fetches = vec![
            OutputSlot::Action,
            OutputSlot::LogProbs,
            OutputSlot::Value,
            OutputSlot::Entropy,
            OutputSlot::LearningRate,
        ];
        if self.config.use_recurrent {
            fetches.push(OutputSlot::MemoryOut);
        }
        if self.is_training && self.features.use_vec_obs() && self.config.normalize && !self.load {
            fetches.push(OutputSlot::UpdateNormalization);
        }
        fetches
    }

    /// Outputs requested by an update pass.
    pub fn update_fetches(&self) -> Vec<OutputSlot> {
        OutputSlot::update_slots()
    }

    /// Runs a forward pass on a batch of agents and returns every requested output.
    pub fn evaluate(&mut self, batch: &ObservationBatch) -> Result<Record> {
        let request = frame::inference_request(&self.features, batch)?;
        let fetches = self.inference_fetches();
        let outputs = self.model.inference(&request, &fetches)?;
        check_outputs(&outputs, &fetches)?;
        Ok(outputs)
    }

    /// Decides actions for a batch of agents.
    ///
    /// The model is not run when the batch has no agents.
    pub fn get_action(&mut self, batch: &ObservationBatch) -> Result<ActionDecision> {
        if batch.is_empty() {
            return Ok(ActionDecision::Empty);
        }

        let outputs = self.evaluate(batch)?;
        let memory_out = match self.config.use_recurrent {
            true => Some(outputs.get_array(OutputSlot::MemoryOut.name())?.clone()),
            false => None,
        };
        let info = ActionInfo {
            action: outputs.get_array(OutputSlot::Action.name())?.clone(),
            memory_out,
            value: Some(outputs.get_array(OutputSlot::Value.name())?.clone()),
            outputs,
        };

        Ok(match self.brain.is_continuous() {
            true => ActionDecision::Continuous(info),
            false => ActionDecision::Discrete(info),
        })
    }

    /// Returns the value estimate of each reward signal for the agent at `idx`.
    pub fn get_value_estimates(
        &self,
        batch: &ObservationBatch,
        idx: usize,
    ) -> Result<IndexMap<String, f32>> {
        let row = frame::select_row(batch, idx)?;
        let request = frame::inference_request(&self.features, &row)?;
        let values = self.model.value(&request)?;

        let n_streams = self.reward_signals.len();
        if values.dim() != (1, n_streams) {
            let expected = format!("(1, {})", n_streams);
            return Err(PolicyError::shape("value estimates", expected, values.shape()).into());
        }
        Ok(self
            .reward_signals
            .names()
            .into_iter()
            .zip(values.row(0).iter().copied())
            .collect())
    }

    /// Updates the model on `num_sequences` sequences and then the target network.
    pub fn update(&mut self, mb: &Minibatch, num_sequences: usize) -> Result<Record> {
        self.update_with(mb, num_sequences, true)
    }

    /// Updates the model on `num_sequences` sequences.
    ///
    /// When `update_target` is `true`, the target network is moved toward the
    /// value network after the parameters of the update have been written.
    pub fn update_with(
        &mut self,
        mb: &Minibatch,
        num_sequences: usize,
        update_target: bool,
    ) -> Result<Record> {
        let request = frame::update_request(
            &self.features,
            &self.reward_signals.names(),
            mb,
            num_sequences,
            self.sequence_length,
        )?;
        let fetches = self.update_fetches();

        trace!("Update policy on {} sequences", num_sequences);
        let outputs = self.model.update(&request, &fetches)?;
        check_outputs(&outputs, &fetches)?;

        if update_target {
            trace!("Update target network");
            self.model.update_target()?;
        }
        Ok(outputs)
    }

    /// Computes the rewards of every reward signal on a minibatch.
    pub fn compute_rewards(&self, mb: &Minibatch) -> Result<IndexMap<String, SignalResult>> {
        let batch = SignalBatch::from_minibatch(
            mb,
            self.features.vec_obs_size,
            self.features.action_width(),
        )?;
        self.reward_signals.compute(&batch)
    }

    /// Runs one optimization step of the models of the reward signals.
    pub fn update_reward_signals(&mut self, mb: &Minibatch) -> Result<Record> {
        let batch = SignalBatch::from_minibatch(
            mb,
            self.features.vec_obs_size,
            self.features.action_width(),
        )?;
        self.reward_signals.update(&batch)
    }

    /// Returns the rolling reward estimate.
    pub fn get_last_reward(&self) -> f32 {
        self.model.last_reward()
    }

    /// Replaces the rolling reward estimate.
    pub fn update_reward(&mut self, new_reward: f32) -> Result<()> {
        self.model.set_last_reward(new_reward)
    }

    /// Returns the global step counter.
    pub fn get_current_step(&self) -> u64 {
        self.model.global_step()
    }

    /// Advances the global step counter by `n`.
    pub fn increment_step(&mut self, n: u64) -> Result<()> {
        self.model.increment_step(n)
    }

    /// Zero memories for `n` agents.
    pub fn make_empty_memory(&self, n: usize) -> Array2<f32> {
        Array2::zeros((n, self.features.memory_size))
    }

    /// Observation and action layout.
    pub fn brain(&self) -> &BrainParameters {
        &self.brain
    }

    /// Configuration.
    pub fn config(&self) -> &SacPolicyConfig {
        &self.config
    }

    /// Features deciding the bindings of requests.
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Reward signals in slot order.
    pub fn reward_signals(&self) -> &RewardSignals {
        &self.reward_signals
    }

    /// Reward signals in slot order.
    pub fn reward_signals_mut(&mut self) -> &mut RewardSignals {
        &mut self.reward_signals
    }

    /// Returns `true` if the policy is being trained.
    pub fn is_training(&self) -> bool {
        self.is_training
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The model.
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }
}
