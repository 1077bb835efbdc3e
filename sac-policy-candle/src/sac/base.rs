use super::{Critic, EntCoef, GaussianActor, Normalizer, SacModelConfig, TargetValue};
use crate::{
    mlp::MlpConfig,
    util::{
        array1_to_tensor, array2_to_tensor, masked_mean, polynomial_decay, tensor_to_array2,
        tensor_to_arrayd,
    },
};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use log::{debug, info, trace};
use ndarray::Array2;
use sac_policy::{
    request::{InferenceRequest, UpdateRequest},
    ModelParams, OutputSlot, PolicyError, PolicyModel, Record, RecordValue,
};

/// Losses of an update pass.
struct Losses {
    q1: Tensor,
    q2: Tensor,
    value: Tensor,
    policy: Tensor,
    entropy: Tensor,
    mean_entropy: Tensor,
}

/// Soft actor-critic model on candle.
///
/// Supports continuous actions with vector observations. Each network has one
/// output per reward stream.
pub struct SacModel {
    device: Device,
    params: ModelParams,
    actor: GaussianActor,
    critic: Critic,
    target: TargetValue,
    ent_coef: EntCoef,
    normalizer: Option<Normalizer>,
    gammas: Tensor,
    learning_rate: f64,
    last_reward: f32,
    global_step: u64,
}

fn unsupported(feature: &str) -> anyhow::Error {
    PolicyError::UnsupportedFeature(format!("{} in the candle SAC model", feature)).into()
}

fn check_params(params: &ModelParams) -> Result<()> {
    let brain = &params.brain;
    if params.use_recurrent {
        return Err(unsupported("recurrent memory"));
    }
    if !brain.is_continuous() {
        return Err(unsupported("discrete actions"));
    }
    if brain.num_visual() > 0 {
        return Err(unsupported("visual observations"));
    }
    if brain.vec_obs_size() == 0 {
        return Err(unsupported("missing vector observations"));
    }
    if params.stream_names.is_empty() {
        return Err(PolicyError::InvalidConfig("no reward streams".to_string()).into());
    }
    if params.gammas.len() != params.stream_names.len() {
        return Err(PolicyError::InvalidConfig(format!(
            "{} discount factors for {} reward streams",
            params.gammas.len(),
            params.stream_names.len()
        ))
        .into());
    }
    if params.init_entcoef <= 0.0 {
        return Err(PolicyError::InvalidConfig("init_entcoef must be positive".to_string()).into());
    }
    Ok(())
}

fn required<'a, T>(v: &'a Option<T>, what: &str) -> Result<&'a T> {
    v.as_ref()
        .ok_or_else(|| PolicyError::InvalidRequest(format!("{} are required", what)).into())
}

fn to_scalar(t: &Tensor) -> Result<f32> {
    Ok(t.flatten_all()?.sum_all()?.to_scalar::<f32>()?)
}

impl SacModel {
    /// Builds the networks given the hyperparameters from the policy.
    ///
    /// Recurrent memories, visual observations and discrete actions are rejected
    /// with [`PolicyError::UnsupportedFeature`].
    pub fn build(params: ModelParams, config: SacModelConfig) -> Result<Self> {
        check_params(&params)?;

        let device = config.device.build()?;
        if !device.is_cpu() {
            device.set_seed(params.seed)?;
        }

        let obs_dim = params.brain.vec_obs_size();
        let act_dim = params.brain.action_width();
        let n_streams = params.stream_names.len();
        let (units, layers) = (params.hidden_units, params.num_layers);
        let opt_config = config.opt_config.clone().learning_rate(params.learning_rate);

        let actor = GaussianActor::build(
            MlpConfig::uniform(obs_dim, units, layers, act_dim),
            &opt_config,
            (config.min_log_std, config.max_log_std),
            config.epsilon,
            &device,
        )?;
        let v_config = MlpConfig::uniform(obs_dim, units, layers, n_streams);
        let critic = Critic::build(
            MlpConfig::uniform(obs_dim + act_dim, units, layers, n_streams),
            v_config.clone(),
            &opt_config,
            &device,
        )?;
        let target = TargetValue::build(v_config, &device)?;
        let ent_coef = EntCoef::new(params.init_entcoef, -(act_dim as f64), &opt_config, &device)?;

        let gammas = params.gammas.iter().map(|g| *g as f32).collect::<Vec<_>>();
        let gammas = Tensor::from_vec(gammas, (1, n_streams), &device)?;
        let normalizer = match params.normalize {
            true => Some(Normalizer::new(obs_dim)),
            false => None,
        };

        info!(
            "SAC model for {}: obs_dim={}, act_dim={}, streams={:?}",
            params.brain.brain_name, obs_dim, act_dim, params.stream_names
        );

        Ok(Self {
            device,
            learning_rate: params.learning_rate,
            params,
            actor,
            critic,
            target,
            ent_coef,
            normalizer,
            gammas,
            last_reward: 0.0,
            global_step: 0,
        })
    }

    /// Hyperparameters the model was built with.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Statistics of vector observations, if normalization is enabled.
    pub fn normalizer(&self) -> Option<&Normalizer> {
        self.normalizer.as_ref()
    }

    /// The critics.
    pub fn critic(&self) -> &Critic {
        &self.critic
    }

    /// The target value function.
    pub fn target(&self) -> &TargetValue {
        &self.target
    }

    /// The entropy coefficient.
    pub fn ent_coef(&self) -> &EntCoef {
        &self.ent_coef
    }

    /// Current learning rate of the schedule.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn obs_tensor(&self, obs: &Array2<f32>) -> Result<Tensor> {
        match &self.normalizer {
            Some(normalizer) => array2_to_tensor(&normalizer.normalize(obs), &self.device),
            None => array2_to_tensor(obs, &self.device),
        }
    }

    fn set_learning_rate(&mut self) {
        let lr = polynomial_decay(
            self.params.learning_rate,
            self.global_step,
            self.params.max_step,
        );
        self.actor.set_learning_rate(lr);
        self.critic.set_learning_rate(lr);
        self.ent_coef.set_learning_rate(lr);
        self.learning_rate = lr;
    }

    fn losses(&self, request: &UpdateRequest) -> Result<Losses> {
        let obs = self.obs_tensor(required(&request.vector_obs, "vector observations")?)?;
        let next_obs =
            self.obs_tensor(required(&request.next_vector_obs, "next vector observations")?)?;
        let act = array2_to_tensor(&request.actions, &self.device)?;
        let mask = array1_to_tensor(&request.masks, &self.device)?;
        let dones = array1_to_tensor(&request.dones, &self.device)?.unsqueeze(1)?;
        let rewards = request
            .rewards
            .iter()
            .map(|r| array1_to_tensor(r, &self.device))
            .collect::<Result<Vec<_>>>()?;
        let rewards = Tensor::stack(&rewards, 1)?;
        debug!("update on obs {:?}, rewards {:?}", obs.dims(), rewards.dims());

        let alpha = self.ent_coef.alpha()?;
        let sample = self.actor.sample(&obs)?;
        let logp = sample.log_probs.sum(D::Minus1)?;

        // Critic losses
        let (q1, q2) = self.critic.q(&obs, &act)?;
        let (q1_pi, q2_pi) = self.critic.q(&obs, &sample.action)?;
        let value = self.critic.value(&obs)?;
        let q_backup = {
            let next_value = self.target.value(&next_obs)?;
            let discount = (1.0 - &dones)?.broadcast_mul(&self.gammas)?;
            (rewards + (discount * next_value)?)?.detach()
        };
        let v_backup = {
            let ent = alpha.broadcast_mul(&logp)?.unsqueeze(1)?;
            q1_pi.minimum(&q2_pi)?.broadcast_sub(&ent)?.detach()
        };
        let half_mse = |pred: &Tensor, tgt: &Tensor| -> Result<Tensor> {
            let se = (pred - tgt)?.sqr()?.mean(D::Minus1)?;
            Ok((masked_mean(&se, &mask)? * 0.5)?)
        };
        let q1_loss = half_mse(&q1, &q_backup)?;
        let q2_loss = half_mse(&q2, &q_backup)?;
        let value_loss = half_mse(&value, &v_backup)?;

        // Policy loss
        let policy = {
            let xs = (alpha.broadcast_mul(&logp)? - q1_pi.mean(D::Minus1)?)?;
            masked_mean(&xs, &mask)?
        };

        // Entropy coefficient loss
        let entropy = self.ent_coef.loss(&logp, &mask)?;
        let mean_entropy = masked_mean(&sample.entropy, &mask)?;

        Ok(Losses {
            value: ((&q1_loss + &q2_loss)? + value_loss)?,
            q1: q1_loss,
            q2: q2_loss,
            policy,
            entropy,
            mean_entropy,
        })
    }
}

impl PolicyModel for SacModel {
    fn inference(&mut self, request: &InferenceRequest, fetches: &[OutputSlot]) -> Result<Record> {
        let raw_obs = required(&request.vector_obs, "vector observations")?;
        let obs = self.obs_tensor(raw_obs)?;
        trace!("inference on {:?}", obs.dims());

        let sample = self.actor.sample(&obs)?;
        let mut record = Record::empty();
        for slot in fetches.iter() {
            let value = match slot {
                OutputSlot::Action => RecordValue::Array(tensor_to_arrayd(&sample.action)?),
                OutputSlot::LogProbs => RecordValue::Array(tensor_to_arrayd(&sample.log_probs)?),
                OutputSlot::Value => {
                    RecordValue::Array(tensor_to_arrayd(&self.critic.value(&obs)?)?)
                }
                OutputSlot::Entropy => RecordValue::Array(tensor_to_arrayd(&sample.entropy)?),
                OutputSlot::LearningRate => RecordValue::Scalar(self.learning_rate as f32),
                OutputSlot::UpdateNormalization => match &mut self.normalizer {
                    Some(normalizer) => {
                        normalizer.update(raw_obs);
                        RecordValue::Done
                    }
                    None => continue,
                },
                _ => continue,
            };
            record.insert(slot.name(), value);
        }
        Ok(record)
    }

    fn value(&self, request: &InferenceRequest) -> Result<Array2<f32>> {
        let obs = self.obs_tensor(required(&request.vector_obs, "vector observations")?)?;
        tensor_to_array2(&self.critic.value(&obs)?)
    }

    fn update(&mut self, request: &UpdateRequest, fetches: &[OutputSlot]) -> Result<Record> {
        self.set_learning_rate();

        trace!("losses");
        let losses = self.losses(request)?;

        // Gradients are taken before any parameter changes
        trace!("backward");
        let policy_grads = losses.policy.backward()?;
        let value_grads = losses.value.backward()?;
        let entropy_grads = losses.entropy.backward()?;

        trace!("step");
        self.actor.step(&policy_grads)?;
        self.critic.step(&value_grads)?;
        self.ent_coef.step(&entropy_grads)?;

        let mut record = Record::empty();
        for slot in fetches.iter() {
            let value = match slot {
                OutputSlot::ValueLoss => RecordValue::Scalar(to_scalar(&losses.value)?),
                OutputSlot::PolicyLoss => RecordValue::Scalar(to_scalar(&losses.policy)?),
                OutputSlot::Q1Loss => RecordValue::Scalar(to_scalar(&losses.q1)?),
                OutputSlot::Q2Loss => RecordValue::Scalar(to_scalar(&losses.q2)?),
                OutputSlot::EntropyCoef => RecordValue::Scalar(to_scalar(&self.ent_coef.alpha()?)?),
                OutputSlot::Entropy => RecordValue::Scalar(to_scalar(&losses.mean_entropy)?),
                OutputSlot::LearningRate => RecordValue::Scalar(self.learning_rate as f32),
                OutputSlot::UpdatePolicy | OutputSlot::UpdateValue | OutputSlot::UpdateEntropy => {
                    RecordValue::Done
                }
                _ => continue,
            };
            record.insert(slot.name(), value);
        }
        Ok(record)
    }

    fn init_target(&mut self) -> Result<()> {
        self.target.track(&self.critic, 1.0)
    }

    fn update_target(&mut self) -> Result<()> {
        self.target.track(&self.critic, self.params.tau)
    }

    fn last_reward(&self) -> f32 {
        self.last_reward
    }

    fn set_last_reward(&mut self, reward: f32) -> Result<()> {
        self.last_reward = reward;
        Ok(())
    }

    fn global_step(&self) -> u64 {
        self.global_step
    }

    fn increment_step(&mut self, n: u64) -> Result<()> {
        self.global_step += n;
        self.set_learning_rate();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sac_policy::BrainParameters;

    fn params(brain: BrainParameters) -> ModelParams {
        ModelParams {
            brain,
            learning_rate: 3e-4,
            hidden_units: 16,
            init_entcoef: 1.0,
            max_step: 100.0,
            normalize: false,
            use_recurrent: false,
            num_layers: 2,
            memory_size: 0,
            seed: 0,
            stream_names: vec!["extrinsic".to_string()],
            gammas: vec![0.99],
            tau: 0.005,
        }
    }

    #[test]
    fn test_rejects_unsupported_features() {
        let discrete = params(BrainParameters::discrete("d", 3, vec![2]));
        let err = SacModel::build(discrete, SacModelConfig::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::UnsupportedFeature(_))
        ));

        let mut recurrent = params(BrainParameters::continuous("c", 3, 2));
        recurrent.use_recurrent = true;
        recurrent.memory_size = 8;
        assert!(SacModel::build(recurrent, SacModelConfig::default()).is_err());
    }

    #[test]
    fn test_step_decays_learning_rate() -> Result<()> {
        let model_params = params(BrainParameters::continuous("c", 3, 2));
        let mut model = SacModel::build(model_params, SacModelConfig::default())?;
        assert_eq!(model.learning_rate(), 3e-4);

        model.increment_step(50)?;
        assert_eq!(model.global_step(), 50);
        assert!((model.learning_rate() - 1.5e-4).abs() < 1e-9);
        Ok(())
    }
}
