//! Configuration of [`SacPolicy`](crate::SacPolicy).
use crate::error::PolicyError;
use anyhow::Result;
use indexmap::IndexMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Strength and discount factor of a reward signal.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub struct RewardSignalConfig {
    /// Scale applied to the rewards of the signal.
    pub strength: f64,

    /// Discount factor of the value head of the signal.
    pub gamma: f64,
}

impl RewardSignalConfig {
    /// Creates a reward signal configuration.
    pub fn new(strength: f64, gamma: f64) -> Self {
        Self { strength, gamma }
    }
}

/// Configuration of [`SacPolicy`](crate::SacPolicy).
///
/// The order of `reward_signals` is significant: it decides which reward slot of
/// the model each signal is bound to.
///
/// ```rust
/// use sac_policy::{RewardSignalConfig, SacPolicyConfig};
///
/// let config = SacPolicyConfig::default()
///     .learning_rate(1e-3)
///     .reward_signal("extrinsic", RewardSignalConfig::new(1.0, 0.99))
///     .reward_signal("curiosity", RewardSignalConfig::new(0.02, 0.99))
///     .curiosity_enc_size(64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SacPolicyConfig {
    /// Initial learning rate.
    pub learning_rate: f64,

    /// Width of hidden layers.
    pub hidden_units: usize,

    /// Initial value of the entropy coefficient.
    pub init_entcoef: f64,

    /// Number of steps over which the learning rate decays.
    pub max_steps: f64,

    /// If `true`, vector observations are normalized with running statistics.
    pub normalize: bool,

    /// If `true`, the model carries recurrent memory.
    pub use_recurrent: bool,

    /// Number of hidden layers.
    pub num_layers: usize,

    /// Smoothing factor of the target network update.
    pub tau: f64,

    /// Number of experiences per update.
    pub batch_size: usize,

    /// Reward signals by name.
    pub reward_signals: IndexMap<String, RewardSignalConfig>,

    /// Size of the recurrent memory. Required when `use_recurrent` is `true`.
    #[serde(default)]
    pub memory_size: Option<usize>,

    /// Length of the sequences of a minibatch. Required when `use_recurrent` is `true`.
    #[serde(default)]
    pub sequence_length: Option<usize>,

    /// Encoding size of the curiosity signal.
    #[serde(default)]
    pub curiosity_enc_size: Option<usize>,

    /// Path of the demonstration file used by imitation signals.
    #[serde(default)]
    pub demo_path: Option<PathBuf>,
}

impl Default for SacPolicyConfig {
    fn default() -> Self {
        let mut reward_signals = IndexMap::new();
        reward_signals.insert("extrinsic".to_string(), RewardSignalConfig::new(1.0, 0.99));

        Self {
            learning_rate: 3e-4,
            hidden_units: 128,
            init_entcoef: 1.0,
            max_steps: 5e5,
            normalize: false,
            use_recurrent: false,
            num_layers: 2,
            tau: 0.005,
            batch_size: 128,
            reward_signals,
            memory_size: None,
            sequence_length: None,
            curiosity_enc_size: None,
            demo_path: None,
        }
    }
}

impl SacPolicyConfig {
    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the width of hidden layers.
    pub fn hidden_units(mut self, v: usize) -> Self {
        self.hidden_units = v;
        self
    }

    /// Sets the initial entropy coefficient.
    pub fn init_entcoef(mut self, v: f64) -> Self {
        self.init_entcoef = v;
        self
    }

    /// Sets the step horizon of the learning rate schedule.
    pub fn max_steps(mut self, v: f64) -> Self {
        self.max_steps = v;
        self
    }

    /// Enables or disables observation normalization.
    pub fn normalize(mut self, v: bool) -> Self {
        self.normalize = v;
        self
    }

    /// Enables recurrent memory with the given memory size and sequence length.
    pub fn recurrent(mut self, memory_size: usize, sequence_length: usize) -> Self {
        self.use_recurrent = true;
        self.memory_size = Some(memory_size);
        self.sequence_length = Some(sequence_length);
        self
    }

    /// Sets the number of hidden layers.
    pub fn num_layers(mut self, v: usize) -> Self {
        self.num_layers = v;
        self
    }

    /// Sets the target smoothing factor.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Removes all reward signals.
    pub fn clear_reward_signals(mut self) -> Self {
        self.reward_signals.clear();
        self
    }

    /// Appends a reward signal, or replaces the settings of an existing one.
    pub fn reward_signal(mut self, name: impl Into<String>, v: RewardSignalConfig) -> Self {
        self.reward_signals.insert(name.into(), v);
        self
    }

    /// Sets the encoding size of the curiosity signal.
    pub fn curiosity_enc_size(mut self, v: usize) -> Self {
        self.curiosity_enc_size = Some(v);
        self
    }

    /// Sets the demonstration file.
    pub fn demo_path(mut self, v: impl AsRef<Path>) -> Self {
        self.demo_path = Some(v.as_ref().to_path_buf());
        self
    }

    /// Sequence length used by update calls.
    ///
    /// Sequences are single steps unless the model is recurrent.
    pub fn effective_sequence_length(&self) -> usize {
        match self.use_recurrent {
            true => self.sequence_length.unwrap_or(1),
            false => 1,
        }
    }

    /// Memory size of the model, zero when the model is not recurrent.
    pub fn effective_memory_size(&self) -> usize {
        match self.use_recurrent {
            true => self.memory_size.unwrap_or(0),
            false => 0,
        }
    }

    /// Checks the values and the keys required by enabled features.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(self.learning_rate > 0.0) {
            return Err(PolicyError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.tau > 0.0 && self.tau <= 1.0) {
            return Err(PolicyError::InvalidConfig(format!(
                "tau must be in (0, 1], got {}",
                self.tau
            )));
        }
        if self.batch_size == 0 {
            return Err(PolicyError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.hidden_units == 0 || self.num_layers == 0 {
            return Err(PolicyError::InvalidConfig(
                "hidden_units and num_layers must be positive".to_string(),
            ));
        }
        if !(self.init_entcoef > 0.0) {
            return Err(PolicyError::InvalidConfig(format!(
                "init_entcoef must be positive, got {}",
                self.init_entcoef
            )));
        }

        if self.use_recurrent {
            match self.memory_size {
                None => return Err(PolicyError::missing_key("memory_size", "recurrent mode")),
                Some(0) => {
                    return Err(PolicyError::InvalidConfig(
                        "memory_size is 0 even though the policy is recurrent".to_string(),
                    ))
                }
                Some(m) if m % 4 != 0 => {
                    return Err(PolicyError::InvalidConfig(format!(
                        "memory_size is {} but it must be divisible by 4",
                        m
                    )))
                }
                _ => {}
            }
            match self.sequence_length {
                None => {
                    return Err(PolicyError::missing_key("sequence_length", "recurrent mode"))
                }
                Some(0) => {
                    return Err(PolicyError::InvalidConfig(
                        "sequence_length must be positive".to_string(),
                    ))
                }
                _ => {}
            }
        }

        for (name, signal) in self.reward_signals.iter() {
            if !(signal.gamma >= 0.0 && signal.gamma <= 1.0) {
                return Err(PolicyError::InvalidConfig(format!(
                    "gamma of reward signal {} must be in [0, 1], got {}",
                    name, signal.gamma
                )));
            }
        }

        Ok(())
    }

    /// Constructs [`SacPolicyConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC policy from {:?}", path_);
        Ok(b)
    }

    /// Saves [`SacPolicyConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC policy into {:?}", path_);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = SacPolicyConfig::default()
            .reward_signal("gail", RewardSignalConfig::new(0.1, 0.9))
            .reward_signal("entropy", RewardSignalConfig::new(0.01, 0.99))
            .recurrent(16, 8)
            .demo_path("demos/expert.yaml");

        let dir = TempDir::new("sac_policy_config")?;
        let path = dir.path().join("config.yaml");
        config.save(&path)?;
        let config_ = SacPolicyConfig::load(&path)?;

        assert_eq!(config, config_);
        let names = config_.reward_signals.keys().cloned().collect::<Vec<_>>();
        assert_eq!(names, vec!["extrinsic", "gail", "entropy"]);
        Ok(())
    }

    #[test]
    fn test_missing_required_key() {
        let yaml = "learning_rate: 0.001\nhidden_units: 32\n";
        assert!(serde_yaml::from_str::<SacPolicyConfig>(yaml).is_err());
    }

    #[test]
    fn test_validate_recurrent() {
        let mut config = SacPolicyConfig::default();
        config.use_recurrent = true;
        assert_eq!(
            config.validate(),
            Err(PolicyError::missing_key("memory_size", "recurrent mode"))
        );

        let config = SacPolicyConfig::default().recurrent(6, 4);
        assert!(matches!(config.validate(), Err(PolicyError::InvalidConfig(_))));

        let config = SacPolicyConfig::default().recurrent(8, 4);
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_sequence_length(), 4);
        assert_eq!(config.effective_memory_size(), 8);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(SacPolicyConfig::default().tau(0.0).validate().is_err());
        assert!(SacPolicyConfig::default().learning_rate(-1.0).validate().is_err());
        assert!(SacPolicyConfig::default().batch_size(0).validate().is_err());
        assert!(SacPolicyConfig::default()
            .reward_signal("extrinsic", RewardSignalConfig::new(1.0, 1.5))
            .validate()
            .is_err());
        assert_eq!(SacPolicyConfig::default().effective_sequence_length(), 1);
    }
}
