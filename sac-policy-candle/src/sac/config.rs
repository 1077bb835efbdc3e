//! Configuration of SAC model.
use crate::{opt::OptimizerConfig, Device};
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SacModel`](super::SacModel).
///
/// Network sizes, learning rate, entropy coefficient and discount factors are
/// given by [`ModelParams`](sac_policy::ModelParams); this configuration only
/// holds what is specific to the candle implementation.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SacModelConfig {
    /// Device for the networks.
    pub device: Device,

    /// Optimizer of the actor, the critics and the entropy coefficient.
    ///
    /// The learning rate is overridden by the policy configuration.
    pub opt_config: OptimizerConfig,

    /// Lower bound of the log standard deviation of the actor.
    pub min_log_std: f64,

    /// Upper bound of the log standard deviation of the actor.
    pub max_log_std: f64,

    /// Added inside the logarithm of the tanh correction of log probabilities.
    pub epsilon: f64,
}

impl Default for SacModelConfig {
    fn default() -> Self {
        Self {
            device: Device::Cpu,
            opt_config: OptimizerConfig::default(),
            min_log_std: -20.0,
            max_log_std: 2.0,
            epsilon: 1e-6,
        }
    }
}

impl SacModelConfig {
    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the bounds of the log standard deviation.
    pub fn log_std_range(mut self, min: f64, max: f64) -> Self {
        self.min_log_std = min;
        self.max_log_std = max;
        self
    }

    /// Sets epsilon.
    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
        self
    }

    /// Constructs [`SacModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of SAC model from {}", path_.to_str().unwrap_or("?"));
        Ok(b)
    }

    /// Saves [`SacModelConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of SAC model into {}", path_.to_str().unwrap_or("?"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_sac_model_config() -> Result<()> {
        let config = SacModelConfig::default()
            .opt_config(OptimizerConfig::AdamW {
                lr: 1e-3,
                beta1: 0.9,
                beta2: 0.999,
                eps: 1e-8,
                weight_decay: 0.0,
            })
            .log_std_range(-10.0, 1.0)
            .epsilon(1e-7);

        let dir = TempDir::new("sac_model_config")?;
        let path = dir.path().join("sac_model_config.yaml");
        config.save(&path)?;
        let config_ = SacModelConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
