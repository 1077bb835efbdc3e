use super::{
    bc, curiosity, entropy, extrinsic, gail, BehavioralCloning, Curiosity, Demonstration,
    EntropySignal, Extrinsic, Gail, RewardSignal, SignalBatch, SignalResult,
};
use crate::{batch::columns, error::PolicyError, BrainParameters, Record, SacPolicyConfig};
use anyhow::Result;
use indexmap::{map::Iter, IndexMap};
use log::{info, warn};

/// Reward signals of a policy, in the order of the reward slots of the model.
///
/// The set of signals is fixed at construction.
pub struct RewardSignals(IndexMap<String, RewardSignal>);

fn load_demo(
    config: &SacPolicyConfig,
    brain: &BrainParameters,
    signal: &str,
) -> Result<Demonstration> {
    let path = config.demo_path.as_ref().ok_or_else(|| {
        PolicyError::missing_key("demo_path", format!("the {} reward signal", signal))
    })?;
    Demonstration::load(path, brain)
}

impl RewardSignals {
    /// Builds the signals listed in `config.reward_signals`.
    ///
    /// Unrecognized names are skipped with a warning. Keys required by a
    /// recognized signal must be present in `config`.
    pub fn from_config(
        config: &SacPolicyConfig,
        brain: &BrainParameters,
        seed: u64,
    ) -> Result<Self> {
        let mut signals = IndexMap::new();

        for (i, (name, cfg)) in config.reward_signals.iter().enumerate() {
            let seed = seed.wrapping_add(i as u64);
            let signal = match name.as_str() {
                extrinsic::NAME => RewardSignal::Extrinsic(Extrinsic::new(*cfg)),
                entropy::NAME => RewardSignal::Entropy(EntropySignal::new(*cfg)),
                curiosity::NAME => {
                    let enc_size = config.curiosity_enc_size.ok_or_else(|| {
                        PolicyError::missing_key(
                            "curiosity_enc_size",
                            "the curiosity reward signal",
                        )
                    })?;
                    RewardSignal::Curiosity(Curiosity::new(*cfg, brain, enc_size, seed)?)
                }
                gail::NAME => {
                    let demo = load_demo(config, brain, name)?;
                    RewardSignal::Gail(Gail::new(*cfg, brain, &demo, seed)?)
                }
                bc::NAME => {
                    let demo = load_demo(config, brain, name)?;
                    let bc = BehavioralCloning::new(*cfg, brain, &demo)?;
                    RewardSignal::BehavioralCloning(bc)
                }
                _ => {
                    warn!("Reward signal {} is not recognized and is ignored", name);
                    continue;
                }
            };
            info!(
                "Reward signal {} with strength {} and gamma {}",
                name, cfg.strength, cfg.gamma
            );
            signals.insert(name.clone(), signal);
        }

        if signals.is_empty() {
            let msg = "no reward signal is configured".to_string();
            return Err(PolicyError::InvalidConfig(msg).into());
        }

        Ok(Self(signals))
    }

    /// Names of the signals in slot order.
    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Minibatch columns read by an update, in slot order.
    pub fn reward_columns(&self) -> Vec<String> {
        self.0.keys().map(|name| columns::rewards(name)).collect()
    }

    /// Discount factors in slot order.
    pub fn gammas(&self) -> Vec<f64> {
        self.0.values().map(|s| s.gamma()).collect()
    }

    /// Returns the signal of the given name.
    pub fn get(&self, name: &str) -> Option<&RewardSignal> {
        self.0.get(name)
    }

    /// Returns the signal of the given name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut RewardSignal> {
        self.0.get_mut(name)
    }

    /// Returns an iterator over the signals in slot order.
    pub fn iter(&self) -> Iter<'_, String, RewardSignal> {
        self.0.iter()
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there is no signal.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Computes the rewards of every signal.
    ///
    /// Every signal returns one reward per experience of `batch`.
    pub fn compute(&self, batch: &SignalBatch) -> Result<IndexMap<String, SignalResult>> {
        batch.validate()?;
        let rows = batch.rows();
        self.0
            .iter()
            .map(|(name, signal)| -> Result<(String, SignalResult)> {
                let result = signal.compute(batch)?;
                let n = result.unscaled_reward.len();
                match rows {
                    Some(rows) if rows != n => Err(PolicyError::ShapeMismatch {
                        what: format!("rewards of {}", name),
                        expected: format!("{} rows", rows),
                        actual: vec![n],
                    }
                    .into()),
                    _ => Ok((name.clone(), result)),
                }
            })
            .collect()
    }

    /// Runs one optimization step of every signal that has a model.
    pub fn update(&mut self, batch: &SignalBatch) -> Result<Record> {
        let mut record = Record::empty();
        for signal in self.0.values_mut() {
            record.merge_inplace(signal.update(batch)?);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RewardSignalConfig;
    use ndarray::{arr1, arr2};
    use tempdir::TempDir;

    fn config() -> SacPolicyConfig {
        SacPolicyConfig::default()
            .clear_reward_signals()
            .reward_signal("entropy", RewardSignalConfig::new(0.1, 0.9))
            .reward_signal("unknown", RewardSignalConfig::new(1.0, 0.9))
            .reward_signal("extrinsic", RewardSignalConfig::new(2.0, 0.99))
    }

    #[test]
    fn test_order_and_unknown_names() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 1);
        let signals = RewardSignals::from_config(&config(), &brain, 0)?;

        assert_eq!(signals.names(), vec!["entropy", "extrinsic"]);
        assert_eq!(signals.reward_columns(), vec!["entropy_rewards", "extrinsic_rewards"]);
        assert_eq!(signals.gammas(), vec![0.9, 0.99]);
        assert_eq!(signals.get("extrinsic").map(|s| s.strength()), Some(2.0));
        assert!(signals.get("unknown").is_none());
        Ok(())
    }

    #[test]
    fn test_compute_all() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 1);
        let mut signals = RewardSignals::from_config(&config(), &brain, 0)?;
        let batch = SignalBatch::default()
            .environment_rewards(arr1(&[1f32, 0.0]))
            .entropy(arr1(&[0.5f32, 1.0]));

        let rewards = signals.compute(&batch)?;
        assert_eq!(rewards["entropy"].scaled_reward, arr1(&[0.05f32, 0.1]));
        assert_eq!(rewards["extrinsic"].scaled_reward, arr1(&[2f32, 0.0]));
        assert!(signals.update(&batch)?.is_empty());

        let err = signals
            .compute(&SignalBatch::default().environment_rewards(arr1(&[1f32])))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::MissingFeature { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_keys_are_fatal() -> Result<()> {
        let brain = BrainParameters::continuous("b", 2, 1);

        let config = SacPolicyConfig::default()
            .reward_signal("curiosity", RewardSignalConfig::new(0.1, 0.9));
        let err = RewardSignals::from_config(&config, &brain, 0).err().unwrap();
        assert_eq!(
            err.downcast_ref::<PolicyError>(),
            Some(&PolicyError::missing_key("curiosity_enc_size", "the curiosity reward signal"))
        );

        let config =
            SacPolicyConfig::default().reward_signal("gail", RewardSignalConfig::new(0.1, 0.9));
        let err = RewardSignals::from_config(&config, &brain, 0).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::MissingConfigKey { .. })
        ));

        let dir = TempDir::new("registry")?;
        let config = config.demo_path(dir.path().join("absent.yaml"));
        let err = RewardSignals::from_config(&config, &brain, 0).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::Demonstration(_))
        ));

        let config = SacPolicyConfig::default().clear_reward_signals();
        assert!(RewardSignals::from_config(&config, &brain, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_imitation_signals_from_demo_file() -> Result<()> {
        let dir = TempDir::new("registry")?;
        let path = dir.path().join("expert.yaml");
        let brain = BrainParameters::continuous("b", 2, 1);
        Demonstration::new(arr2(&[[0f32, 1.0]]), arr2(&[[0.5f32]])).save(&path)?;

        let config = SacPolicyConfig::default()
            .reward_signal("gail", RewardSignalConfig::new(0.1, 0.9))
            .reward_signal("behavioral_cloning", RewardSignalConfig::new(0.5, 0.9))
            .reward_signal("curiosity", RewardSignalConfig::new(0.02, 0.9))
            .curiosity_enc_size(4)
            .demo_path(&path);
        let mut signals = RewardSignals::from_config(&config, &brain, 3)?;
        assert_eq!(
            signals.names(),
            vec!["extrinsic", "gail", "behavioral_cloning", "curiosity"]
        );

        let batch = SignalBatch::default()
            .observations(arr2(&[[0f32, 1.0]]), arr2(&[[1f32, 1.0]]))
            .actions(arr2(&[[0.5f32]]))
            .environment_rewards(arr1(&[1f32]));
        let rewards = signals.compute(&batch)?;
        assert_eq!(rewards["behavioral_cloning"].unscaled_reward, arr1(&[0f32]));
        assert_eq!(rewards.len(), 4);

        let record = signals.update(&batch)?;
        assert!(record.contains_key("gail_loss"));
        assert!(record.contains_key("curiosity_forward_loss"));
        Ok(())
    }
}
