//! Critics of SAC model.
use crate::{
    mlp::{Mlp, MlpConfig},
    model::{SubModel1, SubModel2},
    opt::{Optimizer, OptimizerConfig},
    util::track,
};
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

/// Twin action-value functions and the state-value function.
///
/// The three networks share one optimizer; their losses are summed before
/// differentiation.
pub struct Critic {
    varmap: VarMap,
    q1: Mlp,
    q2: Mlp,
    value: Mlp,
    opt: Optimizer,
}

impl Critic {
    /// Constructs [`Critic`].
    ///
    /// `q_config` takes concatenated observations and actions, `v_config`
    /// observations only.
    pub fn build(
        q_config: MlpConfig,
        v_config: MlpConfig,
        opt_config: &OptimizerConfig,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let (q1, q2, value) = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            let q1 = <Mlp as SubModel2>::build(vb.pp("q1"), q_config.clone())?;
            let q2 = <Mlp as SubModel2>::build(vb.pp("q2"), q_config)?;
            let value = <Mlp as SubModel1>::build(vb.pp("value"), v_config)?;
            (q1, q2, value)
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            q1,
            q2,
            value,
            opt,
        })
    }

    /// Outputs of both action-value functions, `(n, n_streams)` each.
    pub fn q(&self, obs: &Tensor, act: &Tensor) -> Result<(Tensor, Tensor)> {
        let q1 = SubModel2::forward(&self.q1, obs, act)?;
        let q2 = SubModel2::forward(&self.q2, obs, act)?;
        Ok((q1, q2))
    }

    /// Output of the first action-value function.
    pub fn q1(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        SubModel2::forward(&self.q1, obs, act)
    }

    /// Output of the state-value function, `(n, n_streams)`.
    pub fn value(&self, obs: &Tensor) -> Result<Tensor> {
        SubModel1::forward(&self.value, obs)
    }

    /// Applies the gradients of the critic parameters in `grads`.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Sets the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.opt.set_learning_rate(lr);
    }

    /// Variables of the critics.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}

/// Target copy of the state-value function.
///
/// Its variables are named like those of [`Critic`]'s value function, so it
/// can track them with [`track`].
pub struct TargetValue {
    varmap: VarMap,
    value: Mlp,
}

impl TargetValue {
    /// Constructs [`TargetValue`].
    pub fn build(v_config: MlpConfig, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let value = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            <Mlp as SubModel1>::build(vb.pp("value"), v_config)?
        };

        Ok(Self { varmap, value })
    }

    /// Output of the target state-value function, detached from the graph.
    pub fn value(&self, obs: &Tensor) -> Result<Tensor> {
        Ok(SubModel1::forward(&self.value, obs)?.detach())
    }

    /// Moves the parameters toward the value function of `critic`.
    pub fn track(&self, critic: &Critic, tau: f64) -> Result<()> {
        track(&self.varmap, critic.varmap(), tau)
    }

    /// Variables of the target.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::tensor_to_array2;

    fn nets() -> Result<(Critic, TargetValue)> {
        let device = Device::Cpu;
        let critic = Critic::build(
            MlpConfig::uniform(5, 8, 2, 2),
            MlpConfig::uniform(3, 8, 2, 2),
            &OptimizerConfig::default(),
            &device,
        )?;
        let target = TargetValue::build(MlpConfig::uniform(3, 8, 2, 2), &device)?;
        Ok((critic, target))
    }

    #[test]
    fn test_output_shapes() -> Result<()> {
        let (critic, target) = nets()?;
        let obs = Tensor::randn(0f32, 1f32, (4, 3), &Device::Cpu)?;
        let act = Tensor::randn(0f32, 1f32, (4, 2), &Device::Cpu)?;

        let (q1, q2) = critic.q(&obs, &act)?;
        assert_eq!(q1.dims(), &[4, 2]);
        assert_eq!(q2.dims(), &[4, 2]);
        assert_eq!(critic.value(&obs)?.dims(), &[4, 2]);
        assert_eq!(target.value(&obs)?.dims(), &[4, 2]);
        Ok(())
    }

    #[test]
    fn test_hard_copy_matches_value() -> Result<()> {
        let (critic, target) = nets()?;
        let obs = Tensor::randn(0f32, 1f32, (4, 3), &Device::Cpu)?;

        target.track(&critic, 1.0)?;

        let v = tensor_to_array2(&critic.value(&obs)?)?;
        let v_tgt = tensor_to_array2(&target.value(&obs)?)?;
        assert!(v.iter().zip(v_tgt.iter()).all(|(a, b)| (a - b).abs() < 1e-6));
        Ok(())
    }
}
