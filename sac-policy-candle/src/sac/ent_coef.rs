//! Entropy coefficient of SAC.
use crate::{
    opt::{Optimizer, OptimizerConfig},
    util::masked_mean,
};
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};

/// Automatically tuned entropy coefficient.
///
/// The coefficient is kept in log space and trained toward `target_entropy`.
pub struct EntCoef {
    varmap: VarMap,
    log_alpha: Tensor,
    target_entropy: f64,
    opt: Optimizer,
}

impl EntCoef {
    /// Constructs [`EntCoef`] starting from `init_alpha`.
    pub fn new(
        init_alpha: f64,
        target_entropy: f64,
        opt_config: &OptimizerConfig,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let log_alpha = vb.get_with_hints(1, "log_alpha", Init::Const(init_alpha.ln()))?;
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            log_alpha,
            target_entropy,
            opt,
        })
    }

    /// Returns the entropy coefficient, `(1,)`, detached from the graph.
    pub fn alpha(&self) -> Result<Tensor> {
        Ok(self.log_alpha.detach().exp()?)
    }

    /// Target entropy.
    pub fn target_entropy(&self) -> f64 {
        self.target_entropy
    }

    /// Loss of the coefficient given the log probabilities of sampled actions, `(n,)`.
    pub fn loss(&self, logp: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let tgt = logp.affine(1.0, self.target_entropy)?.detach();
        let xs = self.log_alpha.broadcast_mul(&tgt)?;
        Ok((masked_mean(&xs, mask)? * -1.0)?)
    }

    /// Applies the gradient of the coefficient in `grads`.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Sets the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.opt.set_learning_rate(lr);
    }

    /// Variables of the coefficient.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_alpha() -> Result<()> {
        let ent_coef = EntCoef::new(0.5, -2.0, &OptimizerConfig::default(), &Device::Cpu)?;
        let alpha = ent_coef.alpha()?.to_vec1::<f32>()?;
        assert!((alpha[0] - 0.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_alpha_decreases_when_entropy_is_above_target() -> Result<()> {
        let opt_config = OptimizerConfig::Adam { lr: 0.1 };
        let mut ent_coef = EntCoef::new(1.0, -2.0, &opt_config, &Device::Cpu)?;
        // logp + target_entropy < 0 means the entropy is above the target.
        let logp = Tensor::from_slice(&[0.5f32, 0.5, 0.5], (3,), &Device::Cpu)?;
        let mask = logp.ones_like()?;

        let loss = ent_coef.loss(&logp, &mask)?;
        let grads = loss.backward()?;
        ent_coef.step(&grads)?;

        let alpha = ent_coef.alpha()?.to_vec1::<f32>()?;
        assert!(alpha[0] < 1.0);
        Ok(())
    }
}
