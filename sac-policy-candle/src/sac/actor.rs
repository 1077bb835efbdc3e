//! Actor of SAC model.
use crate::{
    mlp::{Mlp2, MlpConfig},
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
};
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};

/// `0.5 * ln(2 * pi)`.
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// Actions sampled from [`GaussianActor`].
pub struct ActorSample {
    /// Squashed actions, `(n, act_dim)`.
    pub action: Tensor,

    /// Log probabilities of each action dimension, `(n, act_dim)`.
    pub log_probs: Tensor,

    /// Entropy of the Gaussian distribution of each agent, `(n,)`.
    pub entropy: Tensor,
}

/// Stochastic policy squashing samples of a diagonal Gaussian with tanh.
pub struct GaussianActor {
    varmap: VarMap,
    pi: Mlp2,
    opt: Optimizer,
    min_log_std: f64,
    max_log_std: f64,
    epsilon: f64,
}

impl GaussianActor {
    /// Constructs [`GaussianActor`].
    pub fn build(
        pi_config: MlpConfig,
        opt_config: &OptimizerConfig,
        (min_log_std, max_log_std): (f64, f64),
        epsilon: f64,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let pi = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            Mlp2::build(vb.pp("policy"), pi_config)?
        };
        let opt = opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            pi,
            opt,
            min_log_std,
            max_log_std,
            epsilon,
        })
    }

    /// Outputs the mean and the clamped log standard deviation.
    pub fn forward(&self, obs: &Tensor) -> Result<(Tensor, Tensor)> {
        let (mean, log_std) = self.pi.forward(obs)?;
        let log_std = log_std.clamp(self.min_log_std, self.max_log_std)?;
        Ok((mean, log_std))
    }

    /// Samples actions with the reparameterization trick.
    pub fn sample(&self, obs: &Tensor) -> Result<ActorSample> {
        let (mean, log_std) = self.forward(obs)?;
        let z = mean.randn_like(0.0, 1.0)?;
        let pre = (&mean + (log_std.exp()? * &z)?)?;
        let action = pre.tanh()?;

        let gauss_logp = ((z.sqr()? * -0.5)? - &log_std)?.affine(1.0, -HALF_LN_2PI)?;
        let squash = (1.0 - action.sqr()?)?.affine(1.0, self.epsilon)?.log()?;
        let log_probs = (gauss_logp - squash)?;
        let entropy = log_std.affine(1.0, 0.5 + HALF_LN_2PI)?.sum(D::Minus1)?;

        Ok(ActorSample {
            action,
            log_probs,
            entropy,
        })
    }

    /// Applies the gradients of the actor parameters in `grads`.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Sets the learning rate of the optimizer.
    pub fn set_learning_rate(&mut self, lr: f64) {
        self.opt.set_learning_rate(lr);
    }

    /// Variables of the actor.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}
