//! Soft actor-critic (SAC) model.
//!
//! The networks follow the first version of SAC: a squashed Gaussian actor,
//! twin action-value critics, a state-value function with a slowly tracking
//! target copy, and an automatically tuned entropy coefficient. Every network
//! has one output per reward stream.
mod actor;
mod base;
mod config;
mod critic;
mod ent_coef;
mod normalizer;
pub use actor::{ActorSample, GaussianActor};
pub use base::SacModel;
pub use config::SacModelConfig;
pub use critic::{Critic, TargetValue};
pub use ent_coef::EntCoef;
pub use normalizer::Normalizer;
