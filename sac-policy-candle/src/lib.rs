//! Soft actor-critic model for [`sac_policy`] implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! ```no_run
//! use sac_policy::{BrainParameters, SacPolicy, SacPolicyConfig};
//! use sac_policy_candle::{SacModel, SacModelConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let brain = BrainParameters::continuous("crawler", 8, 2);
//! let policy = SacPolicy::new(brain, SacPolicyConfig::default(), 42, true, false, |params| {
//!     SacModel::build(params, SacModelConfig::default())
//! })?;
//! # Ok(())
//! # }
//! ```
pub mod mlp;
pub mod model;
pub mod opt;
pub mod sac;
pub mod util;
use anyhow::Result;
pub use sac::{SacModel, SacModelConfig};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Creates the candle device.
    pub fn build(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}
