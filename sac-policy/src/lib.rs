#![warn(missing_docs)]
//! Policy-update core of a soft actor-critic (SAC) trainer.
//!
//! [`SacPolicy`] evaluates actions for a batch of agents and updates a
//! [`PolicyModel`] from sampled experiences, blending the rewards of the
//! configured [`RewardSignals`]. The numeric model is supplied by the caller
//! through a factory receiving [`ModelParams`].
pub mod batch;
pub mod error;
pub mod model;
pub mod policy;
pub mod record;
pub mod request;
pub mod reward_signal;

mod brain;
mod config;
pub use batch::{columns, Minibatch, ObservationBatch};
pub use brain::{ActionSpace, BrainParameters, VisualShape};
pub use config::{RewardSignalConfig, SacPolicyConfig};
pub use error::PolicyError;
pub use model::{ModelParams, OutputSlot, PolicyModel};
pub use policy::{ActionDecision, ActionInfo, SacPolicy};
pub use record::{Record, RecordValue};
pub use request::{FeatureSet, InferenceRequest, UpdateRequest};
pub use reward_signal::{RewardSignal, RewardSignals, SignalBatch, SignalResult};
