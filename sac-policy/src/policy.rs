//! Orchestration of inference and update passes of a SAC model.
mod base;
mod decision;
mod frame;
pub use base::SacPolicy;
pub use decision::{ActionDecision, ActionInfo};
