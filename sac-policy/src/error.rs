//! Errors in the library.
use thiserror::Error;

/// Errors raised by the policy core.
///
/// Configuration errors are raised while a [`SacPolicy`](crate::SacPolicy) is
/// constructed. Shape and precondition errors are raised by the call that exposes
/// them. Neither is recovered internally.
#[derive(Error, Debug, PartialEq)]
pub enum PolicyError {
    /// A key required by an enabled feature is absent from the configuration.
    #[error("Missing configuration key `{key}` required by {feature}")]
    MissingConfigKey {
        /// Name of the configuration key.
        key: String,
        /// Feature requiring the key.
        feature: String,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A demonstration file could not be read or is malformed.
    #[error("Demonstration error: {0}")]
    Demonstration(String),

    /// The model implementation does not support a requested feature.
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An array does not have the shape required by the binding.
    #[error("Shape mismatch for {what}: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        /// The binding being built.
        what: String,
        /// Description of the expected shape.
        expected: String,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// A minibatch column is absent.
    #[error("Minibatch column `{0}` is missing")]
    MissingColumn(String),

    /// A minibatch lacks the reward column of a registered reward signal.
    #[error("Minibatch has no reward column for reward signal `{0}`")]
    MissingRewardColumn(String),

    /// An input needed by a reward signal is absent.
    #[error("Reward signal `{signal}` requires {feature}")]
    MissingFeature {
        /// Name of the reward signal.
        signal: String,
        /// The missing input.
        feature: String,
    },

    /// An agent index is outside of the batch.
    #[error("Agent index {index} is out of range for a batch of {len} agents")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of agents in the batch.
        len: usize,
    },

    /// A request misses a binding required by the enabled features.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The model did not return a requested output.
    #[error("Model output `{0}` is missing")]
    MissingOutput(String),

    /// A record value has an unexpected type.
    #[error("Record value type error: {key} is not {expected}")]
    OutputType {
        /// Key of the value.
        key: String,
        /// The expected type.
        expected: String,
    },
}

impl PolicyError {
    /// Shorthand of [`PolicyError::ShapeMismatch`].
    pub fn shape(what: impl Into<String>, expected: impl Into<String>, actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    /// Shorthand of [`PolicyError::MissingConfigKey`].
    pub fn missing_key(key: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::MissingConfigKey {
            key: key.into(),
            feature: feature.into(),
        }
    }
}
