use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp) and [`Mlp2`](super::Mlp2).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
        }
    }

    /// `num_layers` hidden layers of `hidden_units` units each.
    pub fn uniform(in_dim: usize, hidden_units: usize, num_layers: usize, out_dim: usize) -> Self {
        Self::new(in_dim, vec![hidden_units; num_layers], out_dim)
    }

    /// Output dimension.
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Width of the input of the output layer.
    pub(super) fn last_hidden_dim(&self) -> usize {
        self.units.last().copied().unwrap_or(self.in_dim)
    }
}
