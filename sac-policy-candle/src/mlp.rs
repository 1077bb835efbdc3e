//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

/// Returns the hidden layers of [`MlpConfig`], from the input to the last hidden layer.
fn create_hidden_layers(prefix: &str, vs: &VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut in_dim = config.in_dim;
    let vs = vs.pp(prefix);
    let mut layers = vec![];

    for (i, &units) in config.units.iter().enumerate() {
        layers.push(linear(in_dim, units, vs.pp(format!("ln{}", i)))?);
        in_dim = units;
    }

    Ok(layers)
}

/// Applies the layers with ReLU activations.
fn mlp_forward(xs: Tensor, layers: &[Linear]) -> Result<Tensor> {
    let mut xs = xs;
    for layer in layers.iter() {
        xs = layer.forward(&xs)?.relu()?;
    }
    Ok(xs)
}
