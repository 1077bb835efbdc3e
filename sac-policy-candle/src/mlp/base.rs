use super::{create_hidden_layers, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function and a linear output layer.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
    head: Linear,
}

fn _build(vs: VarBuilder, config: MlpConfig) -> Result<Mlp> {
    let device = vs.device().clone();
    let layers = create_hidden_layers("mlp", &vs, &config)?;
    let head = linear(config.last_hidden_dim(), config.out_dim, vs.pp("mlp").pp("out"))?;

    Ok(Mlp {
        device,
        layers,
        head,
    })
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let xs = xs.to_device(&self.device)?;
        let xs = mlp_forward(xs, &self.layers)?;
        Ok(self.head.forward(&xs)?)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vs, config)
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Self::Output> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        let xs = mlp_forward(input, &self.layers)?;
        Ok(self.head.forward(&xs)?)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vs, config)
    }
}
