//! Utilities.
use anyhow::{anyhow, Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::trace;
use ndarray::{Array1, Array2, ArrayD, IxDyn};

/// Lower bound of the decayed learning rate.
pub const MIN_LEARNING_RATE: f64 = 1e-10;

/// Apply soft update on variables.
///
/// Variables are identified by their names. Every variable of `dest` must have a
/// counterpart in `src`; variables only in `src` are ignored.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest
        .data()
        .lock()
        .map_err(|e| anyhow!("Failed to lock the target variables: {}", e))?;
    trace!("src");
    let src = src
        .data()
        .lock()
        .map_err(|e| anyhow!("Failed to lock the source variables: {}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .with_context(|| format!("Variable {} is not in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Learning rate decayed linearly from `lr` to [`MIN_LEARNING_RATE`] over `max_step` steps.
pub fn polynomial_decay(lr: f64, step: u64, max_step: f64) -> f64 {
    if max_step <= 0.0 {
        return lr;
    }
    let progress = (step as f64).min(max_step) / max_step;
    (lr - MIN_LEARNING_RATE) * (1.0 - progress) + MIN_LEARNING_RATE
}

/// Mean of `xs` over the rows selected by `mask`.
///
/// Both tensors have the shape `(n,)`. The denominator is at least one, so an
/// all-zero mask gives zero.
pub fn masked_mean(xs: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let denom = mask.sum_all()?.to_scalar::<f32>()?.max(1.0);
    Ok(((xs * mask)?.sum_all()? / denom as f64)?)
}

/// Converts an array into a tensor on `device`.
pub fn array2_to_tensor(a: &Array2<f32>, device: &Device) -> Result<Tensor> {
    let v = a.iter().copied().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, a.dim(), device)?)
}

/// Converts an array into a tensor on `device`.
pub fn array1_to_tensor(a: &Array1<f32>, device: &Device) -> Result<Tensor> {
    let v = a.iter().copied().collect::<Vec<_>>();
    Ok(Tensor::from_vec(v, a.len(), device)?)
}

/// Converts a tensor of rank 2 into an array.
pub fn tensor_to_array2(t: &Tensor) -> Result<Array2<f32>> {
    let shape = t.dims2()?;
    let v = t.flatten_all()?.to_vec1::<f32>()?;
    Ok(Array2::from_shape_vec(shape, v)?)
}

/// Converts a tensor into an array of the same shape.
pub fn tensor_to_arrayd(t: &Tensor) -> Result<ArrayD<f32>> {
    let shape = t.dims().to_vec();
    let v = t.flatten_all()?.to_vec1::<f32>()?;
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), v)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;
    use ndarray::arr2;

    fn varmap_with(name: &str, t: &Tensor) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get(t.dims(), name, init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap().get(name).unwrap().set(t)?;
        Ok(vm)
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + ((1.0 - tau) * &t_dest)?)?;

        let vm_src = varmap_with("var1", &t_src)?;
        let vm_dest = varmap_with("var1", &t_dest)?;
        track(&vm_dest, &vm_src, tau)?;

        let t_ = vm_dest
            .data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .clone();
        assert!((t - t_)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

        Ok(())
    }

    #[test]
    fn test_track_missing_source_variable() -> Result<()> {
        let t = Tensor::from_slice(&[1.0f32, 2.0], (2,), &Device::Cpu)?;
        let vm_src = varmap_with("var1", &t)?;
        let vm_dest = varmap_with("var2", &t)?;

        assert!(track(&vm_dest, &vm_src, 1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_polynomial_decay() {
        assert_eq!(polynomial_decay(3e-4, 0, 100.0), 3e-4);
        assert!((polynomial_decay(3e-4, 50, 100.0) - 1.5e-4).abs() < 1e-9);
        assert_eq!(polynomial_decay(3e-4, 100, 100.0), MIN_LEARNING_RATE);
        assert_eq!(polynomial_decay(3e-4, 500, 100.0), MIN_LEARNING_RATE);
    }

    #[test]
    fn test_masked_mean() -> Result<()> {
        let xs = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 10.0], (4,), &Device::Cpu)?;
        let mask = Tensor::from_slice(&[1.0f32, 1.0, 1.0, 0.0], (4,), &Device::Cpu)?;
        assert!((masked_mean(&xs, &mask)?.to_scalar::<f32>()? - 2.0).abs() < 1e-6);

        let zeros = mask.zeros_like()?;
        assert_eq!(masked_mean(&xs, &zeros)?.to_scalar::<f32>()?, 0.0);
        Ok(())
    }

    #[test]
    fn test_array_conversions() -> Result<()> {
        let a = arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let t = array2_to_tensor(&a, &Device::Cpu)?;
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(tensor_to_array2(&t.t()?)?, a.t().to_owned());
        assert_eq!(tensor_to_arrayd(&t)?.shape(), &[2, 3]);
        Ok(())
    }
}
