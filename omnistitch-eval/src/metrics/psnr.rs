//! Peak signal-to-noise ratio (PSNR).

use burn::tensor::{backend::Backend, ElementConversion, Tensor};

use super::ensure_same_shape;
use crate::error::EvalResult;

/// Mean squared error over every element of the two tensors.
pub fn mse<B: Backend, const D: usize>(gt: Tensor<B, D>, pred: Tensor<B, D>) -> EvalResult<f64> {
    ensure_same_shape(&gt.dims(), &pred.dims())?;

    let diff = gt - pred;
    let mse = (diff.clone() * diff).mean();

    Ok(mse.into_scalar().elem::<f64>())
}

/// Computes the PSNR of `pred` against `gt` for images in `[0, 1]`:
///
/// `-10 * log10(MSE)`
///
/// Identical inputs have zero error and yield `f64::INFINITY`.
pub fn psnr<B: Backend, const D: usize>(gt: Tensor<B, D>, pred: Tensor<B, D>) -> EvalResult<f64> {
    mse(gt, pred).map(psnr_from_mse)
}

/// PSNR in dB for a peak value of 1.0.
pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        return f64::INFINITY;
    }
    -10.0 * mse.log10()
}
