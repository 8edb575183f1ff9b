//! Image quality metrics used by the benchmark.
//!
//! - **PSNR**: log-scaled inverse of the mean squared pixel error.
//! - **SSIM**: Gaussian-windowed structural similarity.
//! - **LPIPS**: learned perceptual distance on VGG16 features.
//!
//! All metrics take images normalized to `[0, 1]` and return `f64` scalars.

pub mod lpips;
pub mod psnr;
pub mod ssim;

pub use lpips::*;
pub use psnr::*;
pub use ssim::*;

use crate::error::{EvalError, EvalResult};

/// Fail with `InvalidTensorShape` unless both shapes are identical.
pub(crate) fn ensure_same_shape(expected: &[usize], actual: &[usize]) -> EvalResult<()> {
    if expected != actual {
        return Err(EvalError::InvalidTensorShape {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        });
    }
    Ok(())
}
