//! SSIM (Structural Similarity Index).
//!
//! The colour image is treated as a volume: the Gaussian window spans the
//! channel axis as well as height and width, with replicate padding on every
//! axis. This matches the MATLAB-style SSIM commonly reported for frame
//! interpolation benchmarks.
//!
//! Images smaller than the window shrink it to `min(window_size, H, W)`
//! while the padding stays at `window_size / 2`, so the filtered maps
//! of small images are larger than the input.

use burn::{
    prelude::*,
    tensor::{backend::Backend, ElementConversion, Tensor},
};

use super::ensure_same_shape;
use crate::error::{EvalError, EvalResult};

/// Configuration for the SSIM metric.
#[derive(Config, Debug)]
pub struct SsimConfig {
    /// Size of the Gaussian window on every axis.
    #[config(default = 11)]
    pub window_size: usize,
    /// Standard deviation of the Gaussian window.
    #[config(default = 1.5)]
    pub sigma: f64,
    /// Dynamic range of the pixel values.
    #[config(default = 1.0)]
    pub data_range: f64,
}

impl SsimConfig {
    /// Initialize a new SSIM metric with the given configuration.
    pub fn init(&self) -> Ssim {
        Ssim {
            window_size: self.window_size.max(1),
            sigma: self.sigma,
            c1: (0.01 * self.data_range).powi(2),
            c2: (0.03 * self.data_range).powi(2),
        }
    }
}

/// Gaussian-windowed SSIM.
#[derive(Debug, Clone)]
pub struct Ssim {
    window_size: usize,
    sigma: f64,
    c1: f64,
    c2: f64,
}

impl Default for Ssim {
    fn default() -> Self {
        SsimConfig::new().init()
    }
}

impl Ssim {
    /// Calculate the mean SSIM over a batch.
    ///
    /// # Arguments
    /// * `img1` - First image tensor with shape [N, C, H, W]
    /// * `img2` - Second image tensor with shape [N, C, H, W]
    ///
    /// # Returns
    /// SSIM tensor with shape [1]
    pub fn forward<B: Backend>(
        &self,
        img1: Tensor<B, 4>,
        img2: Tensor<B, 4>,
    ) -> EvalResult<Tensor<B, 1>> {
        ensure_same_shape(&img1.dims(), &img2.dims())?;
        let [batch_size, channels, height, width] = img1.dims();
        if batch_size == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(EvalError::InvalidInput {
                reason: format!("SSIM needs a non-empty image, got {:?}", img1.dims()),
            });
        }

        let window = self.create_window(self.window_size.min(height).min(width));
        let pad = self.window_size / 2;

        let mu1 = filter_volume(img1.clone(), &window, pad);
        let mu2 = filter_volume(img2.clone(), &window, pad);

        let mu1_sq = mu1.clone() * mu1.clone();
        let mu2_sq = mu2.clone() * mu2.clone();
        let mu1_mu2 = mu1 * mu2;

        let sigma1_sq = filter_volume(img1.clone() * img1.clone(), &window, pad) - mu1_sq.clone();
        let sigma2_sq = filter_volume(img2.clone() * img2.clone(), &window, pad) - mu2_sq.clone();
        let sigma12 = filter_volume(img1 * img2, &window, pad) - mu1_mu2.clone();

        let v1 = sigma12.mul_scalar(2.0).add_scalar(self.c2);
        let v2 = (sigma1_sq + sigma2_sq).add_scalar(self.c2);

        let ssim_n = mu1_mu2.mul_scalar(2.0).add_scalar(self.c1) * v1;
        let ssim_d = (mu1_sq + mu2_sq).add_scalar(self.c1) * v2;

        Ok((ssim_n / ssim_d).mean())
    }

    /// SSIM between two images (or unit batches) as a scalar.
    pub fn compute<B: Backend>(&self, img1: Tensor<B, 4>, img2: Tensor<B, 4>) -> EvalResult<f64> {
        Ok(self.forward(img1, img2)?.into_scalar().elem::<f64>())
    }

    /// Normalized 1D Gaussian window.
    fn create_window(&self, size: usize) -> Vec<f32> {
        let center = (size / 2) as f64;
        let sigma = self.sigma;

        let gauss: Vec<f64> = (0..size)
            .map(|i| {
                let x = i as f64 - center;
                (-(x * x) / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let sum: f64 = gauss.iter().sum();

        gauss.into_iter().map(|val| (val / sum) as f32).collect()
    }
}

/// Separable Gaussian filter over the channel, height and width axes.
fn filter_volume<B: Backend>(input: Tensor<B, 4>, window: &[f32], pad: usize) -> Tensor<B, 4> {
    [1, 2, 3]
        .into_iter()
        .fold(input, |acc, dim| filter_axis(acc, dim, window, pad))
}

/// Valid 1D correlation along `dim` after replicating `pad` edge values on
/// both sides. The axis ends up `len + 2 * pad + 1 - window.len()` long.
fn filter_axis<B: Backend>(
    input: Tensor<B, 4>,
    dim: usize,
    window: &[f32],
    pad: usize,
) -> Tensor<B, 4> {
    let len = input.dims()[dim];
    let padded = if pad > 0 {
        let before = input.clone().narrow(dim, 0, 1).repeat_dim(dim, pad);
        let after = input.clone().narrow(dim, len - 1, 1).repeat_dim(dim, pad);
        Tensor::cat(vec![before, input, after], dim)
    } else {
        input
    };

    let out_len = len + 2 * pad + 1 - window.len();
    let mut output = padded.clone().narrow(dim, 0, out_len).mul_scalar(window[0]);
    for (offset, &weight) in window.iter().enumerate().skip(1) {
        output = output + padded.clone().narrow(dim, offset, out_len).mul_scalar(weight);
    }
    output
}
