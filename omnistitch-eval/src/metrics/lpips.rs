//! LPIPS (Learned Perceptual Image Patch Similarity), VGG variant.
//!
//! Both images go through a fixed scaling layer and the VGG16 trunk; the
//! five feature maps are unit-normalized along channels, their squared
//! difference is weighted by a learned 1x1 convolution per stage, averaged
//! spatially and summed.
//!
//! Inputs are taken in `[0, 1]` as held by the evaluation loop. With
//! `normalize` enabled they are first mapped to `[-1, 1]`, the range the
//! network was trained on.

use std::path::{Path, PathBuf};

use burn::{
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::Backend, ElementConversion, Tensor},
};
use vgg::{Vgg16Config, Vgg16Features, VGG16_TAP_CHANNELS};

use super::ensure_same_shape;
use crate::error::{EvalError, EvalResult};

/// Per-channel shift of the LPIPS scaling layer.
const SHIFT: [f32; 3] = [-0.030, -0.088, -0.188];
/// Per-channel scale of the LPIPS scaling layer.
const SCALE: [f32; 3] = [0.458, 0.448, 0.450];

const NORM_EPS: f64 = 1e-10;

/// A perceptual distance between two image batches.
pub trait PerceptualMetric<B: Backend> {
    /// Mean distance between `img1` and `img2`, both `[N, 3, H, W]` in `[0, 1]`.
    fn distance(&self, img1: Tensor<B, 4>, img2: Tensor<B, 4>) -> EvalResult<f64>;
}

/// Configuration for the LPIPS metric.
#[derive(Config, Debug)]
pub struct LpipsConfig {
    /// Map `[0, 1]` inputs to `[-1, 1]` before the network.
    #[config(default = false)]
    pub normalize: bool,
}

impl LpipsConfig {
    /// Initialize LPIPS with untrained weights; load pretrained ones before use.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Lpips<B> {
        let layers = VGG16_TAP_CHANNELS
            .iter()
            .map(|&channels| {
                Conv2dConfig::new([channels, 1], [1, 1])
                    .with_bias(false)
                    .init(device)
            })
            .collect();

        Lpips {
            net: Vgg16Config::new().init(device),
            lin: LinearHeads { layers },
            normalize: self.normalize,
        }
    }
}

/// The learned 1x1 projection for each VGG stage.
#[derive(Module, Debug)]
pub struct LinearHeads<B: Backend> {
    /// One `[C_k -> 1]` convolution per stage.
    pub layers: Vec<Conv2d<B>>,
}

/// LPIPS network.
#[derive(Module, Debug)]
pub struct Lpips<B: Backend> {
    /// VGG16 feature trunk.
    pub net: Vgg16Features<B>,
    /// Linear heads.
    pub lin: LinearHeads<B>,
    normalize: bool,
}

impl<B: Backend> Lpips<B> {
    /// Per-sample distances.
    ///
    /// # Shapes
    ///   - inputs `[batch_size, 3, height, width]`
    ///   - output `[batch_size]`
    pub fn forward(&self, img1: Tensor<B, 4>, img2: Tensor<B, 4>) -> Tensor<B, 1> {
        let [batch_size, _, _, _] = img1.dims();
        let device = img1.device();

        let (img1, img2) = if self.normalize {
            (
                img1.mul_scalar(2.0).sub_scalar(1.0),
                img2.mul_scalar(2.0).sub_scalar(1.0),
            )
        } else {
            (img1, img2)
        };

        let feats1 = self.net.forward(scale(img1));
        let feats2 = self.net.forward(scale(img2));

        let mut total = Tensor::<B, 1>::zeros([batch_size], &device);
        for ((feat1, feat2), lin) in feats1.into_iter().zip(feats2).zip(&self.lin.layers) {
            let diff = normalize_channels(feat1) - normalize_channels(feat2);
            let score = lin
                .forward(diff.clone() * diff)
                .mean_dim(3)
                .mean_dim(2)
                .reshape([batch_size]);
            total = total + score;
        }
        total
    }

    /// Loads weights saved as a Burn MessagePack record.
    pub fn load_weights(self, path: &Path, device: &B::Device) -> EvalResult<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| EvalError::WeightLoadingFailed {
                reason: format!("{}: {e}", path.display()),
            })
    }

    /// Saves the weights as a Burn MessagePack record.
    pub fn save_weights(self, path: &Path) -> EvalResult<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.save_file(path.to_path_buf(), &recorder)
            .map_err(|e| EvalError::WeightLoadingFailed {
                reason: format!("could not save {}: {e}", path.display()),
            })
    }

    /// Loads the torchvision VGG16 checkpoint and the LPIPS v0.1 linear heads.
    #[cfg(feature = "pretrained")]
    pub fn load_pytorch(
        mut self,
        vgg_path: &Path,
        lin_path: &Path,
        device: &B::Device,
    ) -> EvalResult<Self> {
        use burn::record::Recorder;
        use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
        use vgg::TORCHVISION_CONV_INDICES;

        let recorder = PyTorchFileRecorder::<FullPrecisionSettings>::default();

        let vgg_args = TORCHVISION_CONV_INDICES.iter().enumerate().fold(
            LoadArgs::new(vgg_path.to_path_buf()),
            |args, (conv, index)| {
                args.with_key_remap(&format!("features\\.{index}\\.(.+)"), &format!("convs.{conv}.$1"))
            },
        );
        let vgg_record = recorder
            .load::<<Vgg16Features<B> as Module<B>>::Record>(vgg_args, device)
            .map_err(|e| EvalError::WeightLoadingFailed {
                reason: format!("{}: {e}", vgg_path.display()),
            })?;
        self.net = self.net.load_record(vgg_record);

        let lin_args = LoadArgs::new(lin_path.to_path_buf())
            .with_key_remap("lin([0-4])\\.model\\.1\\.(.+)", "layers.$1.$2");
        let lin_record = recorder
            .load::<<LinearHeads<B> as Module<B>>::Record>(lin_args, device)
            .map_err(|e| EvalError::WeightLoadingFailed {
                reason: format!("{}: {e}", lin_path.display()),
            })?;
        self.lin = self.lin.load_record(lin_record);

        Ok(self)
    }
}

impl<B: Backend> PerceptualMetric<B> for Lpips<B> {
    fn distance(&self, img1: Tensor<B, 4>, img2: Tensor<B, 4>) -> EvalResult<f64> {
        ensure_same_shape(&img1.dims(), &img2.dims())?;
        let [batch_size, channels, _, _] = img1.dims();
        if channels != 3 || batch_size == 0 {
            return Err(EvalError::InvalidTensorShape {
                expected: "[N >= 1, 3, H, W]".to_string(),
                actual: format!("{:?}", img1.dims()),
            });
        }

        let distances = self.forward(img1, img2);
        Ok(distances.mean().into_scalar().elem::<f64>())
    }
}

/// Where the binary looks for converted LPIPS weights by default.
pub fn default_weights_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("omnistitch").join("lpips_vgg.mpk"))
}

fn scale<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = input.device();
    let shift = Tensor::<B, 1>::from_floats(SHIFT, &device).reshape([1, 3, 1, 1]);
    let scale = Tensor::<B, 1>::from_floats(SCALE, &device).reshape([1, 3, 1, 1]);

    (input - shift) / scale
}

fn normalize_channels<B: Backend>(features: Tensor<B, 4>) -> Tensor<B, 4> {
    let norm = (features.clone() * features.clone())
        .sum_dim(1)
        .sqrt()
        .add_scalar(NORM_EPS);
    features / norm
}

#[cfg(test)]
pub(crate) mod tests {
    use burn::{module::Param, tensor::Distribution};

    use super::*;
    use crate::tests::TestBackend;

    /// LPIPS with non-negative heads so distances are comparable without pretrained weights.
    pub(crate) fn uniform_head_lpips(device: &<TestBackend as Backend>::Device) -> Lpips<TestBackend> {
        let mut lpips = LpipsConfig::new().init::<TestBackend>(device);
        for (layer, channels) in lpips.lin.layers.iter_mut().zip(VGG16_TAP_CHANNELS) {
            layer.weight = Param::from_tensor(Tensor::full(
                [1, channels, 1, 1],
                1.0 / channels as f32,
                device,
            ));
        }
        lpips
    }

    #[test]
    fn identical_images_have_zero_distance() {
        let device = Default::default();
        let lpips = LpipsConfig::new().init::<TestBackend>(&device);
        let image =
            Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);

        let distance = lpips.distance(image.clone(), image).unwrap();
        assert!(distance.abs() < 1e-6, "distance: {distance}");
    }

    #[test]
    fn forward_returns_one_distance_per_sample() {
        let device = Default::default();
        let lpips = LpipsConfig::new().with_normalize(true).init::<TestBackend>(&device);
        let a = Tensor::<TestBackend, 4>::random([3, 3, 16, 16], Distribution::Default, &device);
        let b = Tensor::<TestBackend, 4>::random([3, 3, 16, 16], Distribution::Default, &device);

        assert_eq!(lpips.forward(a, b).dims(), [3]);
    }

    #[test]
    fn different_images_have_positive_distance() {
        let device = Default::default();
        let lpips = uniform_head_lpips(&device);
        let zeros = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);
        let noise =
            Tensor::<TestBackend, 4>::random([1, 3, 16, 16], Distribution::Default, &device);

        let distance = lpips.distance(zeros, noise).unwrap();
        assert!(distance > 0.0, "distance: {distance}");
    }

    #[test]
    fn symmetric() {
        let device = Default::default();
        let lpips = uniform_head_lpips(&device);
        let a = Tensor::<TestBackend, 4>::random([1, 3, 16, 16], Distribution::Default, &device);
        let b = Tensor::<TestBackend, 4>::random([1, 3, 16, 16], Distribution::Default, &device);

        let ab = lpips.distance(a.clone(), b.clone()).unwrap();
        let ba = lpips.distance(b, a).unwrap();
        assert!((ab - ba).abs() < 1e-5);
    }

    #[test]
    fn grayscale_input_is_rejected() {
        let device = Default::default();
        let lpips = LpipsConfig::new().init::<TestBackend>(&device);
        let image = Tensor::<TestBackend, 4>::zeros([1, 1, 16, 16], &device);

        assert!(matches!(
            lpips.distance(image.clone(), image),
            Err(EvalError::InvalidTensorShape { .. })
        ));
    }

    #[test]
    fn weights_round_trip_through_mpk() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lpips_vgg.mpk");

        let lpips = uniform_head_lpips(&device);
        let image =
            Tensor::<TestBackend, 4>::random([1, 3, 16, 16], Distribution::Default, &device);
        let zeros = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);
        let expected = lpips.distance(image.clone(), zeros.clone()).unwrap();
        lpips.save_weights(&path).unwrap();

        let loaded = LpipsConfig::new()
            .init::<TestBackend>(&device)
            .load_weights(&path, &device)
            .unwrap();
        let actual = loaded.distance(image, zeros).unwrap();
        assert!((expected - actual).abs() < 1e-6);
    }

    #[test]
    fn missing_weights_file_is_an_error() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();

        let result = LpipsConfig::new()
            .init::<TestBackend>(&device)
            .load_weights(&dir.path().join("missing.mpk"), &device);
        assert!(matches!(
            result,
            Err(EvalError::WeightLoadingFailed { .. })
        ));
    }
}
