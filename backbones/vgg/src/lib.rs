//! VGG16 feature extractor.
//!
//! This crate provides the convolutional part of VGG16 as used by
//! perceptual metrics such as LPIPS. Instead of the final pooled features,
//! it exposes the activations after the last ReLU of each of the five
//! stages (`relu1_2`, `relu2_2`, `relu3_3`, `relu4_3`, `relu5_3`).
//!
//! The layer layout follows the torchvision `vgg16().features` module so that
//! pretrained torchvision checkpoints can be mapped onto it.

use core::{f64::consts::SQRT_2, ops::Range};

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

/// Number of convolutions and output channels of each VGG16 stage.
pub const VGG16_STAGES: [(usize, usize); 5] = [(2, 64), (2, 128), (3, 256), (3, 512), (3, 512)];

/// Output channels of the five feature taps.
pub const VGG16_TAP_CHANNELS: [usize; 5] = [64, 128, 256, 512, 512];

/// Position of every convolution inside torchvision's `vgg16().features`.
///
/// Each convolution is followed by a ReLU and each stage by a max pool, so
/// the indices skip over those parameterless entries.
pub const TORCHVISION_CONV_INDICES: [usize; 13] = [0, 2, 5, 7, 10, 12, 14, 17, 19, 21, 24, 26, 28];

/// VGG16 feature extractor configuration.
#[derive(Config, Debug)]
pub struct Vgg16Config {
    /// Channels of the input image.
    #[config(default = 3)]
    pub in_channels: usize,
}

impl Vgg16Config {
    /// Initialize the feature extractor with Kaiming-initialized weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg16Features<B> {
        let initializer = Initializer::KaimingNormal {
            gain: SQRT_2,
            fan_out_only: true,
        };

        let mut convs = Vec::with_capacity(TORCHVISION_CONV_INDICES.len());
        let mut current_channels = self.in_channels;

        for (num_convs, out_channels) in VGG16_STAGES {
            for _ in 0..num_convs {
                // 3x3 conv, stride=1, padding=1
                let conv = Conv2dConfig::new([current_channels, out_channels], [3, 3])
                    .with_stride([1, 1])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .with_bias(true)
                    .with_initializer(initializer.clone())
                    .init(device);
                convs.push(conv);
                current_channels = out_channels;
            }
        }

        Vgg16Features {
            convs,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            relu: Relu::new(),
        }
    }
}

/// Convolutional trunk of VGG16 returning one activation per stage.
#[derive(Module, Debug)]
pub struct Vgg16Features<B: Backend> {
    /// The 13 convolutions in torchvision order.
    pub convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    relu: Relu,
}

impl<B: Backend> Vgg16Features<B> {
    /// Forward pass returning `[relu1_2, relu2_2, relu3_3, relu4_3, relu5_3]`.
    ///
    /// # Shapes
    ///   - input `[batch_size, 3, height, width]`
    ///   - stage `k` output `[batch_size, VGG16_TAP_CHANNELS[k], height / 2^k, width / 2^k]`
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let ranges = stage_ranges();

        let relu1_2 = self.stage(input, ranges[0].clone());
        let relu2_2 = self.stage(self.pool.forward(relu1_2.clone()), ranges[1].clone());
        let relu3_3 = self.stage(self.pool.forward(relu2_2.clone()), ranges[2].clone());
        let relu4_3 = self.stage(self.pool.forward(relu3_3.clone()), ranges[3].clone());
        let relu5_3 = self.stage(self.pool.forward(relu4_3.clone()), ranges[4].clone());

        [relu1_2, relu2_2, relu3_3, relu4_3, relu5_3]
    }

    fn stage(&self, mut input: Tensor<B, 4>, convs: Range<usize>) -> Tensor<B, 4> {
        for conv in &self.convs[convs] {
            input = self.relu.forward(conv.forward(input));
        }
        input
    }
}

/// Index ranges into `Vgg16Features::convs` for each stage.
fn stage_ranges() -> [Range<usize>; 5] {
    let mut start = 0;
    VGG16_STAGES.map(|(num_convs, _)| {
        let range = start..start + num_convs;
        start += num_convs;
        range
    })
}
