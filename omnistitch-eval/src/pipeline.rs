//! Interpolation pipeline.
//!
//! The evaluator only sees the [`Interpolator`] seam: given the two reference
//! frames and the pyramid settings, produce the middle frame. Models are
//! selected by name through [`InterpolationModel`].

use std::{fmt, path::PathBuf};

use burn::{
    prelude::*,
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{EvalError, EvalResult},
    metrics::ensure_same_shape,
};

/// Pyramid settings forwarded to the model at inference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidLevels {
    /// Number of pyramid levels of the model.
    pub pyr_level: usize,
    /// Number of finest levels the model skips.
    pub nr_lvl_skipped: usize,
}

impl PyramidLevels {
    /// Levels with the conventional `pyr_level - 3` skipped levels.
    pub const fn new(pyr_level: usize) -> Self {
        Self {
            pyr_level,
            nr_lvl_skipped: pyr_level.saturating_sub(3),
        }
    }
}

impl Default for PyramidLevels {
    fn default() -> Self {
        Self::new(4)
    }
}

/// A model that synthesizes the frame between two references.
pub trait Interpolator<B: Backend> {
    /// Predict the middle frame.
    ///
    /// # Arguments
    /// * `img0` - First reference with shape [N, 3, H, W] in `[0, 1]`
    /// * `img1` - Second reference with shape [N, 3, H, W] in `[0, 1]`
    /// * `levels` - Pyramid settings
    ///
    /// # Returns
    /// Prediction with shape [N, 3, H, W] in `[0, 1]`
    fn interpolate(
        &self,
        img0: Tensor<B, 4>,
        img1: Tensor<B, 4>,
        levels: &PyramidLevels,
    ) -> EvalResult<Tensor<B, 4>>;
}

/// Linear blend of the two references at time `time`.
///
/// Serves as the reference baseline of the benchmark: any learned model
/// should beat it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBlend {
    pub time: f32,
}

impl Default for FrameBlend {
    fn default() -> Self {
        Self { time: 0.5 }
    }
}

impl<B: Backend> Interpolator<B> for FrameBlend {
    fn interpolate(
        &self,
        img0: Tensor<B, 4>,
        img1: Tensor<B, 4>,
        _levels: &PyramidLevels,
    ) -> EvalResult<Tensor<B, 4>> {
        ensure_same_shape(&img0.dims(), &img1.dims())?;
        Ok(img0.mul_scalar(1.0 - self.time) + img1.mul_scalar(self.time))
    }
}

/// Interpolation models known by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpolationModel {
    Blend(FrameBlend),
}

impl InterpolationModel {
    /// Registered model names.
    pub const AVAILABLE: [&'static str; 1] = ["blend"];

    /// Looks a model up by name.
    pub fn from_name(name: &str) -> EvalResult<Self> {
        match name {
            "blend" => Ok(Self::Blend(FrameBlend::default())),
            _ => Err(EvalError::UnsupportedModel {
                name: name.to_string(),
                available: Self::AVAILABLE.join(", "),
            }),
        }
    }

    /// Registered name of the model.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blend(_) => "blend",
        }
    }
}

impl fmt::Display for InterpolationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<B: Backend> Interpolator<B> for InterpolationModel {
    fn interpolate(
        &self,
        img0: Tensor<B, 4>,
        img1: Tensor<B, 4>,
        levels: &PyramidLevels,
    ) -> EvalResult<Tensor<B, 4>> {
        match self {
            Self::Blend(blend) => blend.interpolate(img0, img1, levels),
        }
    }
}

/// Configuration of the inference pipeline.
#[derive(Config, Debug)]
pub struct PipelineConfig {
    /// Name of the interpolation model.
    #[config(default = "String::from(\"blend\")")]
    pub model_name: String,
    /// Weights of the model, for models that have any.
    pub model_file: Option<PathBuf>,
    /// Number of pyramid levels.
    #[config(default = 4)]
    pub pyr_level: usize,
    /// Skipped levels; `pyr_level - 3` when unset.
    pub nr_lvl_skipped: Option<usize>,
    /// Whether to load pretrained weights.
    #[config(default = true)]
    pub load_pretrain: bool,
}

impl PipelineConfig {
    /// The effective pyramid settings.
    pub fn levels(&self) -> PyramidLevels {
        PyramidLevels {
            pyr_level: self.pyr_level,
            nr_lvl_skipped: self
                .nr_lvl_skipped
                .unwrap_or_else(|| self.pyr_level.saturating_sub(3)),
        }
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Fails for an unknown model name or for inconsistent pyramid settings.
    pub fn init(&self) -> EvalResult<Pipeline<InterpolationModel>> {
        let levels = self.levels();
        if levels.pyr_level == 0 || levels.nr_lvl_skipped >= levels.pyr_level {
            return Err(EvalError::InvalidInput {
                reason: format!(
                    "nr_lvl_skipped ({}) must be below pyr_level ({})",
                    levels.nr_lvl_skipped, levels.pyr_level
                ),
            });
        }

        let model = InterpolationModel::from_name(&self.model_name)?;
        if let Some(model_file) = &self.model_file {
            if self.load_pretrain {
                tracing::warn!(
                    model = %model,
                    file = %model_file.display(),
                    "model has no weights, ignoring model file"
                );
            }
        }

        tracing::info!(
            model = %model,
            pyr_level = levels.pyr_level,
            nr_lvl_skipped = levels.nr_lvl_skipped,
            "pipeline ready"
        );
        Ok(Pipeline::new(model, levels))
    }
}

/// A model bound to its pyramid settings.
#[derive(Debug, Clone)]
pub struct Pipeline<M> {
    model: M,
    levels: PyramidLevels,
}

impl<M> Pipeline<M> {
    pub const fn new(model: M, levels: PyramidLevels) -> Self {
        Self { model, levels }
    }

    pub const fn model(&self) -> &M {
        &self.model
    }

    pub const fn levels(&self) -> &PyramidLevels {
        &self.levels
    }

    /// Runs the model on a batch of reference pairs.
    pub fn inference<B: Backend>(
        &self,
        img0: Tensor<B, 4>,
        img1: Tensor<B, 4>,
    ) -> EvalResult<Tensor<B, 4>>
    where
        M: Interpolator<B>,
    {
        ensure_same_shape(&img0.dims(), &img1.dims())?;
        self.model.interpolate(img0, img1, &self.levels)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::Tensor;

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn default_levels_skip_all_but_three() {
        let config = PipelineConfig::new();
        assert_eq!(
            config.levels(),
            PyramidLevels {
                pyr_level: 4,
                nr_lvl_skipped: 1
            }
        );
        assert_eq!(PyramidLevels::new(2).nr_lvl_skipped, 0);
        assert_eq!(
            config.with_pyr_level(6).with_nr_lvl_skipped(Some(2)).levels(),
            PyramidLevels {
                pyr_level: 6,
                nr_lvl_skipped: 2
            }
        );
    }

    #[test]
    fn unknown_model_is_rejected() {
        let result = PipelineConfig::new()
            .with_model_name("omnistitch".to_string())
            .init();

        match result {
            Err(EvalError::UnsupportedModel { name, available }) => {
                assert_eq!(name, "omnistitch");
                assert_eq!(available, "blend");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn too_many_skipped_levels_are_rejected() {
        let result = PipelineConfig::new()
            .with_pyr_level(3)
            .with_nr_lvl_skipped(Some(3))
            .init();

        assert!(matches!(result, Err(EvalError::InvalidInput { .. })));
    }

    #[test]
    fn blend_averages_the_references() {
        let device = Default::default();
        let pipeline = PipelineConfig::new().init().unwrap();
        let img0 = Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device);
        let img1 = Tensor::<TestBackend, 4>::ones([2, 3, 4, 4], &device);

        let pred = pipeline.inference(img0, img1).unwrap();

        assert_eq!(pred.dims(), [2, 3, 4, 4]);
        let max_error = pred.sub_scalar(0.5).abs().max().into_scalar();
        assert!(max_error < 1e-6);
    }

    #[test]
    fn blend_at_time_zero_returns_first_reference() {
        let device = Default::default();
        let img0 = Tensor::<TestBackend, 4>::full([1, 3, 2, 2], 0.25, &device);
        let img1 = Tensor::<TestBackend, 4>::ones([1, 3, 2, 2], &device);

        let pred = FrameBlend { time: 0.0 }
            .interpolate(img0.clone(), img1, &PyramidLevels::default())
            .unwrap();

        pred.into_data().assert_eq(&img0.into_data(), true);
    }

    #[test]
    fn mismatched_references_are_rejected() {
        let device = Default::default();
        let pipeline = PipelineConfig::new().init().unwrap();
        let img0 = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let img1 = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 2], &device);

        assert!(matches!(
            pipeline.inference(img0, img1),
            Err(EvalError::InvalidTensorShape { .. })
        ));
    }
}
