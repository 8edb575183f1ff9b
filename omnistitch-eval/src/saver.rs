//! Persistence of predicted frames.

use std::path::{Path, PathBuf};

use burn::tensor::{backend::Backend, Tensor};
use image::RgbImage;

use crate::error::{EvalError, EvalResult};

/// Where predictions go, if anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PredictionSaver {
    /// Predictions are dropped.
    #[default]
    Disabled,
    /// Predictions are written as `pred_<index>.png` below the directory.
    Directory(PathBuf),
}

impl PredictionSaver {
    /// Prepares an empty output directory, removing whatever it held.
    pub fn directory(root: impl Into<PathBuf>) -> EvalResult<Self> {
        let root = root.into();
        if root.exists() {
            std::fs::remove_dir_all(&root).map_err(|source| EvalError::Io {
                path: root.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&root).map_err(|source| EvalError::Io {
            path: root.clone(),
            source,
        })?;

        tracing::info!(root = %root.display(), "saving predictions");
        Ok(Self::Directory(root))
    }

    /// [`Self::directory`] when a root is given, [`Self::Disabled`] otherwise.
    pub fn from_option(root: Option<&Path>) -> EvalResult<Self> {
        root.map_or(Ok(Self::Disabled), Self::directory)
    }

    pub fn file_name(index: usize) -> String {
        format!("pred_{index}.png")
    }

    pub fn root(&self) -> Option<&Path> {
        match self {
            Self::Disabled => None,
            Self::Directory(root) => Some(root),
        }
    }

    /// Writes one prediction.
    ///
    /// # Arguments
    /// * `index` - Global prediction counter
    /// * `image` - Prediction with shape [3, H, W] in `[0, 1]`
    ///
    /// # Returns
    /// The written path, or `None` when saving is disabled.
    pub fn save<B: Backend>(&self, index: usize, image: Tensor<B, 3>) -> EvalResult<Option<PathBuf>> {
        let Self::Directory(root) = self else {
            return Ok(None);
        };

        let [channels, height, width] = image.dims();
        if channels != 3 {
            return Err(EvalError::InvalidTensorShape {
                expected: "[3, H, W]".to_string(),
                actual: format!("{:?}", image.dims()),
            });
        }

        let pixels: Vec<u8> = image
            .mul_scalar(255.0)
            .round()
            .clamp(0.0, 255.0)
            .permute([1, 2, 0])
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| EvalError::TensorData {
                reason: format!("{e:?}"),
            })?
            .into_iter()
            .map(|value| value as u8)
            .collect();

        let path = root.join(Self::file_name(index));
        let buffer = RgbImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
            EvalError::InvalidInput {
                reason: format!("pixel buffer does not match {width}x{height}"),
            }
        })?;
        buffer.save(&path).map_err(|source| EvalError::Image {
            path: path.clone(),
            source,
        })?;

        Ok(Some(path))
    }
}
