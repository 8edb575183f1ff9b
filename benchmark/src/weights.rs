//! LPIPS weight resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use omnistitch_eval::{default_weights_path, Lpips};

use crate::config::LpipsWeightsConfig;

/// A resolved source of LPIPS weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LpipsWeights {
    /// torchvision VGG16 and LPIPS linear head checkpoints.
    PyTorch { vgg: PathBuf, lin: PathBuf },
    /// Burn MessagePack record.
    Record(PathBuf),
}

impl LpipsWeights {
    /// Picks the weight source, falling back to the cache record.
    pub fn resolve(config: &LpipsWeightsConfig) -> Result<Self> {
        match (&config.vgg, &config.lin) {
            (Some(vgg), Some(lin)) => {
                return Ok(Self::PyTorch {
                    vgg: vgg.clone(),
                    lin: lin.clone(),
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!("Both the VGG16 and the linear head checkpoints are required")
            }
            (None, None) => {}
        }

        let record = match &config.record {
            Some(record) => record.clone(),
            None => default_weights_path()
                .context("No cache directory available for the default LPIPS weights")?,
        };
        if !record.is_file() {
            anyhow::bail!(
                "LPIPS weights not found: {} (run lpips_converter first)",
                record.display()
            );
        }
        Ok(Self::Record(record))
    }

    /// Loads the weights into `lpips`.
    pub fn load<B: Backend>(&self, lpips: Lpips<B>, device: &B::Device) -> Result<Lpips<B>> {
        let lpips = match self {
            Self::PyTorch { vgg, lin } => lpips
                .load_pytorch(vgg, lin, device)
                .with_context(|| format!("Failed to load LPIPS checkpoints {}", describe(vgg, lin)))?,
            Self::Record(record) => lpips
                .load_weights(record, device)
                .with_context(|| format!("Failed to load LPIPS record: {}", record.display()))?,
        };
        tracing::info!(source = ?self, "loaded LPIPS weights");
        Ok(lpips)
    }
}

fn describe(vgg: &Path, lin: &Path) -> String {
    format!("{} + {}", vgg.display(), lin.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pytorch_checkpoints_take_precedence() {
        let config = LpipsWeightsConfig {
            record: Some(PathBuf::from("missing.mpk")),
            vgg: Some(PathBuf::from("vgg16.pth")),
            lin: Some(PathBuf::from("vgg.pth")),
            normalize: false,
        };

        assert_eq!(
            LpipsWeights::resolve(&config).unwrap(),
            LpipsWeights::PyTorch {
                vgg: PathBuf::from("vgg16.pth"),
                lin: PathBuf::from("vgg.pth"),
            }
        );
    }

    #[test]
    fn half_a_pytorch_pair_is_an_error() {
        let config = LpipsWeightsConfig {
            vgg: Some(PathBuf::from("vgg16.pth")),
            ..Default::default()
        };

        assert!(LpipsWeights::resolve(&config).is_err());
    }

    #[test]
    fn record_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("lpips_vgg.mpk");
        let config = LpipsWeightsConfig {
            record: Some(record.clone()),
            ..Default::default()
        };

        assert!(LpipsWeights::resolve(&config).is_err());

        std::fs::write(&record, b"").unwrap();
        assert_eq!(
            LpipsWeights::resolve(&config).unwrap(),
            LpipsWeights::Record(record)
        );
    }
}
