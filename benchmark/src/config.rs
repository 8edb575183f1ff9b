//! Configuration for the benchmark binaries.
//!
//! Every field has a default, so a JSON file only needs the keys it
//! overrides. Command line flags are applied on top.

use std::path::PathBuf;

use omnistitch_eval::{EvaluatorConfig, LpipsConfig, PipelineConfig};
use serde::{Deserialize, Serialize};

/// Configuration of a GV360 benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Root directory of the GV360 test set.
    pub data_root: PathBuf,
    /// Directory for predicted frames. None disables saving.
    pub save_root: Option<PathBuf>,
    /// Batch size for the data loader.
    pub batch_size: usize,
    /// Number of decode workers of the data loader.
    pub nr_data_worker: usize,
    /// Number of pyramid levels of the model.
    pub pyr_level: usize,
    /// Skipped pyramid levels. None means `pyr_level - 3`.
    pub nr_lvl_skipped: Option<usize>,
    /// Name of the interpolation model.
    pub model_name: String,
    /// Weights of the interpolation model.
    pub model_file: Option<PathBuf>,
    /// Whether the model loads its pretrained weights.
    pub load_pretrain: bool,
    /// LPIPS network weights.
    pub lpips: LpipsWeightsConfig,
    /// Where to write the JSON report, if anywhere.
    pub report_path: Option<PathBuf>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("datasets/GV360/GV360_testset"),
            save_root: Some(PathBuf::from("./demo/omnistitch/GV360")),
            batch_size: 4,
            nr_data_worker: 1,
            pyr_level: 4,
            nr_lvl_skipped: None,
            model_name: "blend".to_string(),
            model_file: None,
            load_pretrain: true,
            lpips: LpipsWeightsConfig::default(),
            report_path: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_model_name(self.model_name.clone())
            .with_model_file(self.model_file.clone())
            .with_pyr_level(self.pyr_level)
            .with_nr_lvl_skipped(self.nr_lvl_skipped)
            .with_load_pretrain(self.load_pretrain)
    }

    pub fn evaluator(&self) -> EvaluatorConfig {
        EvaluatorConfig::new().with_save_root(self.save_root.clone())
    }
}

/// Where the LPIPS weights come from.
///
/// The PyTorch checkpoints take precedence when both are set; otherwise the
/// Burn record at `record` (or the cache default) is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LpipsWeightsConfig {
    /// Burn MessagePack record written by `lpips_converter`.
    pub record: Option<PathBuf>,
    /// torchvision VGG16 checkpoint.
    pub vgg: Option<PathBuf>,
    /// LPIPS v0.1 linear head checkpoint.
    pub lin: Option<PathBuf>,
    /// Map inputs from `[0, 1]` to `[-1, 1]` before the network.
    pub normalize: bool,
}

impl LpipsWeightsConfig {
    pub fn metric(&self) -> LpipsConfig {
        LpipsConfig::new().with_normalize(self.normalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_script() {
        let config = BenchmarkConfig::default();

        assert_eq!(config.batch_size, 4);
        assert_eq!(config.nr_data_worker, 1);
        assert_eq!(config.pipeline().levels().nr_lvl_skipped, 1);
        assert_eq!(
            config.save_root.as_deref(),
            Some(std::path::Path::new("./demo/omnistitch/GV360"))
        );
        assert!(!config.lpips.normalize);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: BenchmarkConfig = serde_json::from_str(
            r#"{ "batch_size": 2, "save_root": null, "lpips": { "normalize": true } }"#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 2);
        assert_eq!(config.save_root, None);
        assert_eq!(config.pyr_level, 4);
        assert!(config.lpips.normalize);
        assert_eq!(config.evaluator().save_root, None);
    }
}
