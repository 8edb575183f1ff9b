//! GV360 Benchmark
//!
//! Scores an interpolation model on the GV360 test set with PSNR, SSIM and
//! LPIPS (VGG), printing one line per batch and the final averages.
//!
//! ## Usage
//!
//! ```bash
//! # Benchmark with the default settings
//! cargo run --release --bin benchmark_gv360 -- --data-root datasets/GV360/GV360_testset
//!
//! # Skip saving predictions and write a JSON report
//! cargo run --release --bin benchmark_gv360 -- --no-save --report gv360.json
//!
//! # Use the PyTorch LPIPS checkpoints directly
//! cargo run --release --bin benchmark_gv360 -- --lpips-vgg vgg16.pth --lpips-lin vgg.pth
//! ```

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use omnistitch_benchmark::{
    eval_device, init_tracing, BenchmarkConfig, EvalBackend, LpipsWeights, BACKEND_NAME,
};
use omnistitch_eval::{evaluate, Gv360Dataset, TripletLoader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory of the GV360 test set
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Directory for predicted frames (cleared before the run)
    #[arg(long)]
    save_root: Option<PathBuf>,

    /// Do not save predicted frames
    #[arg(long, conflicts_with = "save_root")]
    no_save: bool,

    /// Batch size for the data loader
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of decode workers for the data loader
    #[arg(long)]
    nr_data_worker: Option<usize>,

    /// Number of pyramid levels of the model
    #[arg(long)]
    pyr_level: Option<usize>,

    /// Number of skipped pyramid levels (default: pyr_level - 3)
    #[arg(long)]
    nr_lvl_skipped: Option<usize>,

    /// Name of the interpolation model
    #[arg(long)]
    model_name: Option<String>,

    /// Weights of the interpolation model
    #[arg(long)]
    model_file: Option<PathBuf>,

    /// Burn record with the LPIPS weights
    #[arg(long)]
    lpips_weights: Option<PathBuf>,

    /// torchvision VGG16 checkpoint for LPIPS
    #[arg(long, requires = "lpips_lin")]
    lpips_vgg: Option<PathBuf>,

    /// LPIPS v0.1 linear head checkpoint
    #[arg(long, requires = "lpips_vgg")]
    lpips_lin: Option<PathBuf>,

    /// Map LPIPS inputs to [-1, 1]
    #[arg(long)]
    lpips_normalize: bool,

    /// Write the per-sample scores and averages as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<BenchmarkConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        BenchmarkConfig::default()
    };
    apply_overrides(&mut config, args);

    if !config.data_root.is_dir() {
        anyhow::bail!("Data root does not exist: {}", config.data_root.display());
    }

    let device = eval_device();
    tracing::info!(backend = BACKEND_NAME, "using backend");

    let pipeline = config
        .pipeline()
        .init()
        .context("Failed to create the inference pipeline")?;

    let weights = LpipsWeights::resolve(&config.lpips)?;
    let lpips = weights.load(config.lpips.metric().init::<EvalBackend>(&device), &device)?;

    let dataset = Gv360Dataset::new(&config.data_root)
        .with_context(|| format!("Failed to open dataset: {}", config.data_root.display()))?;
    let loader = TripletLoader::new(dataset, config.batch_size, config.nr_data_worker)?;

    println!("Omnistitch benchmarking on GV360 testset...");
    let report = evaluate::<EvalBackend, _, _>(
        &pipeline,
        &loader,
        lpips,
        &config.evaluator(),
        &device,
    )
    .context("Benchmark failed")?;

    if let Some(report_path) = &config.report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(report_path, json)
            .with_context(|| format!("Failed to write report: {}", report_path.display()))?;
        tracing::info!(path = %report_path.display(), "report written");
    }

    println!("{}", config.data_root.display());
    println!("{}", config.model_name);
    Ok(())
}

/// Applies command line flags on top of the loaded configuration.
fn apply_overrides(config: &mut BenchmarkConfig, args: Args) {
    if let Some(data_root) = args.data_root {
        config.data_root = data_root;
    }
    if args.no_save {
        config.save_root = None;
    } else if let Some(save_root) = args.save_root {
        config.save_root = Some(save_root);
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(nr_data_worker) = args.nr_data_worker {
        config.nr_data_worker = nr_data_worker;
    }
    if let Some(pyr_level) = args.pyr_level {
        config.pyr_level = pyr_level;
    }
    if args.nr_lvl_skipped.is_some() {
        config.nr_lvl_skipped = args.nr_lvl_skipped;
    }
    if let Some(model_name) = args.model_name {
        config.model_name = model_name;
    }
    if args.model_file.is_some() {
        config.model_file = args.model_file;
    }
    if args.lpips_weights.is_some() {
        config.lpips.record = args.lpips_weights;
    }
    if args.lpips_vgg.is_some() {
        config.lpips.vgg = args.lpips_vgg;
        config.lpips.lin = args.lpips_lin;
    }
    config.lpips.normalize |= args.lpips_normalize;
    if args.report.is_some() {
        config.report_path = args.report;
    }
}
