//! LPIPS Weight Converter
//!
//! Converts the torchvision VGG16 checkpoint and the LPIPS v0.1 linear head
//! checkpoint into a single Burn record that `benchmark_gv360` loads by default.
//!
//! ## Usage
//!
//! ```bash
//! # Write to the default cache location
//! cargo run --bin lpips_converter -- vgg16-397923af.pth vgg.pth
//!
//! # Write to a custom path
//! cargo run --bin lpips_converter -- vgg16-397923af.pth vgg.pth --output lpips_vgg.mpk
//! ```

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use omnistitch_benchmark::{eval_device, init_tracing, EvalBackend, LpipsWeights};
use omnistitch_eval::{default_weights_path, LpipsConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// torchvision VGG16 checkpoint (.pth file)
    vgg: PathBuf,

    /// LPIPS v0.1 linear head checkpoint (.pth file)
    lin: PathBuf,

    /// Output Burn record (default: cache directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite output file
    #[arg(long)]
    force: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    for input in [&args.vgg, &args.lin] {
        if !input.is_file() {
            anyhow::bail!("Input checkpoint does not exist: {}", input.display());
        }
    }

    let output = match args.output {
        Some(output) => output,
        None => default_weights_path().context("No cache directory available")?,
    };
    if output.exists() && !args.force {
        anyhow::bail!(
            "Output file already exists: {} (use --force to overwrite)",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let device = eval_device();
    let weights = LpipsWeights::PyTorch {
        vgg: args.vgg,
        lin: args.lin,
    };
    let lpips = weights.load(LpipsConfig::new().init::<EvalBackend>(&device), &device)?;

    lpips
        .save_weights(&output)
        .with_context(|| format!("Failed to save weights: {}", output.display()))?;

    println!("Saved LPIPS weights to {}", output.display());
    Ok(())
}
