//! Runners for the omnistitch evaluation library.
//!
//! ## Binaries
//!
//! - `benchmark_gv360`: PSNR / SSIM / LPIPS benchmark on the GV360 test set
//! - `lpips_converter`: convert the PyTorch LPIPS checkpoints to a Burn record
//!
//! ## Usage
//!
//! ```bash
//! # Convert the LPIPS weights once
//! cargo run --bin lpips_converter -- vgg16-397923af.pth vgg.pth
//!
//! # Run the benchmark
//! cargo run --release --bin benchmark_gv360 -- --data-root datasets/GV360/GV360_testset
//!
//! # Select a GPU backend
//! cargo run --release --no-default-features --features wgpu --bin benchmark_gv360
//! ```

pub mod backend;
pub mod config;
pub mod logging;
pub mod weights;

pub use backend::{eval_device, EvalBackend, EvalDevice, BACKEND_NAME};
pub use config::{BenchmarkConfig, LpipsWeightsConfig};
pub use logging::init_tracing;
pub use weights::LpipsWeights;
