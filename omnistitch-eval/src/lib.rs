//! Evaluation of frame interpolation / stitching models on the GV360 test set.
//!
//! The [`Evaluator`] pulls batches of `[N, 9, H, W]` frame triples, runs the
//! interpolation [`Pipeline`] on the two reference frames, and scores every
//! prediction against its ground truth with PSNR, SSIM and LPIPS. Per-sample
//! scores are pooled into a [`RunningAggregate`] whose unweighted means form
//! the final [`EvaluationReport`].

pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod saver;

pub use dataset::*;
pub use error::*;
pub use evaluator::*;
pub use loader::*;
pub use metrics::*;
pub use pipeline::*;
pub use report::*;
pub use saver::*;

#[cfg(test)]
pub(crate) mod tests {
    pub type TestBackend = burn::backend::NdArray;
}
