//! The evaluation loop.
//!
//! Batches are processed strictly in arrival order and samples in index
//! order. Every evaluated sample advances the prediction counter by one,
//! whether or not predictions are saved, so saved files are numbered
//! `pred_0 .. pred_{N-1}` in dataset order.

use std::{marker::PhantomData, path::PathBuf};

use burn::{prelude::*, tensor::backend::Backend};

use crate::{
    dataset::{TripletBatch, TRIPLET_CHANNELS},
    error::{EvalError, EvalResult},
    loader::TripletLoader,
    metrics::{ensure_same_shape, psnr, PerceptualMetric, Ssim, SsimConfig},
    pipeline::{Interpolator, Pipeline},
    report::{BatchSummary, EvaluationReport, MetricSample, RunningAggregate},
    saver::PredictionSaver,
};

/// Largest raw pixel value of the input frames.
const PIXEL_MAX: f64 = 255.0;

/// Configuration of an evaluation run.
#[derive(Config, Debug)]
pub struct EvaluatorConfig {
    /// Directory for predicted frames; nothing is saved when unset.
    pub save_root: Option<PathBuf>,
    /// SSIM settings.
    #[config(default = "SsimConfig::new()")]
    pub ssim: SsimConfig,
}

impl EvaluatorConfig {
    /// Creates the evaluator, preparing the output directory if one is set.
    pub fn init<B: Backend, P: PerceptualMetric<B>>(
        &self,
        perceptual: P,
    ) -> EvalResult<Evaluator<B, P>> {
        Ok(Evaluator {
            ssim: self.ssim.init(),
            perceptual,
            saver: PredictionSaver::from_option(self.save_root.as_deref())?,
            sample_count: 0,
            aggregate: RunningAggregate::new(),
            _backend: PhantomData,
        })
    }
}

/// Scores predictions of one run.
pub struct Evaluator<B: Backend, P> {
    ssim: Ssim,
    perceptual: P,
    saver: PredictionSaver,
    sample_count: usize,
    aggregate: RunningAggregate,
    _backend: PhantomData<B>,
}

impl<B: Backend, P: PerceptualMetric<B>> Evaluator<B, P> {
    /// Evaluates every batch and prints the progress and summary lines.
    ///
    /// `total` is the batch count shown in the progress lines.
    ///
    /// # Errors
    ///
    /// The first failing batch aborts the run. A run without any sample
    /// fails with [`EvalError::EmptyDataset`].
    pub fn evaluate<M, I>(
        &mut self,
        pipeline: &Pipeline<M>,
        batches: I,
        total: usize,
    ) -> EvalResult<EvaluationReport>
    where
        M: Interpolator<B>,
        I: IntoIterator<Item = EvalResult<TripletBatch<B>>>,
    {
        for (index, batch) in batches.into_iter().enumerate() {
            let mean = self.evaluate_batch(pipeline, batch?)?;
            println!("{}", BatchSummary { index, total, mean });
        }

        if self.aggregate.is_empty() {
            return Err(EvalError::EmptyDataset);
        }
        let report = EvaluationReport::new(&self.aggregate)?;
        println!("{report}");
        Ok(report)
    }

    /// Scores one `[N, 9, H, W]` batch of raw pixels and returns its means.
    pub fn evaluate_batch<M: Interpolator<B>>(
        &mut self,
        pipeline: &Pipeline<M>,
        batch: TripletBatch<B>,
    ) -> EvalResult<MetricSample> {
        let [batch_size, channels, height, width] = batch.frames.dims();
        if channels != TRIPLET_CHANNELS || batch_size == 0 {
            return Err(EvalError::InvalidInput {
                reason: format!(
                    "expected a non-empty [N, {TRIPLET_CHANNELS}, H, W] batch, got {:?}",
                    batch.frames.dims()
                ),
            });
        }

        let frames = batch.frames.div_scalar(PIXEL_MAX);
        let img0 = frames.clone().narrow(1, 0, 3);
        let img1 = frames.clone().narrow(1, 3, 3);
        let gt = frames.narrow(1, 6, 3);

        let pred = pipeline.inference(img0, img1)?;
        ensure_same_shape(&gt.dims(), &pred.dims())?;

        let start = self.aggregate.len();
        for j in 0..batch_size {
            let this_gt = gt.clone().narrow(0, j, 1);
            let this_pred = pred.clone().narrow(0, j, 1);

            self.saver
                .save(self.sample_count, this_pred.clone().reshape([3, height, width]))?;

            let sample = MetricSample {
                ssim: self.ssim.compute(this_pred.clone(), this_gt.clone())?,
                psnr: psnr(this_gt.clone(), this_pred.clone())?,
                lpips: self.perceptual.distance(this_gt, this_pred)?,
            };
            tracing::debug!(
                sample = self.sample_count,
                psnr = sample.psnr,
                ssim = sample.ssim,
                lpips = sample.lpips,
                "evaluated sample"
            );

            self.aggregate.push(sample);
            self.sample_count += 1;
        }

        self.aggregate.mean_since(start)
    }

    /// Samples evaluated so far; also the index of the next saved prediction.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn aggregate(&self) -> &RunningAggregate {
        &self.aggregate
    }

    pub fn saver(&self) -> &PredictionSaver {
        &self.saver
    }
}

/// Runs a full evaluation of `pipeline` over `loader`.
///
/// # Errors
///
/// Fails up front on an empty dataset, and otherwise as [`Evaluator::evaluate`].
pub fn evaluate<B, M, P>(
    pipeline: &Pipeline<M>,
    loader: &TripletLoader,
    perceptual: P,
    config: &EvaluatorConfig,
    device: &B::Device,
) -> EvalResult<EvaluationReport>
where
    B: Backend,
    M: Interpolator<B>,
    P: PerceptualMetric<B>,
{
    if loader.num_samples() == 0 {
        return Err(EvalError::EmptyDataset);
    }

    let mut evaluator = config.init::<B, P>(perceptual)?;
    tracing::info!(
        samples = loader.num_samples(),
        batches = loader.num_batches(),
        batch_size = loader.batch_size(),
        "starting evaluation"
    );

    let report = evaluator.evaluate(pipeline, loader.batches::<B>(device), loader.num_batches())?;
    tracing::info!(samples = evaluator.sample_count(), "evaluation finished");
    Ok(report)
}
