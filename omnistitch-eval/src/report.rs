//! Pooled per-sample scores and their console rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Scores of one prediction, or means over several.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSample {
    pub psnr: f64,
    pub ssim: f64,
    pub lpips: f64,
}

/// Per-sample scores of a run in evaluation order.
///
/// Means are unweighted over samples, so a short last batch counts the
/// same per sample as a full one.
#[derive(Debug, Clone, Default)]
pub struct RunningAggregate {
    psnr: Vec<f64>,
    ssim: Vec<f64>,
    lpips: Vec<f64>,
}

impl RunningAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: MetricSample) {
        self.psnr.push(sample.psnr);
        self.ssim.push(sample.ssim);
        self.lpips.push(sample.lpips);
    }

    pub fn len(&self) -> usize {
        self.psnr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.psnr.is_empty()
    }

    pub fn psnr(&self) -> &[f64] {
        &self.psnr
    }

    pub fn ssim(&self) -> &[f64] {
        &self.ssim
    }

    pub fn lpips(&self) -> &[f64] {
        &self.lpips
    }

    /// Scores of the sample at `index`.
    pub fn get(&self, index: usize) -> Option<MetricSample> {
        Some(MetricSample {
            psnr: *self.psnr.get(index)?,
            ssim: *self.ssim.get(index)?,
            lpips: *self.lpips.get(index)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = MetricSample> + '_ {
        (0..self.len()).filter_map(|index| self.get(index))
    }

    /// Unweighted means over every sample pushed so far.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::EmptyDataset`] when nothing was pushed.
    pub fn mean(&self) -> EvalResult<MetricSample> {
        if self.is_empty() {
            return Err(EvalError::EmptyDataset);
        }
        Ok(MetricSample {
            psnr: mean(&self.psnr),
            ssim: mean(&self.ssim),
            lpips: mean(&self.lpips),
        })
    }

    /// Means over the samples from `start` on.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::EmptyDataset`] when no sample lies at or past `start`.
    pub fn mean_since(&self, start: usize) -> EvalResult<MetricSample> {
        if start >= self.len() {
            return Err(EvalError::EmptyDataset);
        }
        Ok(MetricSample {
            psnr: mean(&self.psnr[start..]),
            ssim: mean(&self.ssim[start..]),
            lpips: mean(&self.lpips[start..]),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Progress line of one batch.
///
/// `index` is zero based and printed as is, next to the means over the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub index: usize,
    pub total: usize,
    pub mean: MetricSample,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch: {}/{}; psnr: {:.4}; ssim: {:.4}; lpips_vgg: {:.4}",
            self.index,
            self.total,
            self.mean.psnr,
            self.mean.ssim,
            self.mean.lpips
        )
    }
}

/// Final result of an evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Number of evaluated samples.
    pub num_samples: usize,
    /// Unweighted means over all samples.
    pub averages: MetricSample,
    /// Scores in evaluation order.
    pub samples: Vec<MetricSample>,
}

impl EvaluationReport {
    pub fn new(aggregate: &RunningAggregate) -> EvalResult<Self> {
        Ok(Self {
            num_samples: aggregate.len(),
            averages: aggregate.mean()?,
            samples: aggregate.iter().collect(),
        })
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "average psnr: {:.4}", self.averages.psnr)?;
        writeln!(f, "average ssim: {:.4}", self.averages.ssim)?;
        write!(f, "average lpips_vgg: {:.4}", self.averages.lpips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(psnr: f64, ssim: f64, lpips: f64) -> MetricSample {
        MetricSample { psnr, ssim, lpips }
    }

    #[test]
    fn empty_aggregate_has_no_mean() {
        let aggregate = RunningAggregate::new();

        assert!(aggregate.is_empty());
        assert!(matches!(aggregate.mean(), Err(EvalError::EmptyDataset)));
        assert!(matches!(
            EvaluationReport::new(&aggregate),
            Err(EvalError::EmptyDataset)
        ));
    }

    #[test]
    fn mean_is_unweighted_over_samples() {
        let mut aggregate = RunningAggregate::new();
        // A batch of three followed by a batch of one.
        for value in [10.0, 20.0, 30.0, 60.0] {
            aggregate.push(sample(value, value / 100.0, value / 1000.0));
        }

        let mean = aggregate.mean().unwrap();
        assert!((mean.psnr - 30.0).abs() < 1e-12);
        assert!((mean.ssim - 0.3).abs() < 1e-12);
        assert!((mean.lpips - 0.03).abs() < 1e-12);

        let tail = aggregate.mean_since(3).unwrap();
        assert!((tail.psnr - 60.0).abs() < 1e-12);
    }

    #[test]
    fn mean_since_covers_only_the_tail() {
        let mut aggregate = RunningAggregate::new();
        for value in [10.0, 20.0, 30.0, 50.0] {
            aggregate.push(sample(value, value / 100.0, value / 1000.0));
        }

        let tail = aggregate.mean_since(2).unwrap();
        assert!((tail.psnr - 40.0).abs() < 1e-12);
        assert!((tail.ssim - 0.4).abs() < 1e-12);
        assert!((tail.lpips - 0.04).abs() < 1e-12);
        assert_eq!(aggregate.mean_since(0).unwrap(), aggregate.mean().unwrap());
        assert!(matches!(aggregate.mean_since(4), Err(EvalError::EmptyDataset)));
        assert!(matches!(aggregate.mean_since(9), Err(EvalError::EmptyDataset)));
    }

    #[test]
    fn infinite_psnr_propagates() {
        let mut aggregate = RunningAggregate::new();
        aggregate.push(sample(f64::INFINITY, 1.0, 0.0));
        aggregate.push(sample(20.0, 0.5, 0.1));

        assert_eq!(aggregate.mean().unwrap().psnr, f64::INFINITY);
    }

    #[test]
    fn batch_line_format() {
        let summary = BatchSummary {
            index: 0,
            total: 3,
            mean: sample(31.234_56, 0.912_345, 0.054_321),
        };

        assert_eq!(
            summary.to_string(),
            "batch: 0/3; psnr: 31.2346; ssim: 0.9123; lpips_vgg: 0.0543"
        );
    }

    #[test]
    fn report_lines_and_samples() {
        let mut aggregate = RunningAggregate::new();
        aggregate.push(sample(30.0, 0.9, 0.1));
        aggregate.push(sample(20.0, 0.7, 0.3));

        let report = EvaluationReport::new(&aggregate).unwrap();

        assert_eq!(report.num_samples, 2);
        assert_eq!(report.samples[1], sample(20.0, 0.7, 0.3));
        assert_eq!(
            report.to_string(),
            "average psnr: 25.0000\naverage ssim: 0.8000\naverage lpips_vgg: 0.2000"
        );
    }
}
