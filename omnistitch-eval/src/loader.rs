//! Ordered, prefetching batch loader.
//!
//! A producer thread decodes batches ahead of the consumer, spreading the
//! decoding of each batch over a rayon pool of `num_workers` threads. Batches
//! are always delivered in dataset order, which keeps the prediction counter
//! and the saved file names aligned with the sample order.

use std::{
    ops::Range,
    sync::{
        mpsc::{self, Receiver},
        Arc,
    },
    thread::{self, JoinHandle},
};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::backend::Backend,
};
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};

use crate::{
    dataset::{Gv360Dataset, TripletBatch, TripletBatcher, TripletItem},
    error::{EvalError, EvalResult},
};

/// Loads [`Gv360Dataset`] samples in fixed-size, ordered batches.
#[derive(Debug, Clone)]
pub struct TripletLoader {
    dataset: Arc<Gv360Dataset>,
    batch_size: usize,
    num_workers: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl TripletLoader {
    /// Creates a loader. With `num_workers` of zero or one, samples are
    /// decoded on the producer thread.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidInput`] for a zero batch size and
    /// [`EvalError::DatasetError`] when the decode pool cannot be started.
    pub fn new(dataset: Gv360Dataset, batch_size: usize, num_workers: usize) -> EvalResult<Self> {
        if batch_size == 0 {
            return Err(EvalError::InvalidInput {
                reason: "batch size must be at least 1".to_string(),
            });
        }

        let pool = if num_workers > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|index| format!("triplet-decode-{index}"))
                .build()
                .map_err(|e| EvalError::DatasetError {
                    message: format!("failed to start {num_workers} decode workers: {e}"),
                })?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            dataset: Arc::new(dataset),
            batch_size,
            num_workers,
            pool,
        })
    }

    /// Number of batches per pass, the last one possibly short.
    pub fn num_batches(&self) -> usize {
        self.num_samples().div_ceil(self.batch_size)
    }

    /// Number of samples per pass.
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Starts a new pass over the dataset.
    pub fn iter(&self) -> TripletBatchIter {
        let (sender, receiver) = mpsc::sync_channel(self.num_workers.max(1));
        let dataset = Arc::clone(&self.dataset);
        let pool = self.pool.clone();
        let batch_size = self.batch_size;

        let producer = thread::spawn(move || {
            let total = dataset.len();
            for start in (0..total).step_by(batch_size) {
                let end = (start + batch_size).min(total);
                let batch = load_batch(&dataset, start..end, pool.as_deref());
                let failed = batch.is_err();
                if sender.send(batch).is_err() || failed {
                    break;
                }
            }
        });

        TripletBatchIter {
            receiver,
            producer: Some(producer),
        }
    }

    /// Starts a new pass yielding device tensors.
    pub fn batches<'a, B: Backend>(
        &self,
        device: &'a B::Device,
    ) -> impl Iterator<Item = EvalResult<TripletBatch<B>>> + 'a {
        let batcher = TripletBatcher::<B>::new();
        self.iter()
            .map(move |items| items.map(|items| batcher.batch(items, device)))
    }
}

/// Decodes `range` of the dataset, preserving order.
fn load_batch(
    dataset: &Gv360Dataset,
    range: Range<usize>,
    pool: Option<&ThreadPool>,
) -> EvalResult<Vec<TripletItem>> {
    let items = match pool {
        Some(pool) => pool.install(|| {
            range
                .into_par_iter()
                .map(|index| dataset.load(index))
                .collect::<EvalResult<Vec<_>>>()
        })?,
        None => range
            .map(|index| dataset.load(index))
            .collect::<EvalResult<Vec<_>>>()?,
    };

    if let Some(first) = items.first() {
        let size = first.dimensions();
        if let Some(other) = items.iter().find(|item| item.dimensions() != size) {
            return Err(EvalError::InvalidInput {
                reason: format!(
                    "samples of one batch must share a size: {size:?} vs {:?}",
                    other.dimensions()
                ),
            });
        }
    }
    Ok(items)
}

/// Iterator over the decoded batches of one pass.
///
/// Yields an error at most once; the pass ends after it.
pub struct TripletBatchIter {
    receiver: Receiver<EvalResult<Vec<TripletItem>>>,
    producer: Option<JoinHandle<()>>,
}

impl Iterator for TripletBatchIter {
    type Item = EvalResult<Vec<TripletItem>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.receiver.recv() {
            Ok(batch) => Some(batch),
            Err(_) => {
                let producer = self.producer.take()?;
                producer.join().err().map(|_| {
                    Err(EvalError::DatasetError {
                        message: "batch loader thread panicked".to_string(),
                    })
                })
            }
        }
    }
}

impl Drop for TripletBatchIter {
    fn drop(&mut self) {
        // Unblock a producer waiting on a full channel before joining it.
        let (_, receiver) = mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.receiver, receiver));
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
    }
}
