//! GV360 test set.
//!
//! Every sample is a directory holding the two reference frames and the
//! ground truth (`img0.png`, `img1.png`, `gt.png`). Samples are discovered
//! recursively below the data root and ordered by path, so the dataset order
//! is stable across runs.

use std::path::{Path, PathBuf};

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Tensor, TensorData},
};
use image::RgbImage;
use walkdir::WalkDir;

use crate::error::{EvalError, EvalResult};

/// File names of the frames of one sample: reference A, reference B, ground truth.
pub const FRAME_NAMES: [&str; 3] = ["img0.png", "img1.png", "gt.png"];

/// Channels of a stacked triple.
pub const TRIPLET_CHANNELS: usize = 9;

/// One decoded sample.
#[derive(Debug, Clone)]
pub struct TripletItem {
    /// First reference frame.
    pub img0: RgbImage,
    /// Second reference frame.
    pub img1: RgbImage,
    /// Ground truth.
    pub gt: RgbImage,
}

impl TripletItem {
    /// Builds a triple, rejecting frames of different sizes.
    pub fn new(img0: RgbImage, img1: RgbImage, gt: RgbImage) -> EvalResult<Self> {
        let dims = [img0.dimensions(), img1.dimensions(), gt.dimensions()];
        if dims.iter().any(|&d| d != dims[0]) {
            return Err(EvalError::InvalidInput {
                reason: format!("frame sizes differ within a sample: {dims:?}"),
            });
        }
        Ok(Self { img0, img1, gt })
    }

    /// `(width, height)` shared by the three frames.
    pub fn dimensions(&self) -> (u32, u32) {
        self.gt.dimensions()
    }
}

/// A batch of stacked triples.
#[derive(Debug, Clone)]
pub struct TripletBatch<B: Backend> {
    /// Raw pixel values in `[0, 255]` with shape `[N, 9, H, W]`.
    pub frames: Tensor<B, 4>,
}

impl<B: Backend> TripletBatch<B> {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.frames.dims()[0]
    }

    /// Whether the batch holds no sample.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stacks [`TripletItem`]s into a [`TripletBatch`].
///
/// # Panics
///
/// Panics if the items do not share one size; the loader checks this first.
#[derive(Clone, Default)]
pub struct TripletBatcher<B: Backend> {
    _phantom: std::marker::PhantomData<B>,
}

impl<B: Backend> TripletBatcher<B> {
    /// Create a new triplet batcher.
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Batcher<B, TripletItem, TripletBatch<B>> for TripletBatcher<B> {
    fn batch(&self, items: Vec<TripletItem>, device: &B::Device) -> TripletBatch<B> {
        let batch_size = items.len();
        let (width, height) = items.first().map_or((0, 0), TripletItem::dimensions);
        let (width, height) = (width as usize, height as usize);

        let mut data = Vec::with_capacity(batch_size * TRIPLET_CHANNELS * height * width);
        for item in &items {
            for frame in [&item.img0, &item.img1, &item.gt] {
                push_chw(frame, &mut data);
            }
        }

        let data = TensorData::new(data, [batch_size, TRIPLET_CHANNELS, height, width]);
        TripletBatch {
            frames: Tensor::from_data(data, device),
        }
    }
}

/// Appends an HWC RGB image to `out` in CHW order.
fn push_chw(image: &RgbImage, out: &mut Vec<f32>) {
    for channel in 0..3 {
        out.extend(image.pixels().map(|pixel| f32::from(pixel[channel])));
    }
}

/// GV360 dataset rooted at a directory.
#[derive(Debug, Clone)]
pub struct Gv360Dataset {
    samples: Vec<PathBuf>,
}

impl Gv360Dataset {
    /// Discover all samples below `data_root`.
    ///
    /// # Errors
    ///
    /// Fails if the root is missing, cannot be walked, or holds no complete sample.
    pub fn new(data_root: impl AsRef<Path>) -> EvalResult<Self> {
        let data_root = data_root.as_ref();
        if !data_root.is_dir() {
            return Err(EvalError::DatasetError {
                message: format!("Data root does not exist: {}", data_root.display()),
            });
        }

        let mut samples = Vec::new();
        for entry in WalkDir::new(data_root).sort_by_file_name() {
            let entry = entry.map_err(|e| EvalError::DatasetError {
                message: format!("Failed to read directory entry: {e}"),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = entry.path();
            let present = FRAME_NAMES
                .iter()
                .filter(|name| dir.join(name).is_file())
                .count();
            match present {
                0 => {}
                3 => samples.push(dir.to_path_buf()),
                _ => tracing::warn!(sample = %dir.display(), "skipping incomplete sample"),
            }
        }

        if samples.is_empty() {
            return Err(EvalError::DatasetError {
                message: format!("No complete samples found in {}", data_root.display()),
            });
        }
        samples.sort();

        tracing::info!(
            samples = samples.len(),
            root = %data_root.display(),
            "discovered GV360 samples"
        );
        Ok(Self { samples })
    }

    /// Directory of the sample at `index`.
    pub fn sample_dir(&self, index: usize) -> Option<&Path> {
        self.samples.get(index).map(PathBuf::as_path)
    }

    /// Decode the sample at `index`.
    pub fn load(&self, index: usize) -> EvalResult<TripletItem> {
        let dir = self.sample_dir(index).ok_or_else(|| EvalError::DatasetError {
            message: format!("Sample index {index} out of range ({})", self.samples.len()),
        })?;

        let [img0, img1, gt] = FRAME_NAMES.map(|name| load_rgb(&dir.join(name)));
        TripletItem::new(img0?, img1?, gt?)
    }
}

fn load_rgb(path: &Path) -> EvalResult<RgbImage> {
    image::open(path)
        .map(|image| image.to_rgb8())
        .map_err(|source| EvalError::Image {
            path: path.to_path_buf(),
            source,
        })
}

impl Dataset<TripletItem> for Gv360Dataset {
    fn get(&self, index: usize) -> Option<TripletItem> {
        self.load(index).ok()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;

    use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::tests::TestBackend;

    /// Writes a sample whose three frames are filled with `values`.
    pub(crate) fn write_sample(dir: &Path, size: (u32, u32), values: [u8; 3]) {
        std::fs::create_dir_all(dir).unwrap();
        for (name, value) in FRAME_NAMES.iter().zip(values) {
            RgbImage::from_pixel(size.0, size.1, Rgb([value, value, value]))
                .save(dir.join(name))
                .unwrap();
        }
    }

    #[test]
    fn discovers_samples_in_path_order() {
        let root = tempfile::tempdir().unwrap();
        write_sample(&root.path().join("b"), (4, 4), [1, 2, 3]);
        write_sample(&root.path().join("a"), (4, 4), [4, 5, 6]);
        write_sample(&root.path().join("c").join("nested"), (4, 4), [7, 8, 9]);

        let dataset = Gv360Dataset::new(root.path()).unwrap();

        assert_eq!(dataset.len(), 3);
        assert!(dataset.sample_dir(0).unwrap().ends_with("a"));
        assert!(dataset.sample_dir(1).unwrap().ends_with("b"));
        assert!(dataset.sample_dir(2).unwrap().ends_with("nested"));
        assert_eq!(dataset.load(0).unwrap().img0.get_pixel(0, 0), &Rgb([4, 4, 4]));
    }

    #[test]
    fn incomplete_samples_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_sample(&root.path().join("full"), (4, 4), [1, 2, 3]);
        let partial = root.path().join("partial");
        std::fs::create_dir_all(&partial).unwrap();
        RgbImage::new(4, 4).save(partial.join("gt.png")).unwrap();

        let dataset = Gv360Dataset::new(root.path()).unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn empty_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            Gv360Dataset::new(root.path()),
            Err(EvalError::DatasetError { .. })
        ));
        assert!(Gv360Dataset::new(root.path().join("missing")).is_err());
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("sample");
        write_sample(&dir, (4, 4), [1, 2, 3]);
        RgbImage::new(8, 4).save(dir.join("gt.png")).unwrap();

        let dataset = Gv360Dataset::new(root.path()).unwrap();
        assert!(matches!(
            dataset.load(0),
            Err(EvalError::InvalidInput { .. })
        ));
        assert!(dataset.get(0).is_none());
    }

    #[test]
    fn batcher_stacks_channels_in_frame_order() {
        let device = Default::default();
        let item = |values: [u8; 3]| {
            let [a, b, c] = values.map(|v| RgbImage::from_pixel(3, 2, Rgb([v, v, v])));
            TripletItem::new(a, b, c).unwrap()
        };

        let batch = TripletBatcher::<TestBackend>::new()
            .batch(vec![item([10, 20, 30]), item([40, 50, 60])], &device);

        assert_eq!(batch.frames.dims(), [2, 9, 2, 3]);
        assert_eq!(batch.len(), 2);

        let values = batch.frames.to_data().to_vec::<f32>().unwrap();
        let plane = 2 * 3;
        assert_eq!(values[0], 10.0);
        assert_eq!(values[3 * plane], 20.0);
        assert_eq!(values[6 * plane], 30.0);
        assert_eq!(values[9 * plane], 40.0);
        assert_eq!(values[17 * plane], 60.0);
    }
}
