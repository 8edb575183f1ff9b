//! Backend selection for the benchmark binaries.
//!
//! The backend is fixed at compile time by the `cuda`, `wgpu` and `ndarray`
//! features, in that order of precedence. Metrics, LPIPS weights and the
//! interpolation pipeline all run on [`EvalBackend`].

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        use burn::backend::cuda::{Cuda, CudaDevice};

        /// Backend the evaluation runs on.
        pub type EvalBackend = Cuda;
        pub type EvalDevice = CudaDevice;

        /// Shown in the startup log of the binaries.
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";

        /// First CUDA device; predictions are copied back to the host only for saving.
        pub fn eval_device() -> EvalDevice {
            CudaDevice::default()
        }
    } else if #[cfg(feature = "wgpu")] {
        use burn::backend::wgpu::{Wgpu, WgpuDevice};

        /// Backend the evaluation runs on.
        pub type EvalBackend = Wgpu;
        pub type EvalDevice = WgpuDevice;

        /// Shown in the startup log of the binaries.
        pub const BACKEND_NAME: &str = "WGPU (GPU)";

        /// Default adapter picked by wgpu.
        pub fn eval_device() -> EvalDevice {
            WgpuDevice::default()
        }
    } else {
        use burn::backend::ndarray::{NdArray, NdArrayDevice};

        /// Backend the evaluation runs on.
        pub type EvalBackend = NdArray;
        pub type EvalDevice = NdArrayDevice;

        /// Shown in the startup log of the binaries.
        pub const BACKEND_NAME: &str = "NdArray (CPU)";

        /// The CPU. Slow for full GV360 runs, fine for smoke tests.
        pub fn eval_device() -> EvalDevice {
            NdArrayDevice::default()
        }
    }
}
