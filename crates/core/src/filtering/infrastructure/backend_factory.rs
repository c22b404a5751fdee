use std::sync::Arc;

use crate::filtering::domain::image_filter_backend::ImageFilterBackend;

use super::cpu_filter_backend::CpuFilterBackend;
use super::gpu_context::GpuContext;
use super::gpu_filter_backend::GpuFilterBackend;

/// Creates the best available filter backend.
///
/// With `prefer_gpu` set, looks for a wgpu adapter and returns the GPU
/// backend when one is found; otherwise the CPU implementation. Logs which
/// backend is selected.
pub fn create_backend(prefer_gpu: bool) -> Box<dyn ImageFilterBackend> {
    if prefer_gpu {
        if let Some(ctx) = GpuContext::new() {
            log::info!("Using GPU filter backend");
            return Box::new(GpuFilterBackend::new(
                Arc::new(ctx),
                CpuFilterBackend::default(),
            ));
        }
        log::info!("No GPU available, using CPU filter backend");
    } else {
        log::info!("Using CPU filter backend");
    }
    Box::new(CpuFilterBackend::default())
}
