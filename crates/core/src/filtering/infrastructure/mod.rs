pub mod backend_factory;
pub mod cpu_filter_backend;
mod gaussian;
pub mod gpu_context;
pub mod gpu_filter_backend;
