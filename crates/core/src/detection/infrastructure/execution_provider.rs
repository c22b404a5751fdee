use ort::execution_providers::ExecutionProviderDispatch;

/// ONNX execution providers to register, most preferred first.
///
/// With `accelerated` set, the platform provider (CoreML on macOS, DirectML
/// on Windows) is requested; ort falls back to CPU when it fails to load.
/// An empty list means CPU only.
pub fn execution_providers(accelerated: bool) -> Vec<ExecutionProviderDispatch> {
    if !accelerated {
        log::debug!("ONNX inference pinned to CPU");
        return Vec::new();
    }
    platform_providers()
}

#[cfg(target_os = "macos")]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    log::debug!("requesting CoreML execution provider");
    vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
}

#[cfg(target_os = "windows")]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    log::debug!("requesting DirectML execution provider");
    vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_providers() -> Vec<ExecutionProviderDispatch> {
    Vec::new()
}
