//! Shared ONNX Runtime session setup for every model the gate loads.

use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

/// Platform accelerator, if any. ONNX Runtime falls back to the CPU when
/// the provider cannot be registered.
fn platform_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Opens `model_path` with full graph optimization. Models run one frame
/// at a time, so a single inter-op thread is enough.
pub fn open_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    log::debug!(
        "Loading {} ({intra_threads} intra-op threads)",
        model_path.display()
    );
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(platform_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}
