use thiserror::Error;

/// Errors originating from the rendering pipeline and export.
///
/// A cancelled render is not an error; see [`crate::RenderOutcome`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid raster dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("export rejected for {name:?}: {reason}")]
    ExportRejected { name: String, reason: String },

    #[error("nothing to export: no render has completed yet")]
    NothingToExport,

    #[error("render thread is not running")]
    WorkerGone,

    #[error("failed to build render thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Png(#[from] png::EncodingError),

    #[error(transparent)]
    Core(#[from] mandelpan_core::CoreError),
}
