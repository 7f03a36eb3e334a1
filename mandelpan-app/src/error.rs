use thiserror::Error;

use mandelpan_core::CoreError;
use mandelpan_render::RenderError;

/// Anything an input command can fail with. None of these are fatal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("line {line}: {reason}")]
    Script { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
