use thiserror::Error;

/// Errors originating from viewport and parameter handling.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },
}
