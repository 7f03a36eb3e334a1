pub mod complex;
pub mod error;
pub mod kernel;
pub mod viewport;

// Re-export primary types for convenience.
pub use complex::Complex;
pub use error::CoreError;
pub use kernel::{color, escape_time, iterations_at, shade_row, BYTES_PER_PIXEL};
pub use viewport::{parse_max_iterations, Viewport};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
