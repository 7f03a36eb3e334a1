pub mod buffer;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod history;
pub mod scheduler;

pub use buffer::RasterBuffer;
pub use coordinator::{run, RenderCancel, RenderOutcome, RenderRequest};
pub use error::RenderError;
pub use export::{export_entry, export_png, validate_file_name, ExportMetadata};
pub use history::{History, HistoryEntry};
pub use scheduler::{RenderScheduler, SchedulerConfig, SchedulerEvent, SchedulerPhase};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
