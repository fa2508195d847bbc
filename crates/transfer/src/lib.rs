//! Part planning, progress accounting and part reads for multipart uploads.

mod format;
mod planner;
mod progress;
mod source;

pub use format::{format_duration, format_file_size};
pub use planner::{PartDescriptor, PartPlan, plan};
pub use progress::{ProgressCallback, ProgressTracker};
pub use source::SourceFile;

/// Default part size: 100 MiB.
pub const DEFAULT_PART_SIZE: u64 = 100 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
