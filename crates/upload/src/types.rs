//! Session options and outcomes.

use std::time::Duration;

use s3up_protocol::{ResumeOffer, UploadSummary};
use s3up_transfer::DEFAULT_PART_SIZE;

/// Pause after warning that the overwrite check could not run.
pub const PERMISSION_WARNING_DELAY: Duration = Duration::from_secs(1);

/// Tunables for an [`UploadSession`](crate::UploadSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Bytes per part for fresh uploads. Resumes use the recorded size.
    pub part_size: u64,
    /// Maximum parts in flight.
    pub concurrency: usize,
    pub permission_warning_delay: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: 1,
            permission_warning_delay: PERMISSION_WARNING_DELAY,
        }
    }
}

/// What [`UploadSession::start`](crate::UploadSession::start) ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// The object was uploaded.
    Completed(UploadSummary),
    /// The key already exists; call `confirm_overwrite` or `cancel_overwrite`.
    AwaitingOverwrite,
    /// The selected file matches an interrupted upload; call `resume` or
    /// `decline_resume`.
    ResumeAvailable(ResumeOffer),
}
