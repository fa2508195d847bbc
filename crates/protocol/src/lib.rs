//! Shared data model for resumable multipart uploads.
//!
//! Everything here is plain data: what the resume slot persists and what
//! the upload session reports to a front-end. No I/O happens in this crate.

pub mod events;
pub mod types;

pub use events::{Eta, ProgressEvent, ResumeOffer, UploadEvent, UploadState, UploadSummary};
pub use types::{
    Credentials, PartReceipt, ResumeDescriptor, UploadConfig, normalize_bucket_name,
};

/// Bytes per mebibyte, used for every MB/s figure reported to the user.
pub const MIB: f64 = 1024.0 * 1024.0;
