//! Resumable multipart upload of one local file to an object store.
//!
//! This crate implements the upload **state machine**. It has no UI or
//! transport dependencies: the front-end supplies a [`StorageConnector`]
//! for the remote service and a [`ResumeStore`](s3up_resume_store::ResumeStore)
//! for the local checkpoint, and observes progress through
//! [`UploadSession::take_events`].
//!
//! # Pipeline
//!
//! 1. **Validate**: file present and non-empty, part size positive
//! 2. **Check**: look up the target key; ask before overwriting
//! 3. **Create**: open a server-side multipart upload, checkpoint it
//! 4. **Upload**: send parts, checkpointing after every receipt
//! 5. **Complete**: commit the ascending receipt manifest, clear the checkpoint
//!
//! Any failure after step 3 aborts the server-side upload once, best-effort,
//! and surfaces the error that caused it.

pub mod error;
pub mod session;
pub mod storage;
pub mod types;

#[cfg(test)]
mod mock;

pub use error::UploadError;
pub use session::UploadSession;
pub use storage::{ObjectTarget, PartProgress, StorageClient, StorageConnector, StorageError};
pub use types::{StartOutcome, UploadOptions};
