//! Remote object-storage capability consumed by the upload session.
//!
//! The app (or the `s3up-s3` crate) implements these traits on top of a real
//! service client. Keeping them as traits lets the state machine run
//! against in-memory mocks.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use s3up_protocol::{Credentials, PartReceipt};

/// Failures reported by a storage backend.
///
/// Backends map their native errors onto these three classes; the session
/// only ever branches on the class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("upload session not found: {0}")]
    UploadNotFound(String),

    #[error("storage service error: {0}")]
    Service(String),
}

/// Bucket and key an upload writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTarget {
    pub bucket: String,
    pub key: String,
}

impl ObjectTarget {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Callback for bytes of the current part sent so far.
pub type PartProgress = Arc<dyn Fn(u64) + Send + Sync>;

/// Multipart-upload operations of an object store.
pub trait StorageClient: Send + Sync {
    /// Returns `true` only if an object with exactly `target.key` exists.
    ///
    /// Must report a missing list permission as
    /// [`StorageError::PermissionDenied`].
    fn exists_exact<'a>(&'a self, target: &'a ObjectTarget) -> BoxFuture<'a, Result<bool, StorageError>>;

    /// Opens a multipart upload and returns its upload id.
    fn create_upload<'a>(&'a self, target: &'a ObjectTarget) -> BoxFuture<'a, Result<String, StorageError>>;

    /// Uploads one part and returns its ETag.
    fn upload_part<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
        part_number: u32,
        body: Vec<u8>,
        progress: Option<PartProgress>,
    ) -> BoxFuture<'a, Result<String, StorageError>>;

    /// Lists parts the server holds for `upload_id`, ascending.
    ///
    /// Must report an unknown or expired upload as
    /// [`StorageError::UploadNotFound`].
    fn list_parts<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PartReceipt>, StorageError>>;

    /// Commits the upload from an ascending receipt manifest.
    fn complete_upload<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
        parts: &'a [PartReceipt],
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Discards the upload and any parts stored for it.
    fn abort_upload<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>>;
}

/// Builds a [`StorageClient`] from user-supplied credentials.
pub trait StorageConnector: Send + Sync {
    fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Arc<dyn StorageClient>, StorageError>;
}
