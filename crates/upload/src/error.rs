//! Upload error types.

use s3up_protocol::UploadState;
use s3up_resume_store::StoreError;
use s3up_transfer::TransferError;

use crate::storage::StorageError;

/// Errors produced by an upload session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no file selected")]
    MissingFile,

    #[error("remote error: {0}")]
    Remote(#[from] StorageError),

    #[error("upload {upload_id} no longer exists on the server")]
    ResumeExpired { upload_id: String },

    #[error(
        "selected file {actual_name} ({actual_size} bytes) does not match interrupted upload of {expected_name} ({expected_size} bytes)"
    )]
    ResumeMismatch {
        expected_name: String,
        expected_size: u64,
        actual_name: String,
        actual_size: u64,
    },

    #[error("no interrupted upload to resume")]
    NoPendingResume,

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: UploadState,
    },

    #[error("parts missing from manifest: {0:?}")]
    IncompleteManifest(Vec<u32>),

    #[error("resume store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(e) => Self::Io(e),
            TransferError::InvalidConfiguration(msg) => Self::InvalidConfiguration(msg),
        }
    }
}

impl UploadError {
    /// One line suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::ResumeExpired { .. } => {
                "The interrupted upload has expired on the server. Please start the upload again."
                    .into()
            }
            Self::Remote(StorageError::PermissionDenied(detail)) => {
                format!("Access denied by the storage service: {detail}")
            }
            Self::MissingFile => "Please select a file to upload.".into(),
            other => {
                let msg = other.to_string();
                let mut chars = msg.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => msg,
                }
            }
        }
    }

    /// `true` when the server no longer knows the upload id.
    pub(crate) fn is_upload_not_found(&self) -> bool {
        matches!(self, Self::Remote(StorageError::UploadNotFound(_)))
    }
}
