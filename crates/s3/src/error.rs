use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use s3up_upload::StorageError;

/// Maps an SDK failure onto the session's error classes.
pub fn classify<E>(operation: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map(str::to_owned);
    let status = err.raw_response().map(|r| r.status().as_u16());
    let detail = match (code.as_deref(), err.message()) {
        (Some(code), Some(message)) => format!("{operation}: {code}: {message}"),
        (Some(code), None) => format!("{operation}: {code}"),
        (None, _) => format!("{operation}: {}", DisplayErrorContext(&err)),
    };
    tracing::debug!(operation, code = ?code, status = ?status, "S3 request failed");
    classify_code(code.as_deref(), status, detail)
}

/// `AccessDenied`/`Forbidden` (or a bare 403) is a permission problem and
/// `NoSuchUpload` means the upload id is gone; everything else is a
/// service error.
fn classify_code(code: Option<&str>, status: Option<u16>, detail: String) -> StorageError {
    match code {
        Some("AccessDenied" | "Forbidden") => StorageError::PermissionDenied(detail),
        Some("NoSuchUpload") => StorageError::UploadNotFound(detail),
        None if status == Some(403) => StorageError::PermissionDenied(detail),
        _ => StorageError::Service(detail),
    }
}
