//! Amazon S3 backend for the upload session.
//!
//! Wraps `aws_sdk_s3::Client` behind [`StorageClient`] and maps service
//! error codes onto [`StorageError`] classes.

mod error;

use std::sync::Arc;

use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials as AwsCredentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use futures_util::future::BoxFuture;
use s3up_protocol::{Credentials, PartReceipt};
use s3up_upload::{ObjectTarget, PartProgress, StorageClient, StorageConnector, StorageError};
use tracing::debug;

pub use error::classify;

/// Builds S3 clients from static credentials.
#[derive(Debug, Default, Clone)]
pub struct S3Connector;

impl S3Connector {
    pub fn new() -> Self {
        Self
    }
}

impl StorageConnector for S3Connector {
    fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Arc<dyn StorageClient>, StorageError> {
        let provider = AwsCredentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None,
            None,
            "s3up",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(provider)
            .build();

        debug!(region, access_key_id = %credentials.access_key_id, "configured S3 client");
        let client: Arc<dyn StorageClient> = Arc::new(S3Storage::new(Client::from_conf(config)));
        Ok(client)
    }
}

/// [`StorageClient`] over the S3 multipart-upload API.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn part_number_param(part_number: u32) -> Result<i32, StorageError> {
    i32::try_from(part_number)
        .map_err(|_| StorageError::Service(format!("part number {part_number} out of range")))
}

impl StorageClient for S3Storage {
    fn exists_exact<'a>(&'a self, target: &'a ObjectTarget) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move {
            // A prefix listing needs only s3:ListBucket. With one key
            // returned, an exact match sorts first if it exists.
            let out = self
                .client
                .list_objects_v2()
                .bucket(&target.bucket)
                .prefix(&target.key)
                .max_keys(1)
                .send()
                .await
                .map_err(|e| classify("ListObjectsV2", e))?;

            let exists = out
                .contents()
                .iter()
                .any(|o| o.key() == Some(target.key.as_str()));
            debug!(object = %target, exists, "checked for existing object");
            Ok(exists)
        })
    }

    fn create_upload<'a>(&'a self, target: &'a ObjectTarget) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let out = self
                .client
                .create_multipart_upload()
                .bucket(&target.bucket)
                .key(&target.key)
                .send()
                .await
                .map_err(|e| classify("CreateMultipartUpload", e))?;

            out.upload_id()
                .map(str::to_owned)
                .ok_or_else(|| StorageError::Service("CreateMultipartUpload returned no upload id".into()))
        })
    }

    fn upload_part<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
        part_number: u32,
        body: Vec<u8>,
        progress: Option<PartProgress>,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let len = body.len() as u64;
            let out = self
                .client
                .upload_part()
                .bucket(&target.bucket)
                .key(&target.key)
                .upload_id(upload_id)
                .part_number(part_number_param(part_number)?)
                .content_length(len as i64)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| classify("UploadPart", e))?;

            // The SDK reports nothing while the body is in flight.
            if let Some(progress) = &progress {
                progress(len);
            }

            out.e_tag()
                .map(str::to_owned)
                .ok_or_else(|| StorageError::Service(format!("UploadPart {part_number} returned no ETag")))
        })
    }

    fn list_parts<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PartReceipt>, StorageError>> {
        Box::pin(async move {
            let mut receipts = Vec::new();
            let mut marker: Option<String> = None;

            loop {
                let out = self
                    .client
                    .list_parts()
                    .bucket(&target.bucket)
                    .key(&target.key)
                    .upload_id(upload_id)
                    .set_part_number_marker(marker.take())
                    .send()
                    .await
                    .map_err(|e| classify("ListParts", e))?;

                for part in out.parts() {
                    let number = part.part_number().and_then(|n| u32::try_from(n).ok());
                    if let (Some(number), Some(e_tag)) = (number, part.e_tag()) {
                        receipts.push(PartReceipt::new(number, e_tag));
                    }
                }

                if out.is_truncated() != Some(true) {
                    break;
                }
                match out.next_part_number_marker() {
                    Some(next) => marker = Some(next.to_string()),
                    None => break,
                }
            }

            receipts.sort_by_key(|r| r.part_number);
            debug!(upload_id, parts = receipts.len(), "listed uploaded parts");
            Ok(receipts)
        })
    }

    fn complete_upload<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
        parts: &'a [PartReceipt],
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let completed = parts
                .iter()
                .map(|r| {
                    Ok(CompletedPart::builder()
                        .part_number(part_number_param(r.part_number)?)
                        .e_tag(&r.e_tag)
                        .build())
                })
                .collect::<Result<Vec<_>, StorageError>>()?;

            self.client
                .complete_multipart_upload()
                .bucket(&target.bucket)
                .key(&target.key)
                .upload_id(upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(completed))
                        .build(),
                )
                .send()
                .await
                .map_err(|e| classify("CompleteMultipartUpload", e))?;
            Ok(())
        })
    }

    fn abort_upload<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.client
                .abort_multipart_upload()
                .bucket(&target.bucket)
                .key(&target.key)
                .upload_id(upload_id)
                .send()
                .await
                .map_err(|e| classify("AbortMultipartUpload", e))?;
            Ok(())
        })
    }
}
