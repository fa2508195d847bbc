use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access key pair used to sign storage requests.
///
/// Credentials are never serialized. A persisted [`ResumeDescriptor`]
/// carries the rest of the config, and the caller supplies credentials
/// again when resuming.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Returns `true` if either half of the pair is missing.
    pub fn is_incomplete(&self) -> bool {
        self.access_key_id.is_empty() || self.secret_access_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Destination and connection settings for one upload.
///
/// Immutable once a session starts; the session works on a normalized copy
/// (see [`UploadConfig::normalized`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    #[serde(skip)]
    pub credentials: Credentials,
    pub region: String,
    pub bucket_name: String,
    /// Object key. Empty means "use the source file name".
    #[serde(default)]
    pub object_name: String,
}

impl UploadConfig {
    pub fn new(
        credentials: Credentials,
        region: impl Into<String>,
        bucket_name: impl Into<String>,
        object_name: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
        }
    }

    /// Strips whitespace from the bucket name and fills in the object key
    /// from `file_name` when none was given.
    pub fn normalized(mut self, file_name: &str) -> Self {
        self.bucket_name = normalize_bucket_name(&self.bucket_name);
        if self.object_name.is_empty() {
            self.object_name = file_name.to_string();
        }
        self
    }

    /// `s3://bucket/key` form of the destination.
    pub fn destination(&self) -> String {
        format!("s3://{}/{}", self.bucket_name, self.object_name)
    }
}

/// Removes every whitespace character from a bucket name.
///
/// Bucket names never legitimately contain whitespace, so stray spaces from
/// copy-paste are cleaned rather than rejected.
pub fn normalize_bucket_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Server-issued acknowledgement for one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartReceipt {
    pub part_number: u32,
    pub e_tag: String,
}

impl PartReceipt {
    pub fn new(part_number: u32, e_tag: impl Into<String>) -> Self {
        Self {
            part_number,
            e_tag: e_tag.into(),
        }
    }
}

/// Everything needed to continue an interrupted upload in a later process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDescriptor {
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub part_size: u64,
    #[serde(default)]
    pub uploaded_parts: Vec<PartReceipt>,
    pub config: UploadConfig,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

impl ResumeDescriptor {
    /// Creates a descriptor with no recorded parts.
    pub fn new(
        upload_id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        part_size: u64,
        config: UploadConfig,
    ) -> Self {
        Self {
            upload_id: upload_id.into(),
            file_name: file_name.into(),
            file_size,
            part_size,
            uploaded_parts: Vec::new(),
            config,
            saved_at: Utc::now(),
        }
    }

    /// Returns `true` if a selected file is the one this descriptor tracks.
    pub fn matches_file(&self, file_name: &str, file_size: u64) -> bool {
        self.file_name == file_name && self.file_size == file_size
    }

    /// Records a receipt, replacing any earlier receipt for the same part.
    ///
    /// Receipts stay sorted by part number.
    pub fn record_receipt(&mut self, receipt: PartReceipt) {
        match self
            .uploaded_parts
            .binary_search_by_key(&receipt.part_number, |r| r.part_number)
        {
            Ok(idx) => self.uploaded_parts[idx] = receipt,
            Err(idx) => self.uploaded_parts.insert(idx, receipt),
        }
    }

    /// Replaces all receipts with an authoritative list.
    pub fn replace_receipts(&mut self, receipts: Vec<PartReceipt>) {
        self.uploaded_parts.clear();
        for receipt in receipts {
            self.record_receipt(receipt);
        }
    }

    /// Returns `true` if a receipt exists for `part_number`.
    pub fn has_part(&self, part_number: u32) -> bool {
        self.uploaded_parts
            .binary_search_by_key(&part_number, |r| r.part_number)
            .is_ok()
    }

    /// Receipts in strictly ascending part order, ready for completion.
    pub fn manifest(&self) -> Vec<PartReceipt> {
        let mut parts = self.uploaded_parts.clone();
        parts.sort_by_key(|r| r.part_number);
        parts.dedup_by_key(|r| r.part_number);
        parts
    }

    /// Refreshes `saved_at`; called right before each save.
    pub fn touch(&mut self) {
        self.saved_at = Utc::now();
    }
}
