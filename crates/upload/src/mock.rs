//! In-memory storage backend and recording resume store for session tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use s3up_protocol::{Credentials, PartReceipt, ResumeDescriptor};
use s3up_resume_store::{MemoryStore, ResumeStore, StoreError};

use crate::storage::{ObjectTarget, PartProgress, StorageClient, StorageConnector, StorageError};

/// One request the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Exists(ObjectTarget),
    Create(ObjectTarget),
    UploadPart {
        upload_id: String,
        part_number: u32,
        len: usize,
    },
    ListParts(String),
    Complete {
        upload_id: String,
        parts: Vec<u32>,
    },
    Abort(String),
}

#[derive(Default)]
struct MockState {
    objects: HashSet<(String, String)>,
    uploads: HashMap<String, BTreeMap<u32, String>>,
    next_upload: u32,
    calls: Vec<Call>,
    finished_parts: Vec<u32>,
    exists_error: Option<StorageError>,
    create_error: Option<StorageError>,
    list_error: Option<StorageError>,
    complete_error: Option<StorageError>,
    abort_error: Option<StorageError>,
    part_errors: HashMap<u32, StorageError>,
    part_delays: HashMap<u32, Duration>,
    hanging_parts: HashSet<u32>,
}

/// Object store that keeps uploads in memory and records every call.
#[derive(Default)]
pub(crate) struct MockStorage {
    state: Mutex<MockState>,
}

impl MockStorage {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Part numbers in the order their uploads returned.
    pub fn finished_parts(&self) -> Vec<u32> {
        self.lock().finished_parts.clone()
    }

    pub fn has_object(&self, bucket: &str, key: &str) -> bool {
        self.lock()
            .objects
            .contains(&(bucket.to_string(), key.to_string()))
    }

    pub fn put_object(&self, bucket: &str, key: &str) {
        self.lock()
            .objects
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Creates an open upload already holding `parts`.
    pub fn seed_upload(&self, upload_id: &str, parts: &[u32]) {
        let parts = parts
            .iter()
            .map(|&n| (n, format!("\"server-{n}\"")))
            .collect();
        self.lock().uploads.insert(upload_id.to_string(), parts);
    }

    pub fn fail_exists_check(&self, error: StorageError) {
        self.lock().exists_error = Some(error);
    }

    pub fn fail_create(&self, error: StorageError) {
        self.lock().create_error = Some(error);
    }

    pub fn fail_list(&self, error: StorageError) {
        self.lock().list_error = Some(error);
    }

    pub fn fail_complete(&self, error: StorageError) {
        self.lock().complete_error = Some(error);
    }

    pub fn fail_abort(&self, error: StorageError) {
        self.lock().abort_error = Some(error);
    }

    pub fn fail_part(&self, part_number: u32, error: StorageError) {
        self.lock().part_errors.insert(part_number, error);
    }

    pub fn delay_part(&self, part_number: u32, delay: Duration) {
        self.lock().part_delays.insert(part_number, delay);
    }

    /// Makes uploads of `part_number` never return.
    pub fn hang_part(&self, part_number: u32) {
        self.lock().hanging_parts.insert(part_number);
    }

    pub fn release_part(&self, part_number: u32) {
        self.lock().hanging_parts.remove(&part_number);
    }
}

fn not_found(upload_id: &str) -> StorageError {
    StorageError::UploadNotFound(format!("NoSuchUpload: {upload_id}"))
}

impl StorageClient for MockStorage {
    fn exists_exact<'a>(&'a self, target: &'a ObjectTarget) -> BoxFuture<'a, Result<bool, StorageError>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.calls.push(Call::Exists(target.clone()));
            if let Some(e) = s.exists_error.clone() {
                return Err(e);
            }
            Ok(s.objects
                .contains(&(target.bucket.clone(), target.key.clone())))
        })
    }

    fn create_upload<'a>(&'a self, target: &'a ObjectTarget) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.calls.push(Call::Create(target.clone()));
            if let Some(e) = s.create_error.clone() {
                return Err(e);
            }
            s.next_upload += 1;
            let upload_id = format!("upload-{}", s.next_upload);
            s.uploads.insert(upload_id.clone(), BTreeMap::new());
            Ok(upload_id)
        })
    }

    fn upload_part<'a>(
        &'a self,
        _target: &'a ObjectTarget,
        upload_id: &'a str,
        part_number: u32,
        body: Vec<u8>,
        progress: Option<PartProgress>,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let (delay, hang, error) = {
                let mut s = self.lock();
                s.calls.push(Call::UploadPart {
                    upload_id: upload_id.to_string(),
                    part_number,
                    len: body.len(),
                });
                (
                    s.part_delays.get(&part_number).copied(),
                    s.hanging_parts.contains(&part_number),
                    s.part_errors.get(&part_number).cloned(),
                )
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if hang {
                std::future::pending::<()>().await;
            }
            if let Some(e) = error {
                return Err(e);
            }

            let len = body.len() as u64;
            if let Some(progress) = &progress {
                progress(len / 2);
                progress(len);
            }

            let e_tag = format!("\"etag-{part_number}-{len}\"");
            let mut s = self.lock();
            let parts = s.uploads.get_mut(upload_id).ok_or_else(|| not_found(upload_id))?;
            parts.insert(part_number, e_tag.clone());
            s.finished_parts.push(part_number);
            Ok(e_tag)
        })
    }

    fn list_parts<'a>(
        &'a self,
        _target: &'a ObjectTarget,
        upload_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<PartReceipt>, StorageError>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.calls.push(Call::ListParts(upload_id.to_string()));
            if let Some(e) = s.list_error.clone() {
                return Err(e);
            }
            let parts = s.uploads.get(upload_id).ok_or_else(|| not_found(upload_id))?;
            Ok(parts
                .iter()
                .map(|(&n, e_tag)| PartReceipt::new(n, e_tag.clone()))
                .collect())
        })
    }

    fn complete_upload<'a>(
        &'a self,
        target: &'a ObjectTarget,
        upload_id: &'a str,
        parts: &'a [PartReceipt],
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.calls.push(Call::Complete {
                upload_id: upload_id.to_string(),
                parts: parts.iter().map(|r| r.part_number).collect(),
            });
            if let Some(e) = s.complete_error.clone() {
                return Err(e);
            }
            let stored = s.uploads.remove(upload_id).ok_or_else(|| not_found(upload_id))?;
            for receipt in parts {
                if stored.get(&receipt.part_number) != Some(&receipt.e_tag) {
                    return Err(StorageError::Service(format!(
                        "InvalidPart: {}",
                        receipt.part_number
                    )));
                }
            }
            s.objects
                .insert((target.bucket.clone(), target.key.clone()));
            Ok(())
        })
    }

    fn abort_upload<'a>(
        &'a self,
        _target: &'a ObjectTarget,
        upload_id: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.calls.push(Call::Abort(upload_id.to_string()));
            if let Some(e) = s.abort_error.clone() {
                return Err(e);
            }
            s.uploads.remove(upload_id);
            Ok(())
        })
    }
}

/// Connector that hands out one shared [`MockStorage`].
pub(crate) struct MockConnector {
    storage: Arc<MockStorage>,
    connects: Mutex<Vec<(String, String)>>,
}

impl MockConnector {
    pub fn new(storage: Arc<MockStorage>) -> Self {
        Self {
            storage,
            connects: Mutex::new(Vec::new()),
        }
    }

    /// `(access_key_id, region)` of every connect call.
    pub fn connects(&self) -> Vec<(String, String)> {
        self.connects.lock().unwrap().clone()
    }
}

impl StorageConnector for MockConnector {
    fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Arc<dyn StorageClient>, StorageError> {
        self.connects
            .lock()
            .unwrap()
            .push((credentials.access_key_id.clone(), region.to_string()));
        let client: Arc<dyn StorageClient> = self.storage.clone();
        Ok(client)
    }
}

/// Memory-backed resume store that remembers the part numbers of every save.
#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    saves: Mutex<Vec<Vec<u32>>>,
    fail_after: Mutex<Option<usize>>,
}

impl RecordingStore {
    pub fn saves(&self) -> Vec<Vec<u32>> {
        self.saves.lock().unwrap().clone()
    }

    /// Lets `count` saves through, then fails every later one.
    pub fn fail_after(&self, count: usize) {
        *self.fail_after.lock().unwrap() = Some(count);
    }
}

impl ResumeStore for RecordingStore {
    fn save(&self, descriptor: &ResumeDescriptor) -> Result<(), StoreError> {
        let mut saves = self.saves.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap()
            && saves.len() >= limit
        {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        saves.push(
            descriptor
                .uploaded_parts
                .iter()
                .map(|r| r.part_number)
                .collect(),
        );
        self.inner.save(descriptor)
    }

    fn load(&self) -> Option<ResumeDescriptor> {
        self.inner.load()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear()
    }
}
