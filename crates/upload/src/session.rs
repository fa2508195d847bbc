//! Upload session: one file, one destination, one state machine.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use s3up_protocol::{
    Credentials, Eta, MIB, PartReceipt, ProgressEvent, ResumeDescriptor, ResumeOffer, UploadConfig,
    UploadEvent, UploadState, UploadSummary,
};
use s3up_resume_store::ResumeStore;
use s3up_transfer::{
    PartDescriptor, PartPlan, ProgressTracker, SourceFile, format_duration, format_file_size, plan,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::UploadError;
use crate::storage::{ObjectTarget, PartProgress, StorageClient, StorageConnector, StorageError};
use crate::types::{StartOutcome, UploadOptions};

/// A validated upload bound to a connected client.
struct Prepared {
    config: UploadConfig,
    target: ObjectTarget,
    client: Arc<dyn StorageClient>,
    source: SourceFile,
}

#[derive(Clone)]
struct EventSink(mpsc::UnboundedSender<UploadEvent>);

impl EventSink {
    fn emit(&self, event: UploadEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.0.send(event);
    }
}

/// Drives a single multipart upload from validation to completion.
///
/// All receipt and checkpoint bookkeeping happens on the task that awaits
/// the session's methods; only the part transfers themselves overlap.
pub struct UploadSession {
    connector: Arc<dyn StorageConnector>,
    store: Arc<dyn ResumeStore>,
    options: UploadOptions,
    state: UploadState,
    events: EventSink,
    events_rx: Option<mpsc::UnboundedReceiver<UploadEvent>>,
    awaiting_overwrite: Option<Prepared>,
    pending_resume: Option<ResumeDescriptor>,
}

impl UploadSession {
    pub fn new(
        connector: Arc<dyn StorageConnector>,
        store: Arc<dyn ResumeStore>,
        options: UploadOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            connector,
            store,
            options,
            state: UploadState::Idle,
            events: EventSink(tx),
            events_rx: Some(rx),
            awaiting_overwrite: None,
            pending_resume: None,
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Looks for an interrupted upload in the resume store.
    ///
    /// On success the session moves to `ResumePending` and emits
    /// `ResumeOffered`. A descriptor that cannot describe a valid upload is
    /// cleared and not offered.
    pub fn check_pending_resume(&mut self) -> Option<ResumeOffer> {
        if !self.is_ready() {
            return None;
        }

        let Some(descriptor) = self.store.load() else {
            self.pending_resume = None;
            return None;
        };

        let Some(offer) = resume_offer(&descriptor) else {
            warn!(
                upload_id = %descriptor.upload_id,
                file_size = descriptor.file_size,
                part_size = descriptor.part_size,
                "discarding unusable resume descriptor"
            );
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "failed to clear resume descriptor");
            }
            self.pending_resume = None;
            return None;
        };

        info!(
            upload_id = %descriptor.upload_id,
            file = %descriptor.file_name,
            parts = descriptor.uploaded_parts.len(),
            "found interrupted upload"
        );
        self.pending_resume = Some(descriptor);
        self.offer_resume(offer.clone());
        Some(offer)
    }

    /// Starts a fresh upload of `file` to `config`'s destination.
    ///
    /// Returns [`StartOutcome::AwaitingOverwrite`] if the key already
    /// exists, and [`StartOutcome::ResumeAvailable`] if `file` matches the
    /// interrupted upload found by [`check_pending_resume`](Self::check_pending_resume).
    /// Any other file is refused with [`UploadError::ResumeMismatch`] while
    /// that upload is pending; [`decline_resume`](Self::decline_resume)
    /// releases the slot for a fresh upload.
    pub async fn start(
        &mut self,
        config: UploadConfig,
        file: Option<SourceFile>,
    ) -> Result<StartOutcome, UploadError> {
        self.ensure_ready("start an upload")?;
        self.awaiting_overwrite = None;

        let Some(source) = file else {
            return Err(self.fail(UploadError::MissingFile));
        };
        if let Err(e) = self.validate_source(&source) {
            return Err(self.fail(e));
        }

        if let Some(descriptor) = &self.pending_resume {
            if !descriptor.matches_file(source.name(), source.size()) {
                warn!(
                    upload_id = %descriptor.upload_id,
                    pending = %descriptor.file_name,
                    file = %source.name(),
                    "selected file does not match interrupted upload"
                );
                return Err(mismatch(descriptor, &source));
            }
            if let Some(offer) = resume_offer(descriptor) {
                info!(file = %source.name(), "selected file matches interrupted upload");
                self.offer_resume(offer.clone());
                return Ok(StartOutcome::ResumeAvailable(offer));
            }
        }

        let prepared = match self.prepare(config, source) {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(e)),
        };

        self.set_state(UploadState::Checking);
        self.status(0.0, "Checking if object exists...");

        match prepared.client.exists_exact(&prepared.target).await {
            Ok(true) => {
                info!(object = %prepared.target, "object already exists");
                self.set_state(UploadState::AwaitingOverwriteDecision);
                self.events.emit(UploadEvent::AwaitingOverwrite {
                    bucket: prepared.target.bucket.clone(),
                    key: prepared.target.key.clone(),
                });
                self.awaiting_overwrite = Some(prepared);
                return Ok(StartOutcome::AwaitingOverwrite);
            }
            Ok(false) => debug!(object = %prepared.target, "object does not exist"),
            Err(StorageError::PermissionDenied(detail)) => {
                warn!(
                    object = %prepared.target,
                    detail = %detail,
                    "cannot check for existing object; it will be overwritten"
                );
                self.status(0.0, "No ListBucket permission - will overwrite if exists");
                tokio::time::sleep(self.options.permission_warning_delay).await;
            }
            Err(e) => return Err(self.fail(e.into())),
        }

        self.upload_fresh(prepared).await.map(StartOutcome::Completed)
    }

    /// Overwrites the existing object after [`StartOutcome::AwaitingOverwrite`].
    pub async fn confirm_overwrite(&mut self) -> Result<UploadSummary, UploadError> {
        let prepared = self.take_awaiting("confirm an overwrite")?;
        info!(object = %prepared.target, "overwrite confirmed");
        self.upload_fresh(prepared).await
    }

    /// Abandons the upload after [`StartOutcome::AwaitingOverwrite`]. No
    /// server-side upload exists yet, so nothing needs cleaning up.
    pub fn cancel_overwrite(&mut self) -> Result<(), UploadError> {
        let prepared = self.take_awaiting("cancel an overwrite")?;
        info!(object = %prepared.target, "overwrite declined");
        self.status(0.0, "Upload cancelled");
        if self.pending_resume.is_some() {
            self.set_state(UploadState::ResumePending);
        } else {
            self.set_state(UploadState::Idle);
        }
        Ok(())
    }

    /// Continues the interrupted upload with the re-selected `file`.
    ///
    /// The server's part list is authoritative: local receipts are replaced
    /// by it before any part is sent, and only parts the server does not
    /// hold are uploaded.
    pub async fn resume(
        &mut self,
        file: SourceFile,
        credentials: Credentials,
    ) -> Result<UploadSummary, UploadError> {
        let Some(descriptor) = self.pending_resume.clone() else {
            return Err(UploadError::NoPendingResume);
        };

        if !descriptor.matches_file(file.name(), file.size()) {
            return Err(mismatch(&descriptor, &file));
        }

        let mut config = descriptor.config.clone();
        config.credentials = credentials;
        let prepared = self.prepare(config, file)?;
        let plan = plan(descriptor.file_size, descriptor.part_size)?;

        self.pending_resume = None;
        self.set_state(UploadState::ResumeVerifying);
        self.status(0.0, "Verifying uploaded parts...");

        let upload_id = descriptor.upload_id.clone();
        let server_parts = match prepared.client.list_parts(&prepared.target, &upload_id).await {
            Ok(parts) => parts,
            Err(StorageError::UploadNotFound(_)) => return Err(self.expire(&upload_id)),
            Err(e) => return Err(self.fail(e.into())),
        };

        let local_parts = descriptor.uploaded_parts.len();
        let (known, stray): (Vec<PartReceipt>, Vec<PartReceipt>) = server_parts
            .into_iter()
            .partition(|r| plan.get(r.part_number).is_some());
        if !stray.is_empty() {
            warn!(
                upload_id = %upload_id,
                parts = ?stray.iter().map(|r| r.part_number).collect::<Vec<_>>(),
                "ignoring server parts outside the plan"
            );
        }

        let mut descriptor = descriptor;
        descriptor.replace_receipts(known);
        info!(
            upload_id = %upload_id,
            local_parts,
            server_parts = descriptor.uploaded_parts.len(),
            total_parts = plan.len(),
            "reconciled parts with server"
        );

        let confirmed = plan.bytes_for(descriptor.uploaded_parts.iter().map(|r| r.part_number));
        self.set_state(UploadState::Uploading);
        let tracker = self.tracker(descriptor.file_size, confirmed);
        tracker.status(&format!(
            "Resuming upload: {} of {} parts already uploaded",
            descriptor.uploaded_parts.len(),
            plan.len()
        ));

        let result = self.run(&prepared, &mut descriptor, &plan, &tracker).await;
        self.finish(&prepared, &descriptor, &tracker, result, true).await
    }

    /// Forgets the interrupted upload.
    pub fn decline_resume(&mut self) -> Result<(), UploadError> {
        let Some(descriptor) = self.pending_resume.take() else {
            return Err(UploadError::NoPendingResume);
        };
        self.store.clear()?;
        info!(upload_id = %descriptor.upload_id, "discarded interrupted upload");
        self.set_state(UploadState::Idle);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.state.is_terminal()
            || matches!(self.state, UploadState::Idle | UploadState::ResumePending)
    }

    fn ensure_ready(&self, operation: &'static str) -> Result<(), UploadError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(UploadError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn take_awaiting(&mut self, operation: &'static str) -> Result<Prepared, UploadError> {
        let invalid = UploadError::InvalidState {
            operation,
            state: self.state,
        };
        if self.state != UploadState::AwaitingOverwriteDecision {
            return Err(invalid);
        }
        self.awaiting_overwrite.take().ok_or(invalid)
    }

    fn validate_source(&self, source: &SourceFile) -> Result<(), UploadError> {
        if source.size() == 0 {
            return Err(UploadError::InvalidConfiguration(format!(
                "{} is empty",
                source.name()
            )));
        }
        if self.options.part_size == 0 {
            return Err(UploadError::InvalidConfiguration(
                "part size must be greater than zero".into(),
            ));
        }
        if self.options.concurrency == 0 {
            return Err(UploadError::InvalidConfiguration(
                "concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Normalizes `config` and connects a client for it.
    fn prepare(&self, config: UploadConfig, source: SourceFile) -> Result<Prepared, UploadError> {
        let config = config.normalized(source.name());
        validate_config(&config)?;

        let client = self
            .connector
            .connect(&config.credentials, &config.region)?;
        let target = ObjectTarget::new(&config.bucket_name, &config.object_name);
        Ok(Prepared {
            config,
            target,
            client,
            source,
        })
    }

    async fn upload_fresh(&mut self, prepared: Prepared) -> Result<UploadSummary, UploadError> {
        let size = prepared.source.size();
        let plan = match plan(size, self.options.part_size) {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(e.into())),
        };

        // The first checkpoint below takes over the single resume slot.
        self.pending_resume = None;
        self.set_state(UploadState::Uploading);
        let tracker = self.tracker(size, 0);
        tracker.status("Creating multipart upload...");

        let upload_id = match prepared.client.create_upload(&prepared.target).await {
            Ok(id) => id,
            Err(e) => return Err(self.fail(e.into())),
        };
        info!(
            upload_id = %upload_id,
            object = %prepared.target,
            size = %format_file_size(size),
            parts = plan.len(),
            "created multipart upload"
        );

        let mut descriptor = ResumeDescriptor::new(
            upload_id,
            prepared.source.name(),
            size,
            plan.part_size(),
            prepared.config.clone(),
        );
        let result = self.run(&prepared, &mut descriptor, &plan, &tracker).await;
        self.finish(&prepared, &descriptor, &tracker, result, false).await
    }

    /// Checkpoints, sends the missing parts, then completes.
    async fn run(
        &mut self,
        prepared: &Prepared,
        descriptor: &mut ResumeDescriptor,
        plan: &PartPlan,
        tracker: &Arc<ProgressTracker>,
    ) -> Result<(), UploadError> {
        checkpoint(self.store.as_ref(), descriptor)?;
        upload_parts(
            prepared,
            descriptor,
            plan,
            tracker,
            self.store.as_ref(),
            self.options.concurrency,
        )
        .await?;

        self.set_state(UploadState::Completing);
        tracker.status("Completing multipart upload...");

        let missing: Vec<u32> = plan
            .parts()
            .iter()
            .map(|p| p.part_number)
            .filter(|n| !descriptor.has_part(*n))
            .collect();
        if !missing.is_empty() {
            return Err(UploadError::IncompleteManifest(missing));
        }

        let manifest = descriptor.manifest();
        prepared
            .client
            .complete_upload(&prepared.target, &descriptor.upload_id, &manifest)
            .await?;
        Ok(())
    }

    async fn finish(
        &mut self,
        prepared: &Prepared,
        descriptor: &ResumeDescriptor,
        tracker: &ProgressTracker,
        result: Result<(), UploadError>,
        resumed: bool,
    ) -> Result<UploadSummary, UploadError> {
        match result {
            Ok(()) => {
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "failed to clear resume descriptor");
                }

                let elapsed = tracker.elapsed().as_secs_f64();
                let summary = UploadSummary {
                    destination: prepared.config.destination(),
                    file_name: descriptor.file_name.clone(),
                    file_size: descriptor.file_size,
                    elapsed_seconds: elapsed,
                    avg_throughput_mbs: tracker.throughput() / MIB,
                };
                tracker.status("Upload completed successfully!");
                info!(
                    destination = %summary.destination,
                    size = %format_file_size(summary.file_size),
                    elapsed = %format_duration(elapsed),
                    throughput_mbs = summary.avg_throughput_mbs,
                    "upload completed"
                );

                self.set_state(UploadState::Done);
                self.events.emit(UploadEvent::Succeeded(summary.clone()));
                Ok(summary)
            }
            Err(e) if resumed && e.is_upload_not_found() => Err(self.expire(&descriptor.upload_id)),
            Err(e) => Err(self.abort(prepared, &descriptor.upload_id, e).await),
        }
    }

    /// Aborts the server-side upload once, best-effort, and fails with `err`.
    ///
    /// The resume descriptor is left in place; if the abort went through, a
    /// later resume attempt finds the upload gone and clears it.
    async fn abort(&mut self, prepared: &Prepared, upload_id: &str, err: UploadError) -> UploadError {
        warn!(upload_id = %upload_id, error = %err, "upload failed, aborting multipart upload");
        self.set_state(UploadState::Aborting);
        match prepared.client.abort_upload(&prepared.target, upload_id).await {
            Ok(()) => info!(upload_id = %upload_id, "aborted multipart upload"),
            Err(e) => warn!(upload_id = %upload_id, error = %e, "failed to abort multipart upload"),
        }
        self.fail(err)
    }

    /// The server no longer knows `upload_id`: drop the descriptor, no abort.
    fn expire(&mut self, upload_id: &str) -> UploadError {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear expired resume descriptor");
        }
        self.pending_resume = None;
        self.fail(UploadError::ResumeExpired {
            upload_id: upload_id.to_string(),
        })
    }

    fn fail(&mut self, err: UploadError) -> UploadError {
        error!(error = %err, state = %self.state, "upload failed");
        self.set_state(UploadState::Failed);
        self.events.emit(UploadEvent::Failed {
            reason: err.user_message(),
        });
        err
    }

    fn offer_resume(&mut self, offer: ResumeOffer) {
        self.set_state(UploadState::ResumePending);
        self.events.emit(UploadEvent::ResumeOffered(offer));
    }

    fn set_state(&mut self, state: UploadState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "upload state changed");
        self.state = state;
        self.events.emit(UploadEvent::StateChanged(state));
    }

    /// Status line for phases that have no byte counts yet.
    fn status(&self, percent: f64, message: &str) {
        self.events.emit(UploadEvent::Progress(ProgressEvent {
            percent,
            status_message: message.to_string(),
            throughput_mbs: 0.0,
            eta_seconds: Eta::Unknown,
        }));
    }

    fn tracker(&self, file_size: u64, already_confirmed: u64) -> Arc<ProgressTracker> {
        let events = self.events.clone();
        Arc::new(ProgressTracker::resumed(
            file_size,
            already_confirmed,
            Box::new(move |progress| events.emit(UploadEvent::Progress(progress))),
        ))
    }
}

fn mismatch(descriptor: &ResumeDescriptor, file: &SourceFile) -> UploadError {
    UploadError::ResumeMismatch {
        expected_name: descriptor.file_name.clone(),
        expected_size: descriptor.file_size,
        actual_name: file.name().to_string(),
        actual_size: file.size(),
    }
}

fn validate_config(config: &UploadConfig) -> Result<(), UploadError> {
    if config.credentials.is_incomplete() {
        return Err(UploadError::InvalidConfiguration(
            "access key id and secret access key are required".into(),
        ));
    }
    if config.region.trim().is_empty() {
        return Err(UploadError::InvalidConfiguration("region is required".into()));
    }
    if config.bucket_name.is_empty() {
        return Err(UploadError::InvalidConfiguration("bucket name is required".into()));
    }
    if config.object_name.is_empty() {
        return Err(UploadError::InvalidConfiguration("object name is required".into()));
    }
    Ok(())
}

/// Builds the offer for `descriptor`, or `None` if it cannot be planned.
fn resume_offer(descriptor: &ResumeDescriptor) -> Option<ResumeOffer> {
    let plan = plan(descriptor.file_size, descriptor.part_size).ok()?;
    if plan.is_empty() {
        return None;
    }
    let done = plan.bytes_for(descriptor.uploaded_parts.iter().map(|r| r.part_number));
    Some(ResumeOffer {
        file_name: descriptor.file_name.clone(),
        file_size: descriptor.file_size,
        percent_already_done: (done as f64 / descriptor.file_size as f64 * 100.0).clamp(0.0, 100.0),
    })
}

fn checkpoint(store: &dyn ResumeStore, descriptor: &mut ResumeDescriptor) -> Result<(), UploadError> {
    descriptor.touch();
    store.save(descriptor)?;
    Ok(())
}

/// Sends every planned part without a receipt, at most `concurrency` at a time.
///
/// Each receipt is recorded and checkpointed before its bytes count as
/// confirmed. The first failure drops the remaining in-flight parts.
async fn upload_parts(
    prepared: &Prepared,
    descriptor: &mut ResumeDescriptor,
    plan: &PartPlan,
    tracker: &Arc<ProgressTracker>,
    store: &dyn ResumeStore,
    concurrency: usize,
) -> Result<(), UploadError> {
    let upload_id = descriptor.upload_id.clone();
    let total = plan.len();
    let mut queue = plan
        .parts()
        .iter()
        .filter(|p| !descriptor.has_part(p.part_number))
        .copied()
        .collect::<Vec<_>>()
        .into_iter();

    let mut in_flight = FuturesUnordered::new();
    loop {
        while in_flight.len() < concurrency {
            let Some(part) = queue.next() else { break };
            in_flight.push(send_part(prepared, &upload_id, part, Arc::clone(tracker), total));
        }

        let Some(result) = in_flight.next().await else {
            break;
        };
        let (part, receipt) = result?;

        descriptor.record_receipt(receipt);
        checkpoint(store, descriptor)?;
        tracker.record_part_complete(
            part.part_number,
            part.len(),
            &format!("Uploaded part {}/{}", part.part_number, total),
        );
        debug!(part = part.part_number, total, "part confirmed");
    }
    Ok(())
}

async fn send_part(
    prepared: &Prepared,
    upload_id: &str,
    part: PartDescriptor,
    tracker: Arc<ProgressTracker>,
    total: usize,
) -> Result<(PartDescriptor, PartReceipt), UploadError> {
    let body = prepared.source.read_part(&part).await?;

    let number = part.part_number;
    let message = format!("Uploading part {number}/{total}...");
    tracker.record_part_progress(number, 0, &message);
    let progress: PartProgress = Arc::new(move |sent| {
        tracker.record_part_progress(number, sent, &message);
    });

    let e_tag = prepared
        .client
        .upload_part(&prepared.target, upload_id, number, body, Some(progress))
        .await?;
    debug!(part = number, e_tag = %e_tag, "uploaded part");
    Ok((part, PartReceipt::new(number, e_tag)))
}
