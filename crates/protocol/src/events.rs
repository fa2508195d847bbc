//! Events an upload session reports to its front-end.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Checking,
    AwaitingOverwriteDecision,
    ResumePending,
    ResumeVerifying,
    Uploading,
    Completing,
    Aborting,
    Done,
    Failed,
}

impl UploadState {
    /// `Done` and `Failed` end a session; a new upload re-arms from `Idle`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::AwaitingOverwriteDecision => "awaiting overwrite decision",
            Self::ResumePending => "resume pending",
            Self::ResumeVerifying => "verifying resume",
            Self::Uploading => "uploading",
            Self::Completing => "completing",
            Self::Aborting => "aborting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Estimated time remaining.
///
/// Serializes as a number of seconds, or the string `"unknown"` when no
/// throughput has been measured yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    Seconds(f64),
    Unknown,
}

impl Eta {
    pub fn seconds(self) -> Option<f64> {
        match self {
            Self::Seconds(s) => Some(s),
            Self::Unknown => None,
        }
    }
}

impl Serialize for Eta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Seconds(s) => serializer.serialize_f64(*s),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// Progress snapshot for a progress bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// 0–100.
    pub percent: f64,
    pub status_message: String,
    pub throughput_mbs: f64,
    pub eta_seconds: Eta,
}

/// Offer to continue a previously interrupted upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeOffer {
    pub file_name: String,
    pub file_size: u64,
    /// Estimate from the locally recorded receipts; the server's part list
    /// is consulted again before anything is uploaded.
    pub percent_already_done: f64,
}

/// Final report of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub destination: String,
    pub file_name: String,
    pub file_size: u64,
    pub elapsed_seconds: f64,
    pub avg_throughput_mbs: f64,
}

/// Event emitted by an upload session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum UploadEvent {
    StateChanged(UploadState),
    Progress(ProgressEvent),
    /// The target key already exists; the session waits for confirm/cancel.
    AwaitingOverwrite { bucket: String, key: String },
    ResumeOffered(ResumeOffer),
    Succeeded(UploadSummary),
    Failed { reason: String },
}
