//! Prints session events as terminal lines.

use s3up_protocol::{ProgressEvent, UploadEvent, UploadSummary};
use s3up_transfer::{format_duration, format_file_size};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Prints events until the session drops its sender.
pub fn spawn(mut events: UnboundedReceiver<UploadEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_line = String::new();
        while let Some(event) = events.recv().await {
            match event {
                UploadEvent::Progress(progress) => {
                    let line = progress_line(&progress);
                    if line != last_line {
                        eprintln!("{line}");
                        last_line = line;
                    }
                }
                UploadEvent::StateChanged(state) => tracing::debug!(state = %state, "session state"),
                // Answered by the command's prompts.
                UploadEvent::AwaitingOverwrite { .. } | UploadEvent::ResumeOffered(_) => {}
                UploadEvent::Succeeded(summary) => eprintln!("{}", summary_line(&summary)),
                UploadEvent::Failed { reason } => eprintln!("Upload failed: {reason}"),
            }
        }
    })
}

pub fn progress_line(progress: &ProgressEvent) -> String {
    let mut line = format!("[{:5.1}%] {}", progress.percent, progress.status_message);
    if progress.throughput_mbs > 0.0 {
        line.push_str(&format!("  {:.2} MB/s", progress.throughput_mbs));
    }
    if let Some(eta) = progress.eta_seconds.seconds() {
        line.push_str(&format!("  ETA {}", format_duration(eta)));
    }
    line
}

pub fn summary_line(summary: &UploadSummary) -> String {
    format!(
        "Uploaded {} ({}) to {} in {} ({:.2} MB/s)",
        summary.file_name,
        format_file_size(summary.file_size),
        summary.destination,
        format_duration(summary.elapsed_seconds),
        summary.avg_throughput_mbs
    )
}
