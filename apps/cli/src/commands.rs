//! Subcommand handlers.

use std::sync::Arc;

use anyhow::Context as _;
use s3up_protocol::{Credentials, ResumeDescriptor, UploadConfig};
use s3up_resume_store::{JsonFileStore, ResumeStore};
use s3up_s3::S3Connector;
use s3up_transfer::{SourceFile, format_file_size, plan};
use s3up_upload::{StartOutcome, UploadError, UploadOptions, UploadSession};
use tokio::task::JoinHandle;

use crate::cli::{ResumeArgs, UploadArgs};
use crate::config::CliConfig;
use crate::{prompt, render};

pub struct Context {
    pub config: CliConfig,
    pub store: Arc<JsonFileStore>,
}

fn new_session(ctx: &Context, options: UploadOptions) -> (UploadSession, Option<JoinHandle<()>>) {
    let mut session = UploadSession::new(Arc::new(S3Connector::new()), ctx.store.clone(), options);
    let renderer = session.take_events().map(render::spawn);
    (session, renderer)
}

/// Drops the session so the renderer sees the channel close, then waits
/// for it to print everything.
async fn finish(session: UploadSession, renderer: Option<JoinHandle<()>>) {
    drop(session);
    if let Some(renderer) = renderer {
        let _ = renderer.await;
    }
}

async fn open(path: &std::path::Path) -> anyhow::Result<SourceFile> {
    SourceFile::open(path)
        .await
        .with_context(|| format!("cannot open {}", path.display()))
}

pub async fn upload(ctx: &Context, args: UploadArgs) -> anyhow::Result<()> {
    let credentials = ctx.config.credentials(
        args.credentials.access_key_id,
        args.credentials.secret_access_key,
    );
    let options = ctx.config.upload_options(args.part_size_mb, args.concurrency);
    let config = UploadConfig::new(
        credentials.clone(),
        args.region.unwrap_or_else(|| ctx.config.region.clone()),
        args.bucket.unwrap_or_else(|| ctx.config.bucket.clone()),
        args.key.unwrap_or_default(),
    );
    let file = open(&args.file).await?;

    let (mut session, renderer) = new_session(ctx, options);
    session.check_pending_resume();
    let result = run_upload(&mut session, config, file, credentials, args.yes).await;
    finish(session, renderer).await;
    result
}

async fn run_upload(
    session: &mut UploadSession,
    config: UploadConfig,
    file: SourceFile,
    credentials: Credentials,
    assume_yes: bool,
) -> anyhow::Result<()> {
    loop {
        let outcome = match session.start(config.clone(), Some(file.clone())).await {
            Ok(outcome) => outcome,
            Err(UploadError::ResumeMismatch {
                expected_name,
                expected_size,
                ..
            }) => {
                let question = discard_question(&expected_name, expected_size, file.name());
                if assume_yes || prompt::confirm(question, false).await? {
                    session.decline_resume()?;
                    continue;
                }
                eprintln!("Keeping the interrupted upload. Run `s3up resume {expected_name}` to finish it.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        match outcome {
            StartOutcome::Completed(_) => return Ok(()),
            StartOutcome::AwaitingOverwrite => {
                let target = config.clone().normalized(file.name());
                let question = format!(
                    "Object \"{}\" already exists in bucket \"{}\". Overwrite?",
                    target.object_name, target.bucket_name
                );
                if assume_yes || prompt::confirm(question, false).await? {
                    session.confirm_overwrite().await?;
                } else {
                    session.cancel_overwrite()?;
                    eprintln!("Upload cancelled.");
                }
                return Ok(());
            }
            StartOutcome::ResumeAvailable(offer) => {
                let question = format!(
                    "An interrupted upload of {} ({}) is {:.0}% done. Resume it?",
                    offer.file_name,
                    format_file_size(offer.file_size),
                    offer.percent_already_done
                );
                if assume_yes || prompt::confirm(question, true).await? {
                    session.resume(file, credentials).await?;
                    return Ok(());
                }
                // Nothing is pending after this, so the next start uploads fresh.
                session.decline_resume()?;
            }
        }
    }
}

fn discard_question(pending_name: &str, pending_size: u64, file_name: &str) -> String {
    format!(
        "An interrupted upload of {} ({}) is pending. Discard it and upload {} instead?",
        pending_name,
        format_file_size(pending_size),
        file_name
    )
}

pub async fn resume(ctx: &Context, args: ResumeArgs) -> anyhow::Result<()> {
    let credentials = ctx.config.credentials(
        args.credentials.access_key_id,
        args.credentials.secret_access_key,
    );
    let options = ctx.config.upload_options(None, args.concurrency);
    let file = open(&args.file).await?;

    let (mut session, renderer) = new_session(ctx, options);
    let result: anyhow::Result<()> = async {
        session
            .check_pending_resume()
            .context("no interrupted upload to resume")?;
        session.resume(file, credentials).await?;
        Ok(())
    }
    .await;
    finish(session, renderer).await;
    result
}

pub fn status(ctx: &Context) -> anyhow::Result<()> {
    match ctx.store.load() {
        Some(descriptor) => println!("{}", describe(&descriptor)),
        None => println!("No interrupted upload."),
    }
    Ok(())
}

pub fn discard(ctx: &Context) -> anyhow::Result<()> {
    let Some(descriptor) = ctx.store.load() else {
        println!("No interrupted upload.");
        return Ok(());
    };
    ctx.store.clear()?;
    tracing::info!(upload_id = %descriptor.upload_id, "discarded interrupted upload");
    println!("Discarded interrupted upload of {}.", descriptor.file_name);
    Ok(())
}

fn describe(descriptor: &ResumeDescriptor) -> String {
    let parts = match plan(descriptor.file_size, descriptor.part_size) {
        Ok(plan) => {
            let done = plan.bytes_for(descriptor.uploaded_parts.iter().map(|r| r.part_number));
            format!(
                "{} of {} parts ({} of {})",
                descriptor.uploaded_parts.len(),
                plan.len(),
                format_file_size(done),
                format_file_size(descriptor.file_size)
            )
        }
        Err(_) => format!("{} parts", descriptor.uploaded_parts.len()),
    };

    format!(
        "Interrupted upload of {}\n  destination: {} ({})\n  uploaded:    {}\n  upload id:   {}\n  saved at:    {}",
        descriptor.file_name,
        descriptor.config.destination(),
        descriptor.config.region,
        parts,
        descriptor.upload_id,
        descriptor.saved_at.to_rfc3339(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3up_protocol::PartReceipt;

    #[test]
    fn describes_pending_upload() {
        let config = UploadConfig::new(Credentials::default(), "eu-west-1", "media", "big.iso");
        let mut descriptor =
            ResumeDescriptor::new("upload-1", "big.iso", 300 * 1024 * 1024, 100 * 1024 * 1024, config);
        descriptor.record_receipt(PartReceipt::new(1, "\"a\""));

        let text = describe(&descriptor);
        assert!(text.contains("s3://media/big.iso (eu-west-1)"));
        assert!(text.contains("1 of 3 parts (100 MB of 300 MB)"));
        assert!(text.contains("upload-1"));
    }

    #[test]
    fn asks_before_replacing_pending_upload() {
        assert_eq!(
            discard_question("big.iso", 500 * 1024 * 1024, "other.iso"),
            "An interrupted upload of big.iso (500 MB) is pending. Discard it and upload other.iso instead?"
        );
    }

    #[test]
    fn discard_clears_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(tmp.path().join("resume.json")));
        let config = UploadConfig::new(Credentials::default(), "r", "b", "k");
        store
            .save(&ResumeDescriptor::new("u1", "f", 10, 5, config))
            .unwrap();

        let ctx = Context {
            config: CliConfig::default(),
            store: store.clone(),
        };
        discard(&ctx).unwrap();
        assert!(store.load().is_none());
    }
}
