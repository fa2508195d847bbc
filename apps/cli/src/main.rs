//! s3up entry point.

mod cli;
mod commands;
mod config;
mod prompt;
mod render;

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use s3up_resume_store::JsonFileStore;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::Context;
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting s3up");

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config = match CliConfig::load(&config_path) {
        Ok(c) => {
            tracing::debug!(path = %config_path.display(), "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            CliConfig::default()
        }
    };

    let resume_path = match cli.resume_file {
        Some(path) => path,
        None => s3up_resume_store::default_store_path()
            .context("cannot determine the config directory for the resume file")?,
    };
    let ctx = Context {
        config,
        store: Arc::new(JsonFileStore::new(resume_path)),
    };

    match cli.command {
        Command::Upload(args) => commands::upload(&ctx, args).await,
        Command::Resume(args) => commands::resume(&ctx, args).await,
        Command::Status => commands::status(&ctx),
        Command::Discard => commands::discard(&ctx),
    }
}
