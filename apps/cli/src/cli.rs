use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "s3up", version, about = "Resumable multipart uploads to Amazon S3")]
pub struct Cli {
    /// Config file [default: <config dir>/s3up/config.toml]
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Resume checkpoint file [default: <config dir>/s3up/resume.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub resume_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a file, offering to resume if it matches an interrupted upload
    Upload(UploadArgs),
    /// Continue the interrupted upload with the same file
    Resume(ResumeArgs),
    /// Show the interrupted upload, if any
    Status,
    /// Forget the interrupted upload
    Discard,
}

#[derive(Debug, Args)]
pub struct CredentialArgs {
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub file: PathBuf,

    #[arg(long)]
    pub bucket: Option<String>,

    /// Object key [default: file name]
    #[arg(long)]
    pub key: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long, value_name = "MB")]
    pub part_size_mb: Option<u64>,

    /// Parts uploaded in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Overwrite existing objects and resume matching uploads without asking
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Debug, Args)]
pub struct ResumeArgs {
    pub file: PathBuf,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_upload_flags() {
        let cli = Cli::try_parse_from([
            "s3up",
            "upload",
            "video.mp4",
            "--bucket",
            "media",
            "--part-size-mb",
            "64",
            "--concurrency",
            "4",
            "-y",
        ])
        .unwrap();

        let Command::Upload(args) = cli.command else {
            panic!("expected upload");
        };
        assert_eq!(args.file, PathBuf::from("video.mp4"));
        assert_eq!(args.bucket.as_deref(), Some("media"));
        assert_eq!(args.part_size_mb, Some(64));
        assert_eq!(args.concurrency, Some(4));
        assert!(args.yes);
        assert!(args.key.is_none());
    }

    #[test]
    fn global_resume_file() {
        let cli = Cli::try_parse_from(["s3up", "status", "--resume-file", "/tmp/r.json"]).unwrap();
        assert_eq!(cli.resume_file, Some(PathBuf::from("/tmp/r.json")));
        assert!(matches!(cli.command, Command::Status));
    }
}
