//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/s3up/config.toml`
//! - Windows: `%APPDATA%/s3up/config.toml`
//!
//! Command-line flags override every value here.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use s3up_protocol::Credentials;
use s3up_upload::UploadOptions;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default = "default_part_size_mb")]
    pub part_size_mb: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Used when neither the flag nor `AWS_ACCESS_KEY_ID` is set.
    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_part_size_mb() -> u64 {
    100
}

fn default_concurrency() -> usize {
    1
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            bucket: String::new(),
            part_size_mb: default_part_size_mb(),
            concurrency: default_concurrency(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }
}

impl fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliConfig")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("part_size_mb", &self.part_size_mb)
            .field("concurrency", &self.concurrency)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or creates a default if not found.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config: CliConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let config = CliConfig::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // May contain a secret key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Flag (or environment) values win over the file.
    pub fn credentials(&self, access_key_id: Option<String>, secret_access_key: Option<String>) -> Credentials {
        Credentials::new(
            access_key_id.unwrap_or_else(|| self.access_key_id.clone()),
            secret_access_key.unwrap_or_else(|| self.secret_access_key.clone()),
        )
    }

    pub fn upload_options(&self, part_size_mb: Option<u64>, concurrency: Option<usize>) -> UploadOptions {
        UploadOptions {
            part_size: part_size_mb.unwrap_or(self.part_size_mb).saturating_mul(MIB),
            concurrency: concurrency.unwrap_or(self.concurrency),
            ..UploadOptions::default()
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    s3up_resume_store::config_dir()
        .map(|d| d.join("s3up").join("config.toml"))
        .context("cannot determine the config directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CliConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.part_size_mb, 100);
        assert_eq!(config.concurrency, 1);
        assert!(config.bucket.is_empty());
    }

    #[test]
    fn config_partial_toml() {
        let config: CliConfig = toml::from_str(r#"bucket = "media""#).unwrap();
        assert_eq!(config.bucket, "media");
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.part_size_mb, 100);
    }

    #[test]
    fn load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("s3up").join("config.toml");

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config, CliConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        let config = CliConfig {
            bucket: "media".into(),
            concurrency: 4,
            ..CliConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        CliConfig::default().save(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn flags_override_file() {
        let config = CliConfig {
            access_key_id: "FILEKEY".into(),
            secret_access_key: "filesecret".into(),
            part_size_mb: 8,
            concurrency: 2,
            ..CliConfig::default()
        };

        let creds = config.credentials(Some("FLAGKEY".into()), None);
        assert_eq!(creds.access_key_id, "FLAGKEY");
        assert_eq!(creds.secret_access_key, "filesecret");

        let options = config.upload_options(None, Some(6));
        assert_eq!(options.part_size, 8 * MIB);
        assert_eq!(options.concurrency, 6);
    }

    #[test]
    fn debug_redacts_secret() {
        let config = CliConfig {
            secret_access_key: "hunter2".into(),
            ..CliConfig::default()
        };
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
