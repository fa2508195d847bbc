use std::path::{Path, PathBuf};

use s3up_protocol::ResumeDescriptor;
use tracing::{debug, warn};

use crate::{ResumeStore, StoreError, decode};

/// Resume slot backed by one JSON file.
///
/// Saves go through a sibling temp file and a rename, so a crash mid-save
/// leaves the previous checkpoint intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ResumeStore for JsonFileStore {
    fn save(&self, descriptor: &ResumeDescriptor) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(descriptor)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        set_permissions_0600(&tmp);
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            upload_id = %descriptor.upload_id,
            parts = descriptor.uploaded_parts.len(),
            "saved resume descriptor"
        );
        Ok(())
    }

    fn load(&self) -> Option<ResumeDescriptor> {
        if !self.path.exists() {
            return None;
        }

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read resume descriptor");
                return None;
            }
        };

        let descriptor = decode(&raw);
        if descriptor.is_none() {
            if let Err(e) = self.clear() {
                warn!(path = %self.path.display(), error = %e, "failed to clear malformed resume descriptor");
            }
        }
        descriptor
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "cleared resume descriptor");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
