//! Single-slot persistence for the resume descriptor.
//!
//! At most one interrupted upload is resumable at a time: every save
//! overwrites the slot, and a malformed slot is cleared on load so a broken
//! resume is never offered twice.

mod file;
mod memory;

use std::path::PathBuf;

use s3up_protocol::ResumeDescriptor;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Errors from resume slot operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value contract for the single resume slot.
pub trait ResumeStore: Send + Sync {
    /// Overwrites the slot.
    fn save(&self, descriptor: &ResumeDescriptor) -> Result<(), StoreError>;

    /// Returns the stored descriptor.
    ///
    /// Absent or malformed contents yield `None`; malformed contents are
    /// cleared.
    fn load(&self) -> Option<ResumeDescriptor>;

    /// Empties the slot. Clearing an empty slot is not an error.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Parses raw slot contents, logging when they are unusable.
pub(crate) fn decode(raw: &str) -> Option<ResumeDescriptor> {
    match serde_json::from_str(raw) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed resume descriptor");
            None
        }
    }
}

/// Returns the default slot path: `<config dir>/s3up/resume.json`.
pub fn default_store_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("s3up").join("resume.json"))
}

/// Returns the platform-specific config directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}
