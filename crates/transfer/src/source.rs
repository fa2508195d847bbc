use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::planner::PartDescriptor;

/// A local file selected for upload.
///
/// Each part read opens its own handle, so reads for different parts can
/// run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl SourceFile {
    /// Stats `path` and captures its name and size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidConfiguration(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories; the default object key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads exactly the bytes of `part`.
    ///
    /// Fails with an I/O error if the file shrank since it was opened.
    pub async fn read_part(&self, part: &PartDescriptor) -> Result<Vec<u8>, TransferError> {
        let len = usize::try_from(part.len()).map_err(|_| {
            TransferError::InvalidConfiguration(format!(
                "part {} is too large to buffer",
                part.part_number
            ))
        })?;

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(part.byte_start)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
