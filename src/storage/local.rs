//! Filesystem-backed writer and reader.

use super::{DataReader, DataWriter};
use crate::error::DocParseError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes files under a root directory, creating parent directories on demand.
#[derive(Debug, Clone)]
pub struct FileBasedDataWriter {
    root: PathBuf,
}

impl FileBasedDataWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        resolve(&self.root, path)
    }
}

impl DataWriter for FileBasedDataWriter {
    fn write(&self, path: &str, data: &[u8]) -> Result<(), DocParseError> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DocParseError::io(format!("Failed to create '{}'", parent.display()), e)
            })?;
        }
        std::fs::write(&target, data)
            .map_err(|e| DocParseError::io(format!("Failed to write '{}'", target.display()), e))?;
        debug!("Wrote {} bytes → {}", data.len(), target.display());
        Ok(())
    }
}

/// Reads files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileBasedDataReader {
    root: PathBuf,
}

impl FileBasedDataReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DataReader for FileBasedDataReader {
    fn read(&self, path: &str) -> Result<Vec<u8>, DocParseError> {
        let target = resolve(&self.root, path);
        std::fs::read(&target)
            .map_err(|e| DocParseError::io(format!("Failed to read '{}'", target.display()), e))
    }
}

/// Absolute paths and an empty root are taken as-is.
fn resolve(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() || root.as_os_str().is_empty() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
