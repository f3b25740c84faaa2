//! File store — the storage collaborator behind the transfer core.
//!
//! A flat directory of files addressed by name. Writes are atomic: write
//! to a temp file, then rename, so a crash mid-write never leaves a
//! half-visible file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store root: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn read_all(&self, name: &str) -> Result<Bytes> {
        let path = self.root.join(name);
        let data =
            fs::read(&path).with_context(|| format!("failed to read file: {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    /// Write a file atomically. Returns the final path.
    pub fn write_all(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(name);
        let tmp = self.root.join(format!(".{name}.tmp"));

        fs::write(&tmp, data)
            .with_context(|| format!("failed to write temp file: {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move into place: {}", path.display()))?;
        Ok(path)
    }
}
