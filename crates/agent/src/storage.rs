// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandboxed file storage.
//!
//! Every file operation goes through [`sanitize_filename`] and resolves
//! inside the storage root; a name that cannot be sanitized fails with
//! `bad_request` rather than being normalized. The root is created on
//! demand and its listing is the only persistent state the agent has.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use muster_core::{ApiError, ErrorKind};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unsafe filename: {0}")]
    UnsafeName(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let kind = match &err {
            StorageError::UnsafeName(_) => ErrorKind::BadRequest,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Io(_) => ErrorKind::Internal,
        };
        ApiError::new(kind, err.to_string())
    }
}

/// One row of the `/files/list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    /// Modification time, milliseconds since epoch.
    pub modified: u64,
}

/// Strip directory components and reject anything outside
/// `[A-Za-z0-9._-]+` or starting with a dot.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string();

    if base.is_empty() || base.starts_with('.') {
        return None;
    }
    if !base
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return None;
    }
    Some(base)
}

/// The per-agent storage area.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Sanitize `name` and resolve it inside the root.
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        let safe = sanitize_filename(name).ok_or_else(|| StorageError::UnsafeName(name.to_string()))?;
        Ok(self.root.join(safe))
    }

    pub fn list(&self) -> Result<Vec<FileEntry>, StorageError> {
        self.ensure_root()?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
                modified,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn read(&self, name: &str) -> Result<String, StorageError> {
        let path = self.resolve(name)?;
        std::fs::read_to_string(&path).map_err(|e| io_to_storage(e, name))
    }

    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(|e| io_to_storage(e, name))
    }

    pub fn write(&self, name: &str, content: &str) -> Result<(), StorageError> {
        self.write_bytes(name, content.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, content: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        self.ensure_root()?;
        std::fs::write(&path, content)?;
        debug!(name, bytes = content.len(), "stored file");
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        std::fs::remove_file(&path).map_err(|e| io_to_storage(e, name))
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<(), StorageError> {
        let from = self.resolve(old)?;
        let to = self.resolve(new)?;
        std::fs::rename(&from, &to).map_err(|e| io_to_storage(e, old))
    }

    /// Install command for a recognized uploaded file, or `None`.
    ///
    /// The extension set is closed; anything else is stored without an
    /// install action.
    pub fn install_command(&self, name: &str) -> Option<String> {
        let safe = sanitize_filename(name)?;
        let path = self.root.join(&safe);
        let path = path.display();
        let root = self.root.display();

        if safe.ends_with(".deb") {
            Some(format!("dpkg -i '{path}'"))
        } else if safe.ends_with(".rpm") {
            Some(format!("rpm -i '{path}'"))
        } else if safe.ends_with(".AppImage") {
            Some(format!("chmod +x '{path}'"))
        } else if safe.ends_with(".sh") {
            Some(format!("chmod +x '{path}' && '{path}'"))
        } else if safe.ends_with(".tar.gz") || safe.ends_with(".tgz") {
            Some(format!("tar -xzf '{path}' -C '{root}'"))
        } else if safe.ends_with(".zip") {
            Some(format!("unzip -o '{path}' -d '{root}'"))
        } else if safe.ends_with(".py") {
            Some(format!("pip install '{path}'"))
        } else {
            None
        }
    }
}

fn io_to_storage(err: std::io::Error, name: &str) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
