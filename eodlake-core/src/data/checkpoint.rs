//! Checkpoint store: the failed identifiers of the most recent run.
//!
//! Plain text, one qualified identifier per line. Each save replaces the
//! file (write to .tmp, rename into place); it never appends.

use crate::domain::Identifier;
use crate::error::CheckpointError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the checkpoint with `failed`.
    pub fn save(&self, failed: &[Identifier]) -> Result<(), CheckpointError> {
        let io_err = |source: std::io::Error| CheckpointError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut content = String::new();
        for id in failed {
            content.push_str(&id.code());
            content.push('\n');
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_err(e)
        })?;

        tracing::debug!(path = %self.path.display(), count = failed.len(), "checkpoint saved");
        Ok(())
    }

    /// Most recently saved list; empty if nothing was ever saved.
    pub fn load(&self) -> Result<Vec<Identifier>, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(content.lines().filter_map(Identifier::parse).collect())
    }

    /// Drop the checkpoint (e.g. after a clean retry run).
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
