//! Object store abstraction.

use crate::error::UploadError;
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for uploaded objects.
///
/// Keys use `/` separators regardless of platform.
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &str;

    /// Create or overwrite the object at `key`.
    fn put(&self, key: &str, body: Vec<u8>) -> Result<(), UploadError>;
}

/// Mirrors objects into a local directory (mounted share, tests).
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl ObjectStore for LocalMirror {
    fn name(&self) -> &str {
        "local"
    }

    fn put(&self, key: &str, body: Vec<u8>) -> Result<(), UploadError> {
        if key.split('/').any(|segment| segment == "..") {
            return Err(UploadError::Store {
                key: key.to_string(),
                message: "key escapes the mirror root".into(),
            });
        }
        let path = self.object_path(key);
        let store_err = |e: std::io::Error| UploadError::Store {
            key: key.to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(store_err)?;
        }
        fs::write(&path, body).map_err(store_err)
    }
}
