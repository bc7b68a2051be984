//! Upload a partitioned tree to an object store.

use super::store::ObjectStore;
use crate::error::UploadError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub bytes: u64,
    pub failed: Vec<(String, UploadError)>,
}

impl SyncReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Mirrors every parquet file (plus manifests) under a local root to a store,
/// keyed by `{prefix}/{relative path}`.
pub struct RemoteSync {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    include_manifests: bool,
}

impl RemoteSync {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
            include_manifests: true,
        }
    }

    pub fn with_manifests(mut self, include: bool) -> Self {
        self.include_manifests = include;
        self
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Object key for a path relative to the synced root.
    pub fn key_for(&self, relative: &Path) -> String {
        let rel = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if self.prefix.is_empty() {
            rel
        } else {
            format!("{}/{rel}", self.prefix)
        }
    }

    /// Upload every matching file; a failed object does not stop the rest.
    pub fn sync(&self, local_root: &Path) -> Result<SyncReport, UploadError> {
        if !local_root.is_dir() {
            return Err(UploadError::MissingRoot(local_root.to_path_buf()));
        }

        let mut files = Vec::new();
        self.collect(local_root, &mut files)?;
        files.sort();

        let mut report = SyncReport::default();
        for path in files {
            let relative = path.strip_prefix(local_root).unwrap_or(&path);
            let key = self.key_for(relative);
            let body = match fs::read(&path) {
                Ok(b) => b,
                Err(source) => {
                    report
                        .failed
                        .push((key, UploadError::Read { path, source }));
                    continue;
                }
            };
            let len = body.len() as u64;
            match self.store.put(&key, body) {
                Ok(()) => {
                    tracing::debug!(store = self.store.name(), key = %key, bytes = len, "uploaded");
                    report.bytes += len;
                    report.uploaded.push(key);
                }
                Err(e) => {
                    tracing::warn!(store = self.store.name(), key = %key, error = %e, "upload failed");
                    report.failed.push((key, e));
                }
            }
        }

        tracing::info!(
            store = self.store.name(),
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            bytes = report.bytes,
            "sync complete"
        );
        Ok(report)
    }

    fn collect(&self, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), UploadError> {
        let read_err = |source| UploadError::Read {
            path: dir.to_path_buf(),
            source,
        };
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_dir() {
                self.collect(&path, out)?;
            } else if self.wanted(&path) {
                out.push(path);
            }
        }
        Ok(())
    }

    fn wanted(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.ends_with(".tmp") {
            return false;
        }
        name.ends_with(".parquet") || (self.include_manifests && name.ends_with(".json"))
    }
}
