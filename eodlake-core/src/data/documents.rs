//! Raw document persistence for fundamentals.
//!
//! Layout: `{root}/{CODE}.json`, pretty-printed, one file per identifier.
//! Documents are stored exactly as the provider returned them.

use crate::domain::Identifier;
use crate::error::WriteError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct DocumentReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(Identifier, WriteError)>,
}

#[derive(Debug, Clone)]
pub struct DocumentWriter {
    root: PathBuf,
}

impl DocumentWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, identifier: &Identifier) -> PathBuf {
        self.root.join(format!("{}.json", identifier.code()))
    }

    /// Write every document; one failure does not stop the rest.
    pub fn write_all(&self, documents: &[(Identifier, Value)]) -> Result<DocumentReport, WriteError> {
        fs::create_dir_all(&self.root).map_err(|source| WriteError::CreateRoot {
            path: self.root.clone(),
            source,
        })?;

        let mut report = DocumentReport::default();
        for (id, doc) in documents {
            match self.write_one(id, doc) {
                Ok(path) => report.written.push(path),
                Err(e) => {
                    tracing::warn!(symbol = %id, error = %e, "document write failed");
                    report.failed.push((id.clone(), e));
                }
            }
        }
        Ok(report)
    }

    fn write_one(&self, identifier: &Identifier, doc: &Value) -> Result<PathBuf, WriteError> {
        let path = self.document_path(identifier);
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| WriteError::Serialize(format!("{identifier}: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| WriteError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            WriteError::Io {
                path: path.clone(),
                source,
            }
        })?;
        Ok(path)
    }

    pub fn read(&self, identifier: &Identifier) -> Option<Value> {
        let content = fs::read_to_string(self.document_path(identifier)).ok()?;
        serde_json::from_str(&content).ok()
    }
}
