//! End-of-run summary printed by the CLI.

use eodlake_core::domain::{FetchFailure, Identifier, ResourceKind};
use eodlake_core::remote::SyncReport;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Upload counts for one synced dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub store: String,
    pub uploaded: usize,
    pub failed: Vec<String>,
    pub bytes: u64,
}

impl UploadSummary {
    pub fn from_report(store: &str, report: &SyncReport) -> Self {
        Self {
            store: store.to_string(),
            uploaded: report.uploaded.len(),
            failed: report
                .failed
                .iter()
                .map(|(key, e)| format!("{key}: {e}"))
                .collect(),
            bytes: report.bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub kind: ResourceKind,
    pub succeeded: Vec<Identifier>,
    pub failed: Vec<FetchFailure>,
    pub rows: usize,
    pub suspicious_rows: usize,
    /// Partition keys (or document files) written.
    pub written: Vec<String>,
    pub write_failures: Vec<String>,
    pub upload: Option<UploadSummary>,
    pub checkpoint: Option<PathBuf>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            succeeded: Vec::new(),
            failed: Vec::new(),
            rows: 0,
            suspicious_rows: 0,
            written: Vec::new(),
            write_failures: Vec::new(),
            upload: None,
            checkpoint: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True if any unit, partition or upload failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
            || !self.write_failures.is_empty()
            || self.upload.as_ref().is_some_and(|u| !u.failed.is_empty())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "=== {} run ===", self.kind)?;
        writeln!(f, "Units:          {}", self.total())?;
        writeln!(f, "Succeeded:      {}", self.succeeded.len())?;
        writeln!(f, "Failed:         {}", self.failed.len())?;
        writeln!(f, "Rows:           {}", self.rows)?;
        if self.suspicious_rows > 0 {
            writeln!(f, "Suspicious:     {}", self.suspicious_rows)?;
        }
        writeln!(f, "Written:        {}", self.written.len())?;
        if !self.write_failures.is_empty() {
            writeln!(f, "Write failures: {}", self.write_failures.len())?;
        }
        if let Some(upload) = &self.upload {
            writeln!(
                f,
                "Uploaded:       {} ({} bytes, {} failed) to {}",
                upload.uploaded,
                upload.bytes,
                upload.failed.len(),
                upload.store
            )?;
        }
        writeln!(f, "Elapsed:        {:.1}s", self.elapsed.as_secs_f64())?;

        if !self.failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "{:<20} {:<10} {:>6}  Reason", "Identifier", "Kind", "HTTP")?;
            writeln!(f, "{}", "-".repeat(60))?;
            for failure in &self.failed {
                let status = failure
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".into());
                writeln!(
                    f,
                    "{:<20} {:<10} {:>6}  {}",
                    failure.identifier.code(),
                    failure.kind.to_string(),
                    status,
                    failure.message
                )?;
            }
        }
        for failure in &self.write_failures {
            writeln!(f, "WRITE FAILED: {failure}")?;
        }
        if let Some(upload) = &self.upload {
            for failure in &upload.failed {
                writeln!(f, "UPLOAD FAILED: {failure}")?;
            }
        }
        if let Some(path) = &self.checkpoint {
            writeln!(f)?;
            writeln!(f, "Checkpoint: {}", path.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_failures() {
        let mut summary = RunSummary::new(ResourceKind::EodPrice);
        summary.succeeded.push(Identifier::parse("AAPL").unwrap());
        let bad = Identifier::parse("ZZZZINVALID").unwrap();
        summary
            .failed
            .push(FetchFailure::transport(&bad, "Ticker Not Found.").with_status(404));

        let text = summary.to_string();
        assert!(text.contains("=== eod_price run ==="));
        assert!(text.contains("Units:          2"));
        assert!(text.contains("ZZZZINVALID"));
        assert!(text.contains("404"));
        assert!(summary.has_failures());
    }

    #[test]
    fn upload_failures_count_as_failures() {
        let mut summary = RunSummary::new(ResourceKind::EodPrice);
        assert!(!summary.has_failures());
        summary.upload = Some(UploadSummary {
            store: "s3".into(),
            uploaded: 1,
            failed: vec!["k: rejected".into()],
            bytes: 10,
        });
        assert!(summary.has_failures());
    }
}
