//! Structured error types for the ingestion core.
//!
//! Per-unit fetch failures are not errors at all: they are carried as
//! [`crate::domain::FetchFailure`] values inside a `FetchOutcome`. The enums
//! here cover configuration, local writes, remote uploads and checkpoints.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems detected before any work begins.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("ticker list unreadable at {path}: {source}")]
    TickerFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Local partition write failures.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot create output root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("row for '{symbol}' has no date in partition column '{column}'")]
    MissingPartitionField { symbol: String, column: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Remote object write failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("local root {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("network error uploading '{key}': {message}")]
    Network { key: String, message: String },

    #[error("store rejected '{key}' with HTTP {status}: {body}")]
    Rejected {
        key: String,
        status: u16,
        body: String,
    },

    #[error("store error for '{key}': {message}")]
    Store { key: String, message: String },
}

/// Checkpoint file failures.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
