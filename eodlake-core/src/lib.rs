//! eodlake core: identifiers, provider client, partitioned storage, remote sync.
//!
//! This crate holds everything below the orchestration layer:
//! - Domain types (identifiers, rows, fetch requests and outcomes)
//! - Rate-limited EODHD client behind the `HistoricalProvider` trait
//! - Ticker list loading and checkpoint persistence
//! - Time-partitioned Parquet writer with a hashed manifest
//! - Object stores (S3 with SigV4, local mirror) and the tree uploader

pub mod data;
pub mod domain;
pub mod error;
pub mod remote;

pub use error::{CheckpointError, IngestError, UploadError, WriteError};
