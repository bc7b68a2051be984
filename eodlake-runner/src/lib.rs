//! eodlake runner: batch orchestration, ingestion pipelines, configuration.
//!
//! This crate builds on `eodlake-core` to provide:
//! - TOML configuration with env-var credential resolution
//! - Batch fetcher with failure isolation and an optional bounded worker pool
//! - Price, corporate action, macro and fundamentals runs with checkpointing
//! - Remote sync of every local dataset
//! - Run summaries for the CLI

pub mod batch;
pub mod config;
pub mod pipeline;
pub mod summary;

pub use batch::{BatchFetcher, BatchResult, DocumentBatch};
pub use config::{ConfigError, Dataset, IngestConfig, RemoteConfig, RemoteKind};
pub use pipeline::{sync_datasets, Pipeline, PipelineError};
pub use summary::{RunSummary, UploadSummary};
