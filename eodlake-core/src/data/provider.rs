//! Provider trait and progress reporting.
//!
//! The HistoricalProvider trait abstracts over the upstream data source so
//! the batch orchestrator can be driven by the real EODHD client or by a
//! scripted fake in tests.

use crate::domain::{FetchFailure, FetchOutcome, FetchRequest, Identifier, Row};
use serde_json::Value;

/// A source of historical market data.
///
/// Implementations must never panic or return early on a per-unit problem:
/// every call yields a [`FetchOutcome`].
pub trait HistoricalProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch a row-shaped resource (prices, dividends, splits, macro).
    fn fetch_rows(&self, request: &FetchRequest) -> FetchOutcome<Vec<Row>>;

    /// Fetch a document-shaped resource (fundamentals), returned as-is.
    fn fetch_document(&self, identifier: &Identifier, section: Option<&str>)
        -> FetchOutcome<Value>;

    /// Fetch one macro indicator series for a country.
    fn fetch_macro(&self, country: &Identifier, indicator: &str) -> FetchOutcome<Vec<Row>> {
        let _ = indicator;
        FetchOutcome::Failure(FetchFailure::decode(
            country,
            format!("{} does not serve macro indicators", self.name()),
        ))
    }
}

/// Structured events emitted while a batch runs.
///
/// Implementations are shared across worker threads.
pub trait FetchProgress: Send + Sync {
    /// Called when starting to fetch a unit.
    fn on_start(&self, identifier: &Identifier, index: usize, total: usize);

    /// Called when a unit completes. `rows` is the record count on success.
    fn on_complete(
        &self,
        identifier: &Identifier,
        index: usize,
        total: usize,
        result: &Result<usize, FetchFailure>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that forwards events to `tracing`.
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, identifier: &Identifier, index: usize, total: usize) {
        tracing::debug!(symbol = %identifier, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(
        &self,
        identifier: &Identifier,
        index: usize,
        total: usize,
        result: &Result<usize, FetchFailure>,
    ) {
        match result {
            Ok(rows) => {
                tracing::info!(symbol = %identifier, rows, "[{}/{}] ok", index + 1, total)
            }
            Err(failure) => tracing::warn!(
                symbol = %identifier,
                kind = %failure.kind,
                status = failure.status,
                "[{}/{}] failed: {}",
                index + 1,
                total,
                failure.message
            ),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!(succeeded, failed, total, "batch complete");
    }
}

/// Progress reporter that discards every event.
pub struct SilentProgress;

impl FetchProgress for SilentProgress {
    fn on_start(&self, _identifier: &Identifier, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _identifier: &Identifier,
        _index: usize,
        _total: usize,
        _result: &Result<usize, FetchFailure>,
    ) {
    }

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
