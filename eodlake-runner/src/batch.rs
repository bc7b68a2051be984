//! Batch fetch orchestration with per-unit failure isolation.
//!
//! A batch never aborts on a per-unit problem: every identifier ends up in
//! exactly one of `successful` or `failed`. With `concurrency > 1` the units
//! run on a bounded rayon pool; the provider's rate limiter is shared across
//! workers, so the aggregate request rate is unchanged.

use eodlake_core::data::{FetchProgress, HistoricalProvider};
use eodlake_core::domain::{
    DateRange, FetchFailure, FetchOutcome, FetchRequest, Identifier, ResourceKind, Row,
};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Rows and bookkeeping from a row-shaped batch.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// Rows from every successful unit, in input order.
    pub rows: Vec<Row>,
    pub successful: Vec<Identifier>,
    pub failed: Vec<FetchFailure>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn failed_identifiers(&self) -> Vec<Identifier> {
        self.failed.iter().map(|f| f.identifier.clone()).collect()
    }

    /// Demote every successful unit that returned at least one row matching
    /// `is_bad` to a `Decode` failure and drop all of that unit's rows.
    ///
    /// Returns the demoted identifiers.
    pub fn reject_units<F>(&mut self, is_bad: F, reason: &str) -> Vec<Identifier>
    where
        F: Fn(&Row) -> bool,
    {
        let bad: HashSet<String> = self
            .rows
            .iter()
            .filter(|row| is_bad(row))
            .map(|row| row.symbol().to_string())
            .collect();
        if bad.is_empty() {
            return Vec::new();
        }

        self.rows.retain(|row| !bad.contains(row.symbol()));
        let (rejected, kept): (Vec<Identifier>, Vec<Identifier>) = std::mem::take(&mut self.successful)
            .into_iter()
            .partition(|id| bad.contains(&id.code()));
        self.successful = kept;
        for id in &rejected {
            tracing::warn!(symbol = %id, reason, "unit rejected after fetch");
            self.failed.push(FetchFailure::decode(id, reason));
        }
        rejected
    }
}

/// Documents and bookkeeping from a fundamentals batch.
#[derive(Debug, Default)]
pub struct DocumentBatch {
    pub documents: Vec<(Identifier, Value)>,
    pub successful: Vec<Identifier>,
    pub failed: Vec<FetchFailure>,
}

impl DocumentBatch {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    pub fn failed_identifiers(&self) -> Vec<Identifier> {
        self.failed.iter().map(|f| f.identifier.clone()).collect()
    }
}

pub struct BatchFetcher {
    provider: Arc<dyn HistoricalProvider>,
    concurrency: usize,
}

impl BatchFetcher {
    pub fn new(provider: Arc<dyn HistoricalProvider>) -> Self {
        Self {
            provider,
            concurrency: 1,
        }
    }

    /// Worker count. Values below 1 are treated as 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn provider(&self) -> &Arc<dyn HistoricalProvider> {
        &self.provider
    }

    /// Fetch one row-shaped resource for every identifier.
    pub fn fetch(
        &self,
        identifiers: &[Identifier],
        range: DateRange,
        kind: ResourceKind,
        progress: &dyn FetchProgress,
    ) -> BatchResult {
        let provider = &self.provider;
        self.fetch_with(identifiers, progress, |id| {
            provider.fetch_rows(&FetchRequest::new(id.clone(), range, kind))
        })
    }

    /// Row batch driven by an arbitrary per-unit call (macro series, tests).
    pub fn fetch_with<F>(
        &self,
        identifiers: &[Identifier],
        progress: &dyn FetchProgress,
        fetch_one: F,
    ) -> BatchResult
    where
        F: Fn(&Identifier) -> FetchOutcome<Vec<Row>> + Sync,
    {
        let results = self.execute(identifiers, progress, fetch_one, |rows: &Vec<Row>| {
            rows.len()
        });

        let mut batch = BatchResult::default();
        for (id, result) in results {
            match result {
                Ok(rows) => {
                    batch.rows.extend(rows);
                    batch.successful.push(id);
                }
                Err(failure) => batch.failed.push(failure),
            }
        }
        progress.on_batch_complete(batch.successful.len(), batch.failed.len(), batch.total());
        batch
    }

    /// Fetch fundamentals documents for every identifier.
    pub fn fetch_documents(
        &self,
        identifiers: &[Identifier],
        section: Option<&str>,
        progress: &dyn FetchProgress,
    ) -> DocumentBatch {
        let provider = &self.provider;
        let results = self.execute(
            identifiers,
            progress,
            |id| provider.fetch_document(id, section),
            |doc: &Value| document_size(doc),
        );

        let mut batch = DocumentBatch::default();
        for (id, result) in results {
            match result {
                Ok(doc) => {
                    batch.documents.push((id.clone(), doc));
                    batch.successful.push(id);
                }
                Err(failure) => batch.failed.push(failure),
            }
        }
        progress.on_batch_complete(batch.successful.len(), batch.failed.len(), batch.total());
        batch
    }

    /// Run `fetch_one` per distinct identifier, results in input order.
    ///
    /// A success with zero records is reclassified as a `NoData` failure.
    fn execute<T, F, S>(
        &self,
        identifiers: &[Identifier],
        progress: &dyn FetchProgress,
        fetch_one: F,
        size: S,
    ) -> Vec<(Identifier, Result<T, FetchFailure>)>
    where
        T: Send,
        F: Fn(&Identifier) -> FetchOutcome<T> + Sync,
        S: Fn(&T) -> usize + Sync,
    {
        let units = dedupe(identifiers);
        let total = units.len();

        let run_unit = |(index, id): (usize, &Identifier)| {
            progress.on_start(id, index, total);
            let result = match fetch_one(id).into_result() {
                Ok(value) if size(&value) == 0 => Err(FetchFailure::no_data(id)),
                other => other,
            };
            let reported = result.as_ref().map(&size).map_err(Clone::clone);
            progress.on_complete(id, index, total, &reported);
            (id.clone(), result)
        };

        match self.thread_pool() {
            Some(pool) => pool.install(|| units.par_iter().copied().enumerate().map(run_unit).collect()),
            None => units.iter().copied().enumerate().map(run_unit).collect(),
        }
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        if self.concurrency <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "thread pool unavailable, fetching sequentially");
                None
            }
        }
    }
}

/// Distinct identifiers, first occurrence wins.
fn dedupe(identifiers: &[Identifier]) -> Vec<&Identifier> {
    let mut seen = HashSet::new();
    identifiers.iter().filter(|id| seen.insert(*id)).collect()
}

/// Empty objects, arrays and null count as "no data".
fn document_size(doc: &Value) -> usize {
    match doc {
        Value::Null => 0,
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eodlake_core::data::SilentProgress;
    use eodlake_core::domain::{FailureKind, Scalar};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn id(code: &str) -> Identifier {
        Identifier::parse(code).unwrap()
    }

    fn row(symbol: &str) -> Row {
        Row::new(symbol).with(
            "date",
            Scalar::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
        )
    }

    /// Records call order; answers from the identifier's first letter.
    struct Scripted {
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl HistoricalProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch_rows(&self, request: &FetchRequest) -> FetchOutcome<Vec<Row>> {
            let code = request.identifier.code();
            self.calls.lock().unwrap().push(code.clone());
            match code.chars().next() {
                Some('X') => FetchOutcome::Failure(
                    FetchFailure::transport(&request.identifier, "boom").with_status(500),
                ),
                Some('E') => FetchOutcome::Success(Vec::new()),
                _ => FetchOutcome::Success(vec![row(&code), row(&code)]),
            }
        }

        fn fetch_document(&self, identifier: &Identifier, _section: Option<&str>) -> FetchOutcome<Value> {
            match identifier.symbol() {
                "EMPTY" => FetchOutcome::Success(serde_json::json!({})),
                "BAD" => FetchOutcome::Failure(FetchFailure::decode(identifier, "not json")),
                _ => FetchOutcome::Success(serde_json::json!({"General": {"Code": identifier.symbol()}})),
            }
        }
    }

    fn range() -> DateRange {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DateRange::new(d, d)
    }

    #[test]
    fn empty_success_is_no_data_failure() {
        let fetcher = BatchFetcher::new(Arc::new(Scripted::new()));
        let batch = fetcher.fetch(&[id("EMPTY")], range(), ResourceKind::EodPrice, &SilentProgress);
        assert!(batch.successful.is_empty());
        assert_eq!(batch.failed[0].kind, FailureKind::NoData);
    }

    #[test]
    fn duplicates_are_fetched_once() {
        let provider = Arc::new(Scripted::new());
        let fetcher = BatchFetcher::new(provider.clone());
        let batch = fetcher.fetch(
            &[id("A"), id("B"), id("A")],
            range(),
            ResourceKind::EodPrice,
            &SilentProgress,
        );
        assert_eq!(batch.successful, vec![id("A"), id("B")]);
        assert_eq!(*provider.calls.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(batch.rows.len(), 4);
    }

    #[test]
    fn all_failure_batch_is_valid() {
        let fetcher = BatchFetcher::new(Arc::new(Scripted::new()));
        let batch = fetcher.fetch(&[id("X1"), id("X2")], range(), ResourceKind::EodPrice, &SilentProgress);
        assert!(batch.rows.is_empty());
        assert!(batch.successful.is_empty());
        assert_eq!(batch.failed_identifiers(), vec![id("X1"), id("X2")]);
        assert_eq!(batch.failed[0].status, Some(500));
    }

    #[test]
    fn document_batch_isolates_failures() {
        let fetcher = BatchFetcher::new(Arc::new(Scripted::new()));
        let batch = fetcher.fetch_documents(
            &[id("AAPL.US"), id("BAD.US"), id("EMPTY.US")],
            None,
            &SilentProgress,
        );
        assert_eq!(batch.successful, vec![id("AAPL.US")]);
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.failed.len(), 2);
        assert_eq!(batch.failed[0].kind, FailureKind::Decode);
        assert_eq!(batch.failed[1].kind, FailureKind::NoData);
    }

    #[test]
    fn fetch_with_custom_call() {
        let fetcher = BatchFetcher::new(Arc::new(Scripted::new())).with_concurrency(0);
        assert_eq!(fetcher.concurrency(), 1);
        let batch = fetcher.fetch_with(&[id("USA"), id("GBR")], &SilentProgress, |country| {
            FetchOutcome::Success(vec![row(&country.code())])
        });
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[1].symbol(), "GBR");
    }

    #[test]
    fn rejected_unit_moves_to_failed_with_all_its_rows() {
        let fetcher = BatchFetcher::new(Arc::new(Scripted::new()));
        let mut batch = fetcher.fetch(
            &[id("A"), id("B"), id("X1")],
            range(),
            ResourceKind::EodPrice,
            &SilentProgress,
        );
        // One of B's two rows loses its date.
        let undated = batch.rows.iter().position(|r| r.symbol() == "B").unwrap();
        batch.rows[undated].remove("date");

        let rejected = batch.reject_units(|r| r.get("date").is_none(), "row without a 'date' date");

        assert_eq!(rejected, vec![id("B")]);
        assert_eq!(batch.successful, vec![id("A")]);
        assert!(batch.rows.iter().all(|r| r.symbol() == "A"));
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.failed_identifiers(), vec![id("X1"), id("B")]);
        assert_eq!(batch.failed[1].kind, FailureKind::Decode);
        assert_eq!(batch.total(), 3);
    }

    #[test]
    fn reject_units_without_matches_is_a_no_op() {
        let fetcher = BatchFetcher::new(Arc::new(Scripted::new()));
        let mut batch = fetcher.fetch(&[id("A")], range(), ResourceKind::EodPrice, &SilentProgress);
        assert!(batch.reject_units(|_| false, "unused").is_empty());
        assert_eq!(batch.successful, vec![id("A")]);
        assert_eq!(batch.rows.len(), 2);
    }
}
