//! End-to-end ingestion runs.
//!
//! Every run follows the same shape: fetch a batch, save the checkpoint of
//! failed units, persist what succeeded, optionally mirror the dataset to
//! remote storage, and hand back a [`RunSummary`]. The checkpoint is always
//! written before anything that can fail fatally, so a crashed write still
//! leaves an accurate retry list behind. Write and upload errors after the
//! fetch are reported in the summary; units whose data never reached disk
//! are added back to the checkpoint.
//!
//! Retry runs write in upsert mode so the retried units are merged into
//! partitions the original run already wrote.

use crate::batch::{BatchFetcher, BatchResult};
use crate::config::{ConfigError, Dataset, IngestConfig};
use crate::summary::{RunSummary, UploadSummary};
use eodlake_core::data::validate::count_suspicious;
use eodlake_core::data::{
    CheckpointStore, DocumentWriter, EodhdClient, FetchProgress, HistoricalProvider,
    PartitionScheme, PartitionWriter, RateLimiter, TickerSource, TracingProgress, WriteMode,
};
use eodlake_core::domain::{DateRange, Identifier, ResourceKind};
use std::collections::HashSet;
use eodlake_core::remote::{ObjectStore, RemoteSync};
use eodlake_core::{CheckpointError, IngestError, UploadError, WriteError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("write failed: {0}")]
    Write(#[from] WriteError),
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("sync failed: {0}")]
    Upload(#[from] UploadError),
}

pub struct Pipeline {
    config: IngestConfig,
    fetcher: BatchFetcher,
    store: Option<Arc<dyn ObjectStore>>,
    progress: Arc<dyn FetchProgress>,
}

impl Pipeline {
    pub fn new(config: IngestConfig, provider: Arc<dyn HistoricalProvider>) -> Self {
        let fetcher = BatchFetcher::new(provider).with_concurrency(config.fetch.concurrency);
        Self {
            config,
            fetcher,
            store: None,
            progress: Arc::new(TracingProgress),
        }
    }

    /// Build the EODHD client and (if configured) the remote store.
    pub fn from_config(config: IngestConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::per_minute(config.provider.requests_per_minute));
        let client = EodhdClient::new(
            config.provider.base_url.clone(),
            config.api_key()?,
            limiter,
            config.timeout(),
        )?;
        let store = config
            .remote
            .as_ref()
            .map(|remote| remote.build_store())
            .transpose()?;

        let mut pipeline = Self::new(config, Arc::new(client));
        pipeline.store = store;
        Ok(pipeline)
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Skip remote sync for this pipeline's runs.
    pub fn without_store(mut self) -> Self {
        self.store = None;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Identifiers from the configured ticker file.
    pub fn load_tickers(&self) -> Result<Vec<Identifier>, PipelineError> {
        let source = TickerSource::new(self.config.tickers.default_exchange());
        Ok(source.from_file(&self.config.tickers.file)?)
    }

    pub fn checkpoint(&self, kind: ResourceKind) -> CheckpointStore {
        self.config.output.checkpoint_for(kind)
    }

    pub fn dataset(&self, kind: ResourceKind) -> Dataset {
        self.config.output.dataset(kind)
    }

    /// Fetch EOD prices, write year partitions, sync, checkpoint failures.
    pub fn run_prices(
        &self,
        identifiers: &[Identifier],
        range: DateRange,
    ) -> Result<RunSummary, PipelineError> {
        self.prices(identifiers, range, self.config.output.mode)
    }

    /// Dividends or splits, partitioned by year.
    pub fn run_corporate_actions(
        &self,
        identifiers: &[Identifier],
        range: DateRange,
        kind: ResourceKind,
    ) -> Result<RunSummary, PipelineError> {
        self.corporate_actions(identifiers, range, kind, self.config.output.mode)
    }

    fn prices(
        &self,
        identifiers: &[Identifier],
        range: DateRange,
        mode: WriteMode,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        tracing::info!(
            units = identifiers.len(),
            start = %range.start,
            end = %range.end,
            concurrency = self.fetcher.concurrency(),
            "price run"
        );
        let batch = self.fetcher.fetch(
            identifiers,
            range,
            ResourceKind::EodPrice,
            self.progress.as_ref(),
        );
        let writer = PartitionWriter::new(&self.config.output.root)
            .with_scheme(self.config.output.scheme)
            .with_mode(mode)
            .with_filename(self.config.output.filename.clone());
        self.finish_rows(ResourceKind::EodPrice, batch, &writer, started)
    }

    fn corporate_actions(
        &self,
        identifiers: &[Identifier],
        range: DateRange,
        kind: ResourceKind,
        mode: WriteMode,
    ) -> Result<RunSummary, PipelineError> {
        let filename = match kind {
            ResourceKind::Dividend => "dividends.parquet",
            ResourceKind::Split => "splits.parquet",
            other => {
                return Err(IngestError::Configuration(format!(
                    "{other} is not a corporate action"
                ))
                .into())
            }
        };
        let started = Instant::now();
        tracing::info!(units = identifiers.len(), kind = %kind, "corporate action run");
        let batch = self
            .fetcher
            .fetch(identifiers, range, kind, self.progress.as_ref());
        let writer = PartitionWriter::new(self.dataset(kind).root)
            .with_scheme(PartitionScheme::Year)
            .with_mode(mode)
            .with_filename(filename);
        self.finish_rows(kind, batch, &writer, started)
    }

    /// One macro indicator across countries (ISO-3 codes).
    pub fn run_macro(
        &self,
        countries: &[Identifier],
        indicator: &str,
    ) -> Result<RunSummary, PipelineError> {
        let indicator = indicator.trim();
        if indicator.is_empty() {
            return Err(IngestError::Configuration("macro indicator name is empty".into()).into());
        }
        let started = Instant::now();
        tracing::info!(units = countries.len(), indicator, "macro run");
        let provider = self.fetcher.provider();
        let batch = self
            .fetcher
            .fetch_with(countries, self.progress.as_ref(), |country| {
                provider.fetch_macro(country, indicator)
            });
        let writer = PartitionWriter::new(self.dataset(ResourceKind::Macro).root)
            .with_scheme(PartitionScheme::Year)
            .with_mode(self.config.output.mode)
            .with_filename(format!("{indicator}.parquet"));
        self.finish_rows(ResourceKind::Macro, batch, &writer, started)
    }

    /// Fundamentals documents, stored as-is.
    pub fn run_fundamentals(
        &self,
        identifiers: &[Identifier],
        section: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let kind = ResourceKind::Fundamentals;
        tracing::info!(units = identifiers.len(), section, "fundamentals run");
        let batch = self
            .fetcher
            .fetch_documents(identifiers, section, self.progress.as_ref());

        let mut summary = RunSummary::new(kind);
        summary.checkpoint = Some(self.save_checkpoint(kind, &batch.failed_identifiers())?);

        let dataset = self.dataset(kind);
        if !batch.documents.is_empty() {
            let writer = DocumentWriter::new(&dataset.root);
            let unwritten: Vec<Identifier> = match writer.write_all(&batch.documents) {
                Ok(report) => {
                    summary.written = report
                        .written
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect();
                    summary.write_failures = report
                        .failed
                        .iter()
                        .map(|(id, e)| format!("{id}: {e}"))
                        .collect();
                    report.failed.into_iter().map(|(id, _)| id).collect()
                }
                Err(e) => {
                    tracing::error!(error = %e, "fundamentals write failed");
                    summary.write_failures.push(e.to_string());
                    batch.successful.clone()
                }
            };
            if !unwritten.is_empty() {
                let mut pending = batch.failed_identifiers();
                pending.extend(unwritten);
                self.save_checkpoint(kind, &pending)?;
            }
            if !summary.written.is_empty() {
                summary.upload = self.sync_dataset(&dataset);
            }
        }

        summary.succeeded = batch.successful;
        summary.failed = batch.failed;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Re-run only the units recorded in the checkpoint for `kind`.
    ///
    /// `section` is the fundamentals filter and must match the original run;
    /// other kinds ignore it.
    pub fn retry(
        &self,
        kind: ResourceKind,
        range: DateRange,
        section: Option<&str>,
    ) -> Result<RunSummary, PipelineError> {
        let checkpoint = self.checkpoint(kind);
        let identifiers = checkpoint.load()?;
        if identifiers.is_empty() {
            tracing::info!(path = %checkpoint.path().display(), "checkpoint is empty, nothing to retry");
            let mut summary = RunSummary::new(kind);
            summary.checkpoint = Some(checkpoint.path().to_path_buf());
            return Ok(summary);
        }
        tracing::info!(units = identifiers.len(), kind = %kind, "retrying failed units");

        match kind {
            ResourceKind::EodPrice => self.prices(&identifiers, range, WriteMode::Upsert),
            ResourceKind::Dividend | ResourceKind::Split => {
                self.corporate_actions(&identifiers, range, kind, WriteMode::Upsert)
            }
            ResourceKind::Fundamentals => self.run_fundamentals(&identifiers, section),
            ResourceKind::Macro => Err(IngestError::Configuration(
                "macro runs need an indicator; rerun `macro` with the failed countries".into(),
            )
            .into()),
        }
    }

    /// Mirror every dataset that exists locally.
    pub fn sync_all(&self) -> Result<Vec<(Dataset, UploadSummary)>, PipelineError> {
        let Some(store) = &self.store else {
            return Err(IngestError::Configuration("no [remote] section configured".into()).into());
        };
        sync_datasets(&self.config, store)
    }

    fn finish_rows(
        &self,
        kind: ResourceKind,
        mut batch: BatchResult,
        writer: &PartitionWriter,
        started: Instant,
    ) -> Result<RunSummary, PipelineError> {
        let undated = format!("row without a '{}' date", writer.date_column());
        batch.reject_units(|row| writer.key_for(row).is_none(), &undated);

        let mut summary = RunSummary::new(kind);
        summary.checkpoint = Some(self.save_checkpoint(kind, &batch.failed_identifiers())?);
        summary.rows = batch.rows.len();
        if kind == ResourceKind::EodPrice {
            summary.suspicious_rows = count_suspicious(&batch.rows);
            if summary.suspicious_rows > 0 {
                tracing::warn!(rows = summary.suspicious_rows, "suspicious price rows kept");
            }
        }

        if !batch.rows.is_empty() {
            let unwritten = match writer.write(&batch.rows) {
                Ok(report) => {
                    summary.written = report.written.iter().map(|w| w.key.to_string()).collect();
                    summary.write_failures = report
                        .failed
                        .iter()
                        .map(|(key, e)| format!("{key}: {e}"))
                        .collect();
                    let failed_keys: HashSet<_> = report.failed.iter().map(|(key, _)| *key).collect();
                    let symbols: HashSet<&str> = batch
                        .rows
                        .iter()
                        .filter(|row| writer.key_for(row).is_some_and(|k| failed_keys.contains(&k)))
                        .map(|row| row.symbol())
                        .collect();
                    units_for(&batch.successful, &symbols)
                }
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "write failed");
                    summary.write_failures.push(e.to_string());
                    batch.successful.clone()
                }
            };
            if !unwritten.is_empty() {
                let mut pending = batch.failed_identifiers();
                pending.extend(unwritten);
                self.save_checkpoint(kind, &pending)?;
            }
            if !summary.written.is_empty() {
                summary.upload = self.sync_dataset(&self.dataset(kind));
            }
        } else {
            tracing::warn!(kind = %kind, "no rows fetched, nothing written");
        }

        summary.succeeded = batch.successful;
        summary.failed = batch.failed;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn save_checkpoint(
        &self,
        kind: ResourceKind,
        failed: &[Identifier],
    ) -> Result<PathBuf, PipelineError> {
        let checkpoint = self.checkpoint(kind);
        checkpoint.save(failed)?;
        tracing::info!(
            path = %checkpoint.path().display(),
            failed = failed.len(),
            "checkpoint saved"
        );
        Ok(checkpoint.path().to_path_buf())
    }

    /// A failed sync is recorded in the upload summary; the local write stands.
    fn sync_dataset(&self, dataset: &Dataset) -> Option<UploadSummary> {
        let store = self.store.as_ref()?;
        Some(match sync_dataset(&self.config, store, dataset) {
            Ok(upload) => upload,
            Err(e) => {
                tracing::error!(dataset = dataset.name, error = %e, "sync failed");
                UploadSummary {
                    store: store.name().to_string(),
                    failed: vec![e.to_string()],
                    ..Default::default()
                }
            }
        })
    }
}

/// Successful units whose rows carry one of `symbols`.
fn units_for(successful: &[Identifier], symbols: &HashSet<&str>) -> Vec<Identifier> {
    successful
        .iter()
        .filter(|id| symbols.contains(id.code().as_str()))
        .cloned()
        .collect()
}

/// Mirror every dataset under `config.output` that exists locally. Needs no
/// provider, so `sync` works without an API token.
pub fn sync_datasets(
    config: &IngestConfig,
    store: &Arc<dyn ObjectStore>,
) -> Result<Vec<(Dataset, UploadSummary)>, PipelineError> {
    let mut results = Vec::new();
    for kind in [
        ResourceKind::EodPrice,
        ResourceKind::Dividend,
        ResourceKind::Split,
        ResourceKind::Macro,
        ResourceKind::Fundamentals,
    ] {
        let dataset = config.output.dataset(kind);
        if !dataset.root.is_dir() {
            tracing::debug!(dataset = dataset.name, "no local data, skipping");
            continue;
        }
        let upload = sync_dataset(config, store, &dataset)?;
        results.push((dataset, upload));
    }
    Ok(results)
}

/// Keys land under `{remote.prefix}/{dataset}`.
fn sync_dataset(
    config: &IngestConfig,
    store: &Arc<dyn ObjectStore>,
    dataset: &Dataset,
) -> Result<UploadSummary, PipelineError> {
    let prefix = config
        .remote
        .as_ref()
        .map(|r| r.prefix.trim_matches('/'))
        .unwrap_or_default();
    let key_prefix = if prefix.is_empty() {
        dataset.name.to_string()
    } else {
        format!("{prefix}/{}", dataset.name)
    };
    let report = RemoteSync::new(Arc::clone(store), key_prefix).sync(&dataset.root)?;
    Ok(UploadSummary::from_report(store.name(), &report))
}
