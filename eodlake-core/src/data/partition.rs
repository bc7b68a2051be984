//! Time-partitioned Parquet writer with Hive-style layout.
//!
//! Layout: `{root}/year={YYYY}/{filename}` or, with the year/month scheme,
//! `{root}/year={YYYY}/month={MM}/{filename}`.
//!
//! Features:
//! - One Snappy-compressed Parquet file per partition key
//! - Atomic writes (write to .tmp, rename into place)
//! - A rewrite of the same key replaces the file by default; `Upsert` mode
//!   merges with the existing file keyed on (symbol, date)
//! - Per-partition failure isolation: a failed key is reported, the rest
//!   are still written
//! - `_manifest.json` sidecar at the root (row counts, BLAKE3 file hashes)

use crate::domain::{Row, Scalar};
use crate::error::WriteError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILENAME: &str = "prices.parquet";
pub const MANIFEST_FILENAME: &str = "_manifest.json";

/// How a date maps to a partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionScheme {
    #[default]
    Year,
    YearMonth,
}

impl PartitionScheme {
    pub fn key_for(&self, date: NaiveDate) -> PartitionKey {
        match self {
            PartitionScheme::Year => PartitionKey {
                year: date.year(),
                month: None,
            },
            PartitionScheme::YearMonth => PartitionKey {
                year: date.year(),
                month: Some(date.month()),
            },
        }
    }
}

/// What happens to an existing partition file on rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the whole file with the new rows.
    #[default]
    Overwrite,
    /// Keep existing rows whose (symbol, date) is not in the new batch.
    Upsert,
}

/// Derived partition key. Orders by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub year: i32,
    pub month: Option<u32>,
}

impl PartitionKey {
    /// Directory of this partition relative to the root.
    pub fn relative_dir(&self) -> PathBuf {
        let year = PathBuf::from(format!("year={}", self.year));
        match self.month {
            Some(month) => year.join(format!("month={month:02}")),
            None => year,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{}-{month:02}", self.year),
            None => write!(f, "{}", self.year),
        }
    }
}

/// Rows sharing one partition key, in their original order.
#[derive(Debug, Clone)]
pub struct Partition {
    pub key: PartitionKey,
    pub rows: Vec<Row>,
}

/// One successfully written partition.
#[derive(Debug, Clone)]
pub struct WrittenPartition {
    pub key: PartitionKey,
    pub path: PathBuf,
    pub rows: usize,
    pub symbols: usize,
}

/// Outcome of a write call: written partitions plus isolated failures.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: Vec<WrittenPartition>,
    pub failed: Vec<(PartitionKey, WriteError)>,
}

impl WriteReport {
    pub fn rows_written(&self) -> usize {
        self.written.iter().map(|p| p.rows).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sidecar describing what the writer has produced under a root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub updated_at: Option<DateTime<Utc>>,
    pub partitions: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub key: String,
    pub path: String,
    pub rows: usize,
    pub symbols: usize,
    pub blake3: String,
    pub written_at: DateTime<Utc>,
}

/// Groups rows by a date-derived key and writes one Parquet file per key.
#[derive(Debug, Clone)]
pub struct PartitionWriter {
    root: PathBuf,
    date_column: String,
    filename: String,
    scheme: PartitionScheme,
    mode: WriteMode,
}

impl PartitionWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            date_column: "date".into(),
            filename: DEFAULT_FILENAME.into(),
            scheme: PartitionScheme::Year,
            mode: WriteMode::Overwrite,
        }
    }

    pub fn with_scheme(mut self, scheme: PartitionScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a partition: `{root}/year=YYYY[/month=MM]/{filename}`.
    pub fn partition_path(&self, key: &PartitionKey) -> PathBuf {
        self.root.join(key.relative_dir()).join(&self.filename)
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    /// Partition key of one row, or `None` when its date column is absent
    /// or not a date.
    pub fn key_for(&self, row: &Row) -> Option<PartitionKey> {
        row.get(&self.date_column)
            .and_then(Scalar::as_date)
            .map(|date| self.scheme.key_for(date))
    }

    /// Group rows by partition key, ascending; row order within a key is kept.
    pub fn partition(&self, rows: &[Row]) -> Result<Vec<Partition>, WriteError> {
        let mut groups: BTreeMap<PartitionKey, Vec<Row>> = BTreeMap::new();
        for row in rows {
            let key = self
                .key_for(row)
                .ok_or_else(|| WriteError::MissingPartitionField {
                    symbol: row.symbol().to_string(),
                    column: self.date_column.clone(),
                })?;
            groups.entry(key).or_default().push(row.clone());
        }
        Ok(groups
            .into_iter()
            .map(|(key, rows)| Partition { key, rows })
            .collect())
    }

    /// Partition `rows` and write every partition.
    ///
    /// Fails outright only if the root cannot be created or a row has no
    /// partition date. Per-partition failures land in the report.
    pub fn write(&self, rows: &[Row]) -> Result<WriteReport, WriteError> {
        fs::create_dir_all(&self.root).map_err(|source| WriteError::CreateRoot {
            path: self.root.clone(),
            source,
        })?;

        let partitions = self.partition(rows)?;
        let mut report = WriteReport::default();

        for partition in &partitions {
            match self.write_partition(partition) {
                Ok(written) => {
                    tracing::info!(
                        key = %written.key,
                        rows = written.rows,
                        path = %written.path.display(),
                        "partition written"
                    );
                    report.written.push(written);
                }
                Err(e) => {
                    tracing::warn!(key = %partition.key, error = %e, "partition write failed");
                    report.failed.push((partition.key, e));
                }
            }
        }

        if !report.written.is_empty() {
            if let Err(e) = self.update_manifest(&report.written) {
                tracing::warn!(error = %e, "manifest update failed");
            }
        }

        Ok(report)
    }

    fn write_partition(&self, partition: &Partition) -> Result<WrittenPartition, WriteError> {
        let path = self.partition_path(&partition.key);
        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| WriteError::Io { path: dir, source })?;

        let merged;
        let rows: &[Row] = if self.mode == WriteMode::Upsert && path.exists() {
            merged = self.merge_existing(&path, &partition.rows)?;
            &merged
        } else {
            &partition.rows
        };

        let mut df = rows_to_dataframe(rows)?;
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;

        // Atomic rename replaces any previous file for this key.
        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            WriteError::Io {
                path: path.clone(),
                source,
            }
        })?;

        Ok(WrittenPartition {
            key: partition.key,
            path,
            rows: rows.len(),
            symbols: rows.iter().map(Row::symbol).collect::<BTreeSet<_>>().len(),
        })
    }

    /// Existing rows not superseded by `incoming`, followed by `incoming`.
    fn merge_existing(&self, path: &Path, incoming: &[Row]) -> Result<Vec<Row>, WriteError> {
        let file = fs::File::open(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let existing = ParquetReader::new(file)
            .finish()
            .map_err(|e| WriteError::Parquet(format!("read {}: {e}", path.display())))?;
        let existing = dataframe_to_rows(&existing)?;

        let key = |row: &Row| {
            (
                row.symbol().to_string(),
                row.get(&self.date_column).and_then(Scalar::as_date),
            )
        };
        let replaced: HashSet<_> = incoming.iter().map(key).collect();
        let before = existing.len();
        let mut merged: Vec<Row> = existing
            .into_iter()
            .filter(|row| !replaced.contains(&key(row)))
            .collect();
        tracing::debug!(
            path = %path.display(),
            kept = merged.len(),
            replaced = before - merged.len(),
            added = incoming.len(),
            "upsert merge"
        );
        merged.extend(incoming.iter().cloned());
        Ok(merged)
    }

    /// Read a written partition back.
    pub fn read(&self, key: &PartitionKey) -> Result<DataFrame, WriteError> {
        let path = self.partition_path(key);
        let file = fs::File::open(&path).map_err(|source| WriteError::Io { path, source })?;
        ParquetReader::new(file)
            .finish()
            .map_err(|e| WriteError::Parquet(format!("read: {e}")))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILENAME)
    }

    /// Load the manifest sidecar, if one exists and parses.
    pub fn load_manifest(&self) -> Option<PartitionManifest> {
        let content = fs::read_to_string(self.manifest_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn update_manifest(&self, written: &[WrittenPartition]) -> Result<(), WriteError> {
        let now = Utc::now();
        let mut manifest = self.load_manifest().unwrap_or_default();

        for w in written {
            let bytes = fs::read(&w.path).map_err(|source| WriteError::Io {
                path: w.path.clone(),
                source,
            })?;
            let relative = w
                .path
                .strip_prefix(&self.root)
                .unwrap_or(&w.path)
                .to_string_lossy()
                .replace('\\', "/");

            let entry = ManifestEntry {
                key: w.key.to_string(),
                path: relative,
                rows: w.rows,
                symbols: w.symbols,
                blake3: blake3::hash(&bytes).to_hex().to_string(),
                written_at: now,
            };
            match manifest.partitions.iter_mut().find(|e| e.path == entry.path) {
                Some(existing) => *existing = entry,
                None => manifest.partitions.push(entry),
            }
        }

        manifest.partitions.sort_by(|a, b| a.path.cmp(&b.path));
        manifest.updated_at = Some(now);

        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| WriteError::Serialize(format!("manifest: {e}")))?;
        let path = self.manifest_path();
        fs::write(&path, json).map_err(|source| WriteError::Io { path, source })
    }
}

// ── Row → DataFrame conversion ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Date,
    Int,
    Float,
    Str,
}

/// Infer a column type from its non-null values.
fn infer_kind<'a>(values: impl Iterator<Item = &'a Scalar>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values {
        let this = match value {
            Scalar::Date(_) => ColumnKind::Date,
            Scalar::Int(_) => ColumnKind::Int,
            Scalar::Float(_) => ColumnKind::Float,
            Scalar::Str(_) => ColumnKind::Str,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Str,
        });
    }
    kind.unwrap_or(ColumnKind::Str)
}

/// Build a DataFrame from rows. Columns appear in first-seen order; values a
/// row does not carry become nulls. A `symbol` column is added from the row
/// tag when no row provides one.
pub fn rows_to_dataframe(rows: &[Row]) -> Result<DataFrame, WriteError> {
    let mut names: Vec<&str> = Vec::new();
    for row in rows {
        for name in row.columns() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    let mut columns = Vec::with_capacity(names.len() + 1);

    for name in &names {
        let cells: Vec<Option<&Scalar>> = rows.iter().map(|r| r.get(name)).collect();
        let column = match infer_kind(cells.iter().flatten().copied()) {
            ColumnKind::Date => {
                let days: Vec<Option<i32>> = cells
                    .iter()
                    .map(|c| c.and_then(Scalar::as_date).map(|d| (d - epoch).num_days() as i32))
                    .collect();
                Column::new((*name).into(), days)
                    .cast(&DataType::Date)
                    .map_err(|e| WriteError::Parquet(format!("date cast for '{name}': {e}")))?
            }
            ColumnKind::Int => {
                let values: Vec<Option<i64>> = cells
                    .iter()
                    .map(|c| match c {
                        Some(Scalar::Int(v)) => Some(*v),
                        _ => None,
                    })
                    .collect();
                Column::new((*name).into(), values)
            }
            ColumnKind::Float => {
                let values: Vec<Option<f64>> = cells
                    .iter()
                    .map(|c| c.and_then(Scalar::as_f64))
                    .collect();
                Column::new((*name).into(), values)
            }
            ColumnKind::Str => {
                let values: Vec<Option<String>> =
                    cells.iter().map(|c| c.map(|v| v.to_string())).collect();
                Column::new((*name).into(), values)
            }
        };
        columns.push(column);
    }

    if !names.contains(&"symbol") {
        let symbols: Vec<&str> = rows.iter().map(Row::symbol).collect();
        columns.push(Column::new("symbol".into(), symbols));
    }

    DataFrame::new(columns).map_err(|e| WriteError::Parquet(format!("dataframe creation: {e}")))
}

/// Convert a DataFrame back into rows. Nulls become absent fields and the
/// row tag comes from the `symbol` column.
pub fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<Row>, WriteError> {
    let map_err = |e: PolarsError| WriteError::Parquet(format!("column read: {e}"));
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    let mut fields: Vec<Vec<(String, Scalar)>> = vec![Vec::new(); df.height()];

    for column in df.get_columns() {
        let name = column.name().to_string();
        match column.dtype() {
            DataType::Date => {
                let ca = column.date().map_err(map_err)?;
                for (i, row) in fields.iter_mut().enumerate() {
                    if let Some(days) = ca.get(i) {
                        let date = epoch + chrono::Duration::days(days as i64);
                        row.push((name.clone(), Scalar::Date(date)));
                    }
                }
            }
            DataType::Int64 => {
                let ca = column.i64().map_err(map_err)?;
                for (i, row) in fields.iter_mut().enumerate() {
                    if let Some(v) = ca.get(i) {
                        row.push((name.clone(), Scalar::Int(v)));
                    }
                }
            }
            DataType::Float64 => {
                let ca = column.f64().map_err(map_err)?;
                for (i, row) in fields.iter_mut().enumerate() {
                    if let Some(v) = ca.get(i) {
                        row.push((name.clone(), Scalar::Float(v)));
                    }
                }
            }
            _ => {
                let strings = column.cast(&DataType::String).map_err(map_err)?;
                let ca = strings.str().map_err(map_err)?;
                for (i, row) in fields.iter_mut().enumerate() {
                    if let Some(v) = ca.get(i) {
                        row.push((name.clone(), Scalar::Str(v.to_string())));
                    }
                }
            }
        }
    }

    Ok(fields
        .into_iter()
        .map(|fields| {
            let symbol = fields
                .iter()
                .find(|(column, _)| column == "symbol")
                .and_then(|(_, value)| value.as_str())
                .unwrap_or_default()
                .to_string();
            fields
                .into_iter()
                .fold(Row::new(symbol), |row, (column, value)| row.with(column, value))
        })
        .collect())
}

/// Write a DataFrame to a Snappy-compressed Parquet file.
fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), WriteError> {
    let file = fs::File::create(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)
        .map_err(|e| WriteError::Parquet(format!("write {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn price_row(symbol: &str, date: NaiveDate, close: f64) -> Row {
        Row::new(symbol)
            .with("date", Scalar::Date(date))
            .with("close", Scalar::Float(close))
            .with("volume", Scalar::Int(100))
            .with("symbol", Scalar::Str(symbol.into()))
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn groups_by_year_in_key_order() {
        let writer = PartitionWriter::new("unused");
        let rows = vec![
            price_row("A", d(2024, 1, 2), 1.0),
            price_row("A", d(2023, 12, 29), 2.0),
            price_row("B", d(2024, 1, 3), 3.0),
        ];
        let parts = writer.partition(&rows).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].key.to_string(), "2023");
        assert_eq!(parts[1].key.to_string(), "2024");
        assert_eq!(parts[1].rows.len(), 2);
        assert_eq!(parts[1].rows[0].symbol(), "A");
        assert_eq!(parts[1].rows[1].symbol(), "B");
    }

    #[test]
    fn year_month_layout() {
        let writer = PartitionWriter::new("/data").with_scheme(PartitionScheme::YearMonth);
        let key = PartitionScheme::YearMonth.key_for(d(2024, 3, 15));
        assert_eq!(key.to_string(), "2024-03");
        assert_eq!(
            writer.partition_path(&key),
            PathBuf::from("/data/year=2024/month=03/prices.parquet")
        );
    }

    #[test]
    fn missing_date_is_an_error() {
        let writer = PartitionWriter::new("unused");
        let rows = vec![Row::new("A").with("close", Scalar::Float(1.0))];
        assert!(matches!(
            writer.partition(&rows),
            Err(WriteError::MissingPartitionField { .. })
        ));
    }

    #[test]
    fn key_for_needs_a_date_value() {
        let writer = PartitionWriter::new("unused").with_date_column("payment_date");
        let dated = Row::new("A").with("payment_date", Scalar::Date(d(2023, 11, 16)));
        let as_text = Row::new("A").with("payment_date", Scalar::Str("2023-13-01".into()));
        assert_eq!(
            writer.key_for(&dated),
            Some(PartitionKey { year: 2023, month: None })
        );
        assert_eq!(writer.key_for(&as_text), None);
        assert_eq!(writer.key_for(&Row::new("A")), None);
        assert_eq!(writer.date_column(), "payment_date");
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PartitionWriter::new(dir.path());
        let rows = vec![
            price_row("A", d(2023, 12, 29), 1.0),
            price_row("A", d(2024, 1, 2), 2.0),
            price_row("B", d(2024, 1, 2), 3.0),
        ];

        let report = writer.write(&rows).unwrap();
        assert!(report.all_succeeded());
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.rows_written(), 3);

        let path = dir.path().join("year=2024").join("prices.parquet");
        assert!(path.exists());
        assert!(!path.with_extension("parquet.tmp").exists());

        let df = writer.read(&PartitionKey { year: 2024, month: None }).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("volume").unwrap().dtype(), &DataType::Int64);

        let manifest = writer.load_manifest().unwrap();
        assert_eq!(manifest.partitions.len(), 2);
        assert_eq!(manifest.partitions[1].path, "year=2024/prices.parquet");
        assert_eq!(manifest.partitions[1].symbols, 2);
        assert_eq!(manifest.partitions[1].blake3.len(), 64);
    }

    #[test]
    fn rewrite_replaces_partition() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PartitionWriter::new(dir.path());
        let key = PartitionKey { year: 2024, month: None };

        writer
            .write(&[
                price_row("A", d(2024, 1, 2), 1.0),
                price_row("A", d(2024, 1, 3), 1.0),
            ])
            .unwrap();
        writer.write(&[price_row("B", d(2024, 2, 1), 9.0)]).unwrap();

        let df = writer.read(&key).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(writer.load_manifest().unwrap().partitions.len(), 1);
    }

    #[test]
    fn upsert_keeps_rows_not_in_new_batch() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PartitionWriter::new(dir.path()).with_mode(WriteMode::Upsert);
        let key = PartitionKey { year: 2024, month: None };

        writer
            .write(&[
                price_row("A", d(2024, 1, 2), 1.0),
                price_row("A", d(2024, 1, 3), 1.0),
            ])
            .unwrap();
        let report = writer
            .write(&[
                price_row("A", d(2024, 1, 3), 5.0),
                price_row("B", d(2024, 1, 3), 9.0),
            ])
            .unwrap();
        assert_eq!(report.rows_written(), 3);

        let rows = dataframe_to_rows(&writer.read(&key).unwrap()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("date"), Some(&Scalar::Date(d(2024, 1, 2))));
        assert_eq!(rows[1].get("close"), Some(&Scalar::Float(5.0)));
        assert_eq!(rows[2].symbol(), "B");
        assert_eq!(writer.load_manifest().unwrap().partitions[0].symbols, 2);
    }

    #[test]
    fn dataframe_round_trip_drops_nulls() {
        let rows = vec![
            Row::new("A")
                .with("date", Scalar::Date(d(2024, 1, 2)))
                .with("value", Scalar::Float(0.24))
                .with("symbol", Scalar::Str("A".into())),
            Row::new("B")
                .with("date", Scalar::Date(d(2024, 1, 3)))
                .with("currency", Scalar::Str("USD".into()))
                .with("symbol", Scalar::Str("B".into())),
        ];
        let back = dataframe_to_rows(&rows_to_dataframe(&rows).unwrap()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].symbol(), "A");
        assert!(back[0].get("currency").is_none());
        assert!(back[1].get("value").is_none());
        assert_eq!(back[1].get("currency"), Some(&Scalar::Str("USD".into())));
    }

    #[test]
    fn uncreatable_root_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let writer = PartitionWriter::new(blocker.join("sub"));
        let rows = vec![price_row("A", d(2024, 1, 2), 1.0)];
        assert!(matches!(
            writer.write(&rows),
            Err(WriteError::CreateRoot { .. })
        ));
    }

    #[test]
    fn one_failed_partition_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PartitionWriter::new(dir.path());
        // A plain file where the 2023 directory should go.
        fs::write(dir.path().join("year=2023"), b"x").unwrap();

        let rows = vec![
            price_row("A", d(2023, 6, 1), 1.0),
            price_row("A", d(2024, 6, 3), 2.0),
        ];
        let report = writer.write(&rows).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.year, 2023);
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.written[0].key.year, 2024);
    }

    #[test]
    fn sparse_rows_become_nulls() {
        let rows = vec![
            Row::new("A")
                .with("date", Scalar::Date(d(2024, 1, 2)))
                .with("value", Scalar::Float(0.24)),
            Row::new("B")
                .with("date", Scalar::Date(d(2024, 1, 3)))
                .with("currency", Scalar::Str("USD".into())),
        ];
        let df = rows_to_dataframe(&rows).unwrap();
        assert_eq!(df.width(), 4);
        assert_eq!(df.column("value").unwrap().null_count(), 1);
        assert_eq!(df.column("currency").unwrap().null_count(), 1);
        assert_eq!(df.column("symbol").unwrap().null_count(), 0);
    }

    #[test]
    fn mixed_numeric_widens_to_float() {
        let kind = infer_kind([Scalar::Int(1), Scalar::Float(1.5)].iter());
        assert_eq!(kind, ColumnKind::Float);
        let kind = infer_kind([Scalar::Int(1), Scalar::Str("x".into())].iter());
        assert_eq!(kind, ColumnKind::Str);
    }

    fn arb_rows() -> impl Strategy<Value = Vec<Row>> {
        prop::collection::vec(
            ("[A-E]", 2019i32..2025, 1u32..13, 1u32..29, 1.0..500.0_f64),
            0..60,
        )
        .prop_map(|specs| {
            specs
                .into_iter()
                .map(|(sym, y, m, day, close)| price_row(&sym, d(y, m, day), close))
                .collect()
        })
    }

    proptest! {
        /// Every row lands in exactly one partition, under the right key.
        #[test]
        fn partitions_are_complete_and_disjoint(
            rows in arb_rows(),
            monthly in any::<bool>(),
        ) {
            let scheme = if monthly { PartitionScheme::YearMonth } else { PartitionScheme::Year };
            let writer = PartitionWriter::new("unused").with_scheme(scheme);
            let parts = writer.partition(&rows).unwrap();

            let total: usize = parts.iter().map(|p| p.rows.len()).sum();
            prop_assert_eq!(total, rows.len());

            let mut keys = BTreeSet::new();
            for part in &parts {
                prop_assert!(keys.insert(part.key));
                for row in &part.rows {
                    let date = row.get("date").and_then(Scalar::as_date).unwrap();
                    prop_assert_eq!(scheme.key_for(date), part.key);
                }
            }

            // Multiset equality: each original row is matched exactly once.
            let mut remaining: Vec<&Row> = parts.iter().flat_map(|p| p.rows.iter()).collect();
            for row in &rows {
                let idx = remaining.iter().position(|r| *r == row);
                prop_assert!(idx.is_some());
                remaining.swap_remove(idx.unwrap());
            }
            prop_assert!(remaining.is_empty());
        }
    }
}
