//! Data ingestion: provider client, tickers, partitioned storage, checkpoints

pub mod checkpoint;
pub mod decode;
pub mod documents;
pub mod eodhd;
pub mod partition;
pub mod provider;
pub mod rate_limiter;
pub mod tickers;
pub mod validate;

pub use checkpoint::CheckpointStore;
pub use documents::{DocumentReport, DocumentWriter};
pub use eodhd::{EodhdClient, DEFAULT_BASE_URL};
pub use partition::{
    dataframe_to_rows, rows_to_dataframe, Partition, PartitionKey, PartitionManifest,
    PartitionScheme, PartitionWriter, WriteMode, WriteReport, WrittenPartition,
};
pub use provider::{FetchProgress, HistoricalProvider, SilentProgress, TracingProgress};
pub use rate_limiter::RateLimiter;
pub use tickers::TickerSource;
