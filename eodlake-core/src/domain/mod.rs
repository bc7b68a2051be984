//! Domain types for the ingestion pipeline.

pub mod fetch;
pub mod identifier;
pub mod row;

pub use fetch::{DateRange, FailureKind, FetchFailure, FetchOutcome, FetchRequest, ResourceKind};
pub use identifier::Identifier;
pub use row::{Row, Scalar, PRICE_COLUMNS};
