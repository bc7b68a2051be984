//! Fetch requests and their outcomes.

use super::identifier::Identifier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which provider resource to pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    EodPrice,
    Fundamentals,
    Dividend,
    Split,
    Macro,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::EodPrice => "eod_price",
            ResourceKind::Fundamentals => "fundamentals",
            ResourceKind::Dividend => "dividend",
            ResourceKind::Split => "split",
            ResourceKind::Macro => "macro",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive calendar date range. `start <= end` is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// One unit of work for the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub identifier: Identifier,
    pub range: DateRange,
    pub kind: ResourceKind,
}

impl FetchRequest {
    pub fn new(identifier: Identifier, range: DateRange, kind: ResourceKind) -> Self {
        Self {
            identifier,
            range,
            kind,
        }
    }
}

/// Coarse failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connect/timeout/non-2xx.
    Transport,
    /// Body could not be decoded.
    Decode,
    /// Request succeeded but carried no records.
    NoData,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => f.write_str("transport"),
            FailureKind::Decode => f.write_str("decode"),
            FailureKind::NoData => f.write_str("no data"),
        }
    }
}

/// Why a single unit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub identifier: Identifier,
    pub kind: FailureKind,
    pub message: String,
    pub status: Option<u16>,
}

impl FetchFailure {
    pub fn transport(identifier: &Identifier, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.clone(),
            kind: FailureKind::Transport,
            message: message.into(),
            status: None,
        }
    }

    pub fn decode(identifier: &Identifier, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.clone(),
            kind: FailureKind::Decode,
            message: message.into(),
            status: None,
        }
    }

    pub fn no_data(identifier: &Identifier) -> Self {
        Self {
            identifier: identifier.clone(),
            kind: FailureKind::NoData,
            message: "provider returned no records".into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{}: {} error (HTTP {status}): {}",
                self.identifier, self.kind, self.message
            ),
            None => write!(f, "{}: {} error: {}", self.identifier, self.kind, self.message),
        }
    }
}

/// Result of one provider call. Never partially both.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success(T),
    Failure(FetchFailure),
}

impl<T> FetchOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Success(v) => FetchOutcome::Success(f(v)),
            FetchOutcome::Failure(e) => FetchOutcome::Failure(e),
        }
    }

    pub fn into_result(self) -> Result<T, FetchFailure> {
        match self {
            FetchOutcome::Success(v) => Ok(v),
            FetchOutcome::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, FetchFailure>> for FetchOutcome<T> {
    fn from(result: Result<T, FetchFailure>) -> Self {
        match result {
            Ok(v) => FetchOutcome::Success(v),
            Err(e) => FetchOutcome::Failure(e),
        }
    }
}
