//! Row: the uniform tabular record every response shape is normalized into.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Scalar {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Scalar::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Column order of every price row.
pub const PRICE_COLUMNS: [&str; 8] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "adjusted_close",
    "volume",
    "symbol",
];

/// Flat, ordered column → value mapping tagged with its owning identifier.
///
/// Only columns the source provided are present; absent fields are not
/// null-filled at this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    symbol: String,
    fields: Vec<(String, Scalar)>,
}

impl Row {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: Scalar) -> Self {
        self.set(column, value);
        self
    }

    /// Insert or replace a column, keeping first-insertion order.
    pub fn set(&mut self, column: impl Into<String>, value: Scalar) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Remove a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Scalar> {
        let idx = self.fields.iter().position(|(name, _)| name == column)?;
        Some(self.fields.remove(idx).1)
    }

    /// Owning identifier (qualified code).
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> &[(String, Scalar)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut row = Row::new("AAPL.US")
            .with("date", Scalar::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()))
            .with("close", Scalar::Float(185.6));
        row.set("close", Scalar::Float(186.0));

        assert_eq!(row.len(), 2);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["date", "close"]);
        assert_eq!(row.get("close").and_then(Scalar::as_f64), Some(186.0));
    }

    #[test]
    fn remove_drops_column() {
        let mut row = Row::new("MSFT.US").with("volume", Scalar::Int(10));
        assert_eq!(row.remove("volume"), Some(Scalar::Int(10)));
        assert!(row.is_empty());
        assert_eq!(row.remove("volume"), None);
    }

    #[test]
    fn scalar_display() {
        let d = Scalar::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(d.to_string(), "2024-03-05");
        assert_eq!(Scalar::Int(7).as_f64(), Some(7.0));
    }
}
