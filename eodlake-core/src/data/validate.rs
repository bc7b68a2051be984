//! Sanity checks for price rows.
//!
//! Suspicious rows are reported, not dropped: the provider is the source of
//! truth and downstream layers decide what to do with them.

use crate::domain::{Row, Scalar};

/// Price columns that must be present.
pub const REQUIRED_PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// Return a description of what is wrong with a price row, if anything.
pub fn validate_price_row(row: &Row) -> Option<String> {
    for column in REQUIRED_PRICE_COLUMNS {
        if row.get(column).is_none() {
            return Some(format!("missing column '{column}'"));
        }
    }

    let num = |c: &str| row.get(c).and_then(Scalar::as_f64).unwrap_or(f64::NAN);
    let (open, high, low, close) = (num("open"), num("high"), num("low"), num("close"));

    if [open, high, low, close].iter().any(|v| !v.is_finite()) {
        return Some("non-finite OHLC value".into());
    }
    if high < low {
        return Some(format!("high {high} < low {low}"));
    }
    if open <= 0.0 || close <= 0.0 {
        return Some(format!("non-positive price (open {open}, close {close})"));
    }
    None
}

/// Count suspicious rows, logging each one at debug level.
pub fn count_suspicious(rows: &[Row]) -> usize {
    rows.iter()
        .filter_map(|row| {
            validate_price_row(row).map(|problem| {
                tracing::debug!(symbol = row.symbol(), problem = %problem, "suspicious price row");
            })
        })
        .count()
}
