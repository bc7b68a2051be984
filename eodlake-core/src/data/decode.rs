//! Response decoding: provider CSV and JSON bodies into [`Row`]s.

use crate::domain::{Row, Scalar};
use chrono::NaiveDate;
use serde_json::Value;

/// Header the EOD price endpoint returns with `fmt=csv`.
pub const EOD_CSV_HEADER: [&str; 7] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Adjusted_close",
    "Volume",
];

/// Parse an EOD price CSV body into price rows tagged with `symbol`.
///
/// The header must match [`EOD_CSV_HEADER`] exactly. An empty body or a
/// header-only body decodes to zero rows.
pub fn parse_eod_csv(symbol: &str, body: &str) -> Result<Vec<Row>, String> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| format!("unreadable header: {e}"))?
        .clone();
    let found: Vec<&str> = headers.iter().collect();
    if found != EOD_CSV_HEADER {
        return Err(format!(
            "unexpected header {found:?}, expected {EOD_CSV_HEADER:?}"
        ));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("record {}: {e}", line + 1))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() != EOD_CSV_HEADER.len() {
            return Err(format!(
                "record {} has {} fields, expected {}",
                line + 1,
                record.len(),
                EOD_CSV_HEADER.len()
            ));
        }

        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d")
            .map_err(|e| format!("record {}: bad date '{}': {e}", line + 1, &record[0]))?;
        let num = |idx: usize| -> Result<f64, String> {
            let value = record[idx].parse::<f64>().map_err(|e| {
                format!(
                    "record {}: bad {} '{}': {e}",
                    line + 1,
                    EOD_CSV_HEADER[idx],
                    &record[idx]
                )
            })?;
            if !value.is_finite() {
                return Err(format!(
                    "record {}: non-finite {} '{}'",
                    line + 1,
                    EOD_CSV_HEADER[idx],
                    &record[idx]
                ));
            }
            Ok(value)
        };
        // Volume occasionally arrives as "1.2345E7".
        let volume = match record[6].parse::<i64>() {
            Ok(v) => v,
            Err(_) => num(6)?.round() as i64,
        };

        rows.push(
            Row::new(symbol)
                .with("date", Scalar::Date(date))
                .with("open", Scalar::Float(num(1)?))
                .with("high", Scalar::Float(num(2)?))
                .with("low", Scalar::Float(num(3)?))
                .with("close", Scalar::Float(num(4)?))
                .with("adjusted_close", Scalar::Float(num(5)?))
                .with("volume", Scalar::Int(volume))
                .with("symbol", Scalar::Str(symbol.to_string())),
        );
    }

    Ok(rows)
}

/// Parse a JSON array of flat objects (dividends, splits, macro series).
///
/// Scalars map to columns; `YYYY-MM-DD` strings become dates; nulls and
/// nested values are skipped, so each row is only as wide as its object.
pub fn parse_json_rows(symbol: &str, body: &str) -> Result<Vec<Row>, String> {
    let doc: Value = serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))?;
    let items = match doc {
        Value::Array(items) => items,
        // The provider answers an unknown symbol with `{}` on some endpoints.
        Value::Object(map) if map.is_empty() => Vec::new(),
        other => {
            return Err(format!(
                "expected a JSON array, got {}",
                json_type_name(&other)
            ))
        }
    };

    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let Value::Object(map) = item else {
            return Err(format!("element {idx} is not an object"));
        };
        let mut row = Row::new(symbol);
        for (key, value) in map {
            if let Some(scalar) = json_scalar(&value) {
                row.set(normalize_column(&key), scalar);
            }
        }
        row.set("symbol", Scalar::Str(symbol.to_string()));
        rows.push(row);
    }
    Ok(rows)
}

/// Parse a JSON document without reshaping it.
pub fn parse_json_document(body: &str) -> Result<Value, String> {
    serde_json::from_str(body).map_err(|e| format!("invalid JSON: {e}"))
}

fn json_scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Scalar::Date)
                .unwrap_or_else(|_| Scalar::Str(s.clone())),
        ),
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int)
            .or_else(|| n.as_f64().map(Scalar::Float)),
        Value::Bool(b) => Some(Scalar::Str(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// `declarationDate` → `declaration_date`, `CountryCode` → `country_code`.
fn normalize_column(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch == ' ' || ch == '-' {
            out.push('_');
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
