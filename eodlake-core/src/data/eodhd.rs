//! EODHD data provider.
//!
//! Fetches end-of-day prices (CSV), fundamentals (nested JSON), dividends,
//! splits and macro indicators (JSON arrays). Every request waits on the
//! shared [`RateLimiter`] first. One attempt per call: transport and decode
//! problems come back as `FetchOutcome::Failure`, retries are left to the
//! checkpoint mechanism.

use super::decode::{parse_eod_csv, parse_json_document, parse_json_rows};
use super::provider::HistoricalProvider;
use super::rate_limiter::RateLimiter;
use crate::domain::{
    DateRange, FetchFailure, FetchOutcome, FetchRequest, Identifier, ResourceKind, Row,
};
use crate::error::IngestError;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://eodhd.com/api";

/// EODHD HTTP client.
pub struct EodhdClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_token: String,
    limiter: Arc<RateLimiter>,
}

impl EodhdClient {
    /// Build a client. The limiter is shared: clone the `Arc` into every
    /// client that talks to the same account.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self, IngestError> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(IngestError::Configuration("EODHD API token is empty".into()));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("eodlake/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Daily OHLCV rows for `identifier` over the inclusive range.
    pub fn eod_prices(
        &self,
        identifier: &Identifier,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchOutcome<Vec<Row>> {
        let code = identifier.code();
        let params = [
            ("from", start.format("%Y-%m-%d").to_string()),
            ("to", end.format("%Y-%m-%d").to_string()),
            ("period", "d".to_string()),
            ("fmt", "csv".to_string()),
        ];
        self.get_text(identifier, &format!("eod/{code}"), &params)
            .and_then(|body| {
                parse_eod_csv(&code, &body).map_err(|e| FetchFailure::decode(identifier, e))
            })
            .into()
    }

    /// Fundamentals document, optionally narrowed with an EODHD `filter`
    /// selector such as `Financials::Income_Statement::quarterly`.
    pub fn fundamentals(
        &self,
        identifier: &Identifier,
        section: Option<&str>,
    ) -> FetchOutcome<Value> {
        let mut params = vec![("fmt", "json".to_string())];
        if let Some(section) = section {
            params.push(("filter", section.to_string()));
        }
        self.get_text(identifier, &format!("fundamentals/{}", identifier.code()), &params)
            .and_then(|body| {
                parse_json_document(&body).map_err(|e| FetchFailure::decode(identifier, e))
            })
            .into()
    }

    pub fn dividends(
        &self,
        identifier: &Identifier,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchOutcome<Vec<Row>> {
        self.json_rows(identifier, "div", start, end)
    }

    pub fn splits(
        &self,
        identifier: &Identifier,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchOutcome<Vec<Row>> {
        self.json_rows(identifier, "splits", start, end)
    }

    /// Macro indicator series for a country (ISO-3 code, e.g. `USA`).
    ///
    /// The country is carried as the identifier so failures are bookkept
    /// like any other unit.
    pub fn macro_indicator(&self, country: &Identifier, indicator: &str) -> FetchOutcome<Vec<Row>> {
        let code = country.code();
        let params = [
            ("indicator", indicator.to_string()),
            ("fmt", "json".to_string()),
        ];
        self.get_text(country, &format!("macro-indicator/{code}"), &params)
            .and_then(|body| {
                parse_json_rows(&code, &body).map_err(|e| FetchFailure::decode(country, e))
            })
            .into()
    }

    fn json_rows(
        &self,
        identifier: &Identifier,
        endpoint: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchOutcome<Vec<Row>> {
        let code = identifier.code();
        let params = [
            ("from", start.format("%Y-%m-%d").to_string()),
            ("to", end.format("%Y-%m-%d").to_string()),
            ("fmt", "json".to_string()),
        ];
        self.get_text(identifier, &format!("{endpoint}/{code}"), &params)
            .and_then(|body| {
                parse_json_rows(&code, &body).map_err(|e| FetchFailure::decode(identifier, e))
            })
            .into()
    }

    /// Single rate-limited GET returning the body text.
    fn get_text(
        &self,
        identifier: &Identifier,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<String, FetchFailure> {
        let url = format!("{}/{path}", self.base_url);
        self.limiter.acquire();
        tracing::debug!(symbol = %identifier, url = %url, "GET");

        let resp = self
            .http
            .get(&url)
            .query(params)
            .query(&[("api_token", self.api_token.as_str())])
            .send()
            .map_err(|e| FetchFailure::transport(identifier, redact(&e.to_string(), &self.api_token)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(FetchFailure::transport(
                identifier,
                format!("HTTP {status}: {}", snippet.trim()),
            )
            .with_status(status.as_u16()));
        }

        resp.text()
            .map_err(|e| FetchFailure::decode(identifier, redact(&e.to_string(), &self.api_token)))
    }
}

/// Keep the API token out of error messages (reqwest embeds the URL).
fn redact(message: &str, token: &str) -> String {
    if token.is_empty() {
        message.to_string()
    } else {
        message.replace(token, "***")
    }
}

impl HistoricalProvider for EodhdClient {
    fn name(&self) -> &str {
        "eodhd"
    }

    fn fetch_rows(&self, request: &FetchRequest) -> FetchOutcome<Vec<Row>> {
        let DateRange { start, end } = request.range;
        let id = &request.identifier;
        match request.kind {
            ResourceKind::EodPrice => self.eod_prices(id, start, end),
            ResourceKind::Dividend => self.dividends(id, start, end),
            ResourceKind::Split => self.splits(id, start, end),
            ResourceKind::Macro => FetchOutcome::Failure(FetchFailure::decode(
                id,
                "macro series need an indicator name; use fetch_macro",
            )),
            ResourceKind::Fundamentals => FetchOutcome::Failure(FetchFailure::decode(
                id,
                "fundamentals are document-shaped; use fetch_document",
            )),
        }
    }

    fn fetch_document(&self, identifier: &Identifier, section: Option<&str>) -> FetchOutcome<Value> {
        self.fundamentals(identifier, section)
    }

    fn fetch_macro(&self, country: &Identifier, indicator: &str) -> FetchOutcome<Vec<Row>> {
        self.macro_indicator(country, indicator)
    }
}
