//! Ticker source: loads the identifier set to ingest.
//!
//! Input is plain text, one ticker per line. Blank lines and `#` comments
//! are ignored, every ticker is normalized, and duplicates are dropped
//! keeping the first occurrence. A `.SUFFIX` is read as the exchange, so
//! share classes are written with a dash (`BRK-B`).

use crate::domain::Identifier;
use crate::error::IngestError;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct TickerSource {
    default_exchange: Option<String>,
}

impl TickerSource {
    pub fn new(default_exchange: Option<&str>) -> Self {
        Self {
            default_exchange: default_exchange.map(str::to_string),
        }
    }

    pub fn default_exchange(&self) -> Option<&str> {
        self.default_exchange.as_deref()
    }

    /// Load a ticker file.
    pub fn from_file(&self, path: &Path) -> Result<Vec<Identifier>, IngestError> {
        let content = std::fs::read_to_string(path).map_err(|source| IngestError::TickerFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&content)
    }

    /// Parse newline-separated ticker text.
    pub fn parse(&self, content: &str) -> Result<Vec<Identifier>, IngestError> {
        self.from_lines(content.lines())
    }

    /// Normalize and de-duplicate raw lines.
    pub fn from_lines<'a, I>(&self, lines: I) -> Result<Vec<Identifier>, IngestError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let mut identifiers = Vec::new();

        for line in lines {
            let ticker = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            };
            let Some(id) = Identifier::normalize(ticker, self.default_exchange.as_deref()) else {
                continue;
            };
            if seen.insert(id.clone()) {
                identifiers.push(id);
            }
        }

        if identifiers.is_empty() {
            return Err(IngestError::Configuration(
                "ticker list is empty after removing blanks and comments".into(),
            ));
        }
        Ok(identifiers)
    }

    /// Re-qualify identifiers loaded from elsewhere (e.g. a checkpoint),
    /// de-duplicating the same way as [`TickerSource::from_lines`].
    pub fn normalize_all(&self, identifiers: &[Identifier]) -> Vec<Identifier> {
        let mut seen = HashSet::new();
        identifiers
            .iter()
            .map(|id| id.renormalize(self.default_exchange.as_deref()))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(ids: &[Identifier]) -> Vec<String> {
        ids.iter().map(Identifier::code).collect()
    }

    #[test]
    fn skips_blanks_and_comments() {
        let src = TickerSource::new(Some("US"));
        let ids = src
            .parse("# large caps\n\naapl\n  msft  # software\n#spy\n")
            .unwrap();
        assert_eq!(codes(&ids), vec!["AAPL.US", "MSFT.US"]);
    }

    #[test]
    fn deduplicates_preserving_order() {
        let src = TickerSource::new(Some("US"));
        let ids = src.parse("MSFT\nAAPL\nmsft\nAAPL.US\nGOOG\n").unwrap();
        assert_eq!(codes(&ids), vec!["MSFT.US", "AAPL.US", "GOOG.US"]);
    }

    #[test]
    fn empty_input_is_configuration_error() {
        let src = TickerSource::new(Some("US"));
        assert!(matches!(
            src.parse("# nothing here\n\n"),
            Err(IngestError::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let src = TickerSource::default();
        let err = src.from_file(Path::new("/nonexistent/tickers.txt")).unwrap_err();
        assert!(matches!(err, IngestError::TickerFile { .. }));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickers.txt");
        std::fs::write(&path, "AAPL\nMSFT\n").unwrap();
        let ids = TickerSource::default().from_file(&path).unwrap();
        assert_eq!(codes(&ids), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn normalize_all_is_idempotent() {
        let src = TickerSource::new(Some("US"));
        let ids = src.parse("AAPL\nMSFT\n").unwrap();
        assert_eq!(src.normalize_all(&ids), ids);
    }
}
