//! Instrument universes.
//!
//! A universe is the list of NSE symbols one scan cycle covers. The default
//! is the Nifty 500 constituent list published by NSE; a local file can
//! replace it, either as sector tables in TOML or as one symbol per line.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::provider::DataError;

pub const NIFTY500_URL: &str = "https://archives.nseindia.com/content/indices/ind_nifty500list.csv";

/// Source of the instrument list for a scan cycle.
pub trait UniverseProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Ordered, de-duplicated symbols. An empty list is an error.
    fn instruments(&self) -> Result<Vec<String>, DataError>;
}

/// Trim, upper-case, drop blanks and repeats; keeps first-seen order.
pub fn normalize_symbols<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|s| s.as_ref().trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn non_empty(name: &str, symbols: Vec<String>) -> Result<Vec<String>, DataError> {
    if symbols.is_empty() {
        Err(DataError::Universe(format!("{name} universe is empty")))
    } else {
        Ok(symbols)
    }
}

/// A fixed list, mostly for tests and one-off runs.
#[derive(Debug, Clone)]
pub struct StaticUniverse {
    symbols: Vec<String>,
}

impl StaticUniverse {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: normalize_symbols(symbols),
        }
    }
}

impl UniverseProvider for StaticUniverse {
    fn name(&self) -> &str {
        "static"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        non_empty(self.name(), self.symbols.clone())
    }
}

#[derive(Debug, Deserialize)]
struct SectorFile {
    sectors: BTreeMap<String, Vec<String>>,
}

/// Parse a universe file.
///
/// TOML with a `[sectors]` table is flattened in sector-name order. Anything
/// else is read as a plain list: one symbol per line, `#` starts a comment.
pub fn parse_universe_file(content: &str) -> Result<Vec<String>, DataError> {
    if content.contains("[sectors]") {
        let file: SectorFile = toml::from_str(content)
            .map_err(|e| DataError::Universe(format!("parse universe TOML: {e}")))?;
        return Ok(normalize_symbols(file.sectors.into_values().flatten()));
    }
    Ok(normalize_symbols(content.lines().map(|line| {
        line.split_once('#').map_or(line, |(symbol, _)| symbol)
    })))
}

/// Universe read from a local file on every call.
#[derive(Debug, Clone)]
pub struct FileUniverse {
    path: PathBuf,
}

impl FileUniverse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UniverseProvider for FileUniverse {
    fn name(&self) -> &str {
        "file"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            DataError::Universe(format!("read universe file {}: {e}", self.path.display()))
        })?;
        non_empty(self.name(), parse_universe_file(&content)?)
    }
}

/// Extract the `Symbol` column from the Nifty 500 constituent CSV.
pub fn parse_nifty500_csv(body: &str) -> Result<Vec<String>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("constituent CSV header: {e}")))?;
    let column = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("symbol"))
        .ok_or_else(|| {
            DataError::ResponseFormatChanged("constituent CSV has no Symbol column".into())
        })?;

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| DataError::ResponseFormatChanged(format!("constituent CSV row: {e}")))?;
        if let Some(symbol) = record.get(column) {
            symbols.push(symbol.to_string());
        }
    }
    Ok(normalize_symbols(symbols))
}

/// The Nifty 500 index constituents, downloaded from NSE archives.
pub struct Nifty500Universe {
    client: reqwest::blocking::Client,
    url: String,
}

impl Nifty500Universe {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        Self::with_url(NIFTY500_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl UniverseProvider for Nifty500Universe {
    fn name(&self) -> &str {
        "nifty500"
    }

    fn instruments(&self) -> Result<Vec<String>, DataError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Universe(format!(
                "constituent list returned HTTP {}",
                status.as_u16()
            )));
        }
        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
        let symbols = parse_nifty500_csv(&body)?;
        tracing::debug!(count = symbols.len(), "loaded Nifty 500 constituents");
        non_empty(self.name(), symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalize_dedups_in_order() {
        let symbols = normalize_symbols([" tcs", "INFY", "", "TCS", "reliance "]);
        assert_eq!(symbols, vec!["TCS", "INFY", "RELIANCE"]);
    }

    #[test]
    fn nifty500_csv_symbol_column() {
        let body = "Company Name,Industry,Symbol,Series,ISIN Code\n\
                    3M India Ltd.,Diversified,3MINDIA,EQ,INE470A01017\n\
                    Aarti Drugs Ltd.,Healthcare,AARTIDRUGS,EQ,INE767A01016\n\
                    \"Bajaj Auto, Ltd.\",Automobile,BAJAJ-AUTO,EQ,INE917I01010\n";
        let symbols = parse_nifty500_csv(body).unwrap();
        assert_eq!(symbols, vec!["3MINDIA", "AARTIDRUGS", "BAJAJ-AUTO"]);
    }

    #[test]
    fn nifty500_csv_without_symbol_column() {
        let err = parse_nifty500_csv("Name,ISIN\nFoo,INE000\n").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }

    #[test]
    fn plain_list_with_comments() {
        let content = "# banks\nSBIN\nHDFCBANK  # private\n\nsbin\n";
        assert_eq!(
            parse_universe_file(content).unwrap(),
            vec!["SBIN", "HDFCBANK"]
        );
    }

    #[test]
    fn sector_toml_flattens_by_sector_name() {
        let content = r#"
[sectors]
IT = ["TCS", "INFY"]
Banks = ["SBIN", "TCS"]
"#;
        assert_eq!(
            parse_universe_file(content).unwrap(),
            vec!["SBIN", "TCS", "INFY"]
        );
    }

    #[test]
    fn file_universe_reads_and_rejects_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ITC\nLT").unwrap();
        let universe = FileUniverse::new(file.path());
        assert_eq!(universe.instruments().unwrap(), vec!["ITC", "LT"]);

        let empty = tempfile::NamedTempFile::new().unwrap();
        let err = FileUniverse::new(empty.path()).instruments().unwrap_err();
        assert!(matches!(err, DataError::Universe(_)));
    }

    #[test]
    fn missing_file_is_universe_error() {
        let err = FileUniverse::new("/nonexistent/universe.txt")
            .instruments()
            .unwrap_err();
        assert!(matches!(err, DataError::Universe(_)));
    }

    #[test]
    fn static_universe() {
        assert_eq!(
            StaticUniverse::new(["a", "b"]).instruments().unwrap(),
            vec!["A", "B"]
        );
        assert!(StaticUniverse::new(Vec::<String>::new()).instruments().is_err());
    }
}
