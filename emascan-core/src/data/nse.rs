//! NSE historical equity provider.
//!
//! Fetches daily bars from NSE's `historical/cm/equity` JSON endpoint. The
//! endpoint refuses requests without the cookies the home page hands out, so
//! the client keeps a cookie store and primes it before the first request and
//! again whenever the session is rejected.
//!
//! NSE has no intraday history endpoint. The 15-minute and 1-hour timeframes
//! are served from the daily series; `fetch_timeframes` downloads it once per
//! instrument and hands the same bars to every requested timeframe.

use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DateRange, PriceSource};
use crate::domain::{PriceBar, PriceSeries, Timeframe};

pub const NSE_BASE_URL: &str = "https://www.nseindia.com";

const USER_AGENT: &str = "Mozilla/5.0";
const SESSION_TTL: Duration = Duration::from_secs(5 * 60);
const DATE_FORMATS: [&str; 3] = ["%d-%b-%Y", "%Y-%m-%d", "%Y-%m-%dT%H:%M:%S%.fZ"];

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    data: Option<Vec<Map<String, Value>>>,
}

/// Candidate keys per column, in priority order.
///
/// `historical/cm/equity` rows carry both `CH_TIMESTAMP` and `mTIMESTAMP`;
/// older payloads use plain lowercase names.
const DATE_KEYS: [&str; 3] = ["CH_TIMESTAMP", "mTIMESTAMP", "date"];
const OPEN_KEYS: [&str; 2] = ["CH_OPENING_PRICE", "open"];
const HIGH_KEYS: [&str; 2] = ["CH_TRADE_HIGH_PRICE", "high"];
const LOW_KEYS: [&str; 2] = ["CH_TRADE_LOW_PRICE", "low"];
const CLOSE_KEYS: [&str; 2] = ["CH_CLOSING_PRICE", "close"];
const VOLUME_KEYS: [&str; 2] = ["CH_TOT_TRADED_QTY", "volume"];

fn pick<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| row.get(*k))
}

/// Numbers arrive as JSON numbers or strings depending on the endpoint
/// version; anything unparseable becomes NaN and is rejected by the evaluator.
fn lenient_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

fn parse_row(symbol: &str, row: &Map<String, Value>) -> Result<PriceBar, DataError> {
    let raw_date = pick(row, &DATE_KEYS)
        .and_then(Value::as_str)
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("row without date for {symbol}")))?;
    let date = parse_date(raw_date).ok_or_else(|| {
        DataError::ResponseFormatChanged(format!("bad date '{raw_date}' for {symbol}"))
    })?;

    let price = |keys: &[&str], column: &str| {
        pick(row, keys).map(lenient_f64).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("row without {column} for {symbol}"))
        })
    };
    let volume = pick(row, &VOLUME_KEYS).map_or(0.0, lenient_f64);

    Ok(PriceBar {
        date,
        open: price(&OPEN_KEYS, "open")?,
        high: price(&HIGH_KEYS, "high")?,
        low: price(&LOW_KEYS, "low")?,
        close: price(&CLOSE_KEYS, "close")?,
        volume: if volume.is_finite() && volume > 0.0 {
            volume as u64
        } else {
            0
        },
    })
}

/// Parse a history payload into a date-ordered series.
pub fn parse_history(symbol: &str, body: &str) -> Result<PriceSeries, DataError> {
    let resp: HistoryResponse = serde_json::from_str(body).map_err(|e| {
        DataError::ResponseFormatChanged(format!("failed to parse history for {symbol}: {e}"))
    })?;
    let rows = resp
        .data
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("no `data` field for {symbol}")))?;

    let bars = rows
        .iter()
        .map(|row| parse_row(symbol, row))
        .collect::<Result<Vec<_>, _>>()?;

    // NSE returns newest first
    Ok(PriceSeries::from_unsorted(symbol, bars))
}

/// NSE provider backed by a blocking, cookie-keeping HTTP client.
pub struct NseProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
    primed_at: Mutex<Option<Instant>>,
}

impl NseProvider {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, DataError> {
        Self::with_base_url(NSE_BASE_URL, circuit_breaker, timeout, max_retries)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, DataError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            circuit_breaker,
            max_retries,
            base_delay: Duration::from_millis(500),
            primed_at: Mutex::new(None),
        })
    }

    /// Delay before the first retry; doubles on each further attempt.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn history_url(&self, symbol: &str, range: DateRange) -> Result<Url, DataError> {
        let from = range.start.format("%d-%m-%Y").to_string();
        let to = range.end.format("%d-%m-%Y").to_string();
        Url::parse_with_params(
            &format!("{}/api/historical/cm/equity", self.base_url),
            [
                ("symbol", symbol),
                ("series", r#"["EQ"]"#),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ],
        )
        .map_err(|e| DataError::Other(format!("bad history url for {symbol}: {e}")))
    }

    /// Visit the home page so the cookie store holds a fresh session.
    fn prime_session(&self, force: bool) {
        let mut primed_at = self
            .primed_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let fresh = (*primed_at).is_some_and(|t| t.elapsed() < SESSION_TTL);
        if fresh && !force {
            return;
        }
        match self.client.get(&self.base_url).send() {
            Ok(_) => *primed_at = Some(Instant::now()),
            // the history call reports the real failure
            Err(e) => tracing::debug!(error = %e, "session priming failed"),
        }
    }

    fn fetch_daily(&self, symbol: &str, range: DateRange) -> Result<PriceSeries, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.history_url(symbol, range)?;
        let mut last_error = None;
        let mut force_prime = false;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self
                    .base_delay
                    .saturating_mul(2u32.saturating_pow(attempt - 1));
                std::thread::sleep(backoff);
            }
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            self.prime_session(force_prime);
            force_prime = false;

            let resp = match self.client.get(url.clone()).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.circuit_breaker.record_failure();
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();
            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == reqwest::StatusCode::UNAUTHORIZED {
                force_prime = true;
                last_error = Some(DataError::AuthenticationRequired(format!(
                    "session cookie rejected for {symbol}"
                )));
                continue;
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::RateLimited);
                continue;
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Http {
                    status: status.as_u16(),
                    symbol: symbol.to_string(),
                });
                continue;
            }

            let body = resp
                .text()
                .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;
            let series = parse_history(symbol, &body)?;
            self.circuit_breaker.record_success();
            return Ok(series);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl PriceSource for NseProvider {
    fn name(&self) -> &str {
        "nse"
    }

    fn fetch(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        range: DateRange,
    ) -> Result<PriceSeries, DataError> {
        self.fetch_daily(symbol, range)
    }

    fn fetch_timeframes(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
        range: DateRange,
    ) -> Vec<(Timeframe, Result<PriceSeries, DataError>)> {
        if timeframes.is_empty() {
            return Vec::new();
        }
        let daily = self.fetch_daily(symbol, range);
        timeframes.iter().map(|&tf| (tf, daily.clone())).collect()
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
