//! Scanner configuration.
//!
//! One `ScannerConfig` is loaded from TOML at startup, overridden from the
//! environment where credentials are concerned, validated, and then handed to
//! each component's constructor. Every section falls back to defaults, so an
//! empty file is a valid configuration.

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::Timeframe;

pub const ENV_TELEGRAM_TOKEN: &str = "EMASCAN_TELEGRAM_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "EMASCAN_TELEGRAM_CHAT_ID";
pub const ENV_MAX_WORKERS: &str = "EMASCAN_MAX_WORKERS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Breakout rule parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub ema_short: usize,
    pub ema_medium: usize,
    pub ema_long: usize,
    pub atr_period: usize,
    /// Half-width of the band around EMA-short the previous close must sit in (0.05 = ±5%).
    pub ema_tolerance: f64,
    /// Minimum bullish body as a fraction of the open (0.005 = 0.5%).
    pub strong_green_pct: f64,
    /// Series shorter than this are skipped.
    pub min_candles: usize,
    /// Bars in the window over which EMA-short must have risen.
    pub trend_lookback: usize,
    /// Bars whose lowest low becomes the stop-loss.
    pub stop_lookback: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            ema_short: 50,
            ema_medium: 100,
            ema_long: 200,
            atr_period: 14,
            ema_tolerance: 0.05,
            strong_green_pct: 0.005,
            min_candles: 60,
            trend_lookback: 5,
            stop_lookback: 5,
        }
    }
}

/// Upper bound for `scan.max_retries`.
pub const MAX_RETRIES: u32 = 10;

/// Fan-out and provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub max_workers: usize,
    /// Pause each worker takes after finishing an instrument.
    pub batch_delay_ms: u64,
    /// First date of the history requested for every instrument.
    pub history_start: NaiveDate,
    pub fetch_timeout_secs: u64,
    pub max_retries: u32,
    pub timeframes: Vec<Timeframe>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_workers: 10,
            batch_delay_ms: 100,
            history_start: NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid literal date"),
            fetch_timeout_secs: 30,
            max_retries: 2,
            timeframes: Timeframe::ALL.to_vec(),
        }
    }
}

impl ScanSettings {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub signal_log: PathBuf,
    pub open_trades: PathBuf,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            signal_log: PathBuf::from("buy_signals.csv"),
            open_trades: PathBuf::from("open_trades.csv"),
        }
    }
}

/// Where the instrument list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseSource {
    /// NSE's published Nifty 500 constituents list.
    Nifty500,
    /// A local TOML or plain-text file (see `UniverseConfig::path`).
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub source: UniverseSource,
    pub path: Option<PathBuf>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            source: UniverseSource::Nifty500,
            path: None,
        }
    }
}

/// Daily trigger for scheduled mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    /// IANA zone the time is expressed in.
    pub timezone: String,
    pub poll_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: "15:45".into(),
            timezone: "Asia/Kolkata".into(),
            poll_secs: 60,
        }
    }
}

impl ScheduleConfig {
    pub fn trigger_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.time, "%H:%M")
            .map_err(|e| ConfigError::Invalid(format!("schedule.time '{}': {e}", self.time)))
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Invalid(format!("schedule.timezone '{}': {e}", self.timezone)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    /// Token and chat id, when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.token.as_deref(), self.chat_id.as_deref()) {
            (Some(t), Some(c)) if !t.is_empty() && !c.is_empty() => Some((t, c)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for the daily-rolling JSON log; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "emascan=info,warn".into(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub strategy: StrategyParams,
    pub scan: ScanSettings,
    pub tables: TableConfig,
    pub universe: UniverseConfig,
    pub schedule: ScheduleConfig,
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

impl ScannerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `EMASCAN_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(token) = lookup(ENV_TELEGRAM_TOKEN) {
            self.telegram.token = Some(token);
        }
        if let Some(chat_id) = lookup(ENV_TELEGRAM_CHAT_ID) {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(raw) = lookup(ENV_MAX_WORKERS) {
            self.scan.max_workers = raw
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("{ENV_MAX_WORKERS}='{raw}': {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if s.ema_short == 0 || s.atr_period == 0 {
            return invalid("indicator periods must be >= 1".into());
        }
        if !(s.ema_short < s.ema_medium && s.ema_medium < s.ema_long) {
            return invalid(format!(
                "EMA periods must satisfy short < medium < long, got {} / {} / {}",
                s.ema_short, s.ema_medium, s.ema_long
            ));
        }
        if !(0.0..1.0).contains(&s.ema_tolerance) {
            return invalid(format!("ema_tolerance {} outside [0, 1)", s.ema_tolerance));
        }
        if !(s.strong_green_pct >= 0.0 && s.strong_green_pct.is_finite()) {
            return invalid(format!("strong_green_pct {} must be >= 0", s.strong_green_pct));
        }
        if s.trend_lookback < 2 || s.stop_lookback < 1 {
            return invalid("trend_lookback must be >= 2 and stop_lookback >= 1".into());
        }
        // the evaluator reads the previous bar and both trailing windows
        let needed = s.trend_lookback.max(s.stop_lookback).max(2);
        if s.min_candles < needed {
            return invalid(format!("min_candles must be >= {needed}"));
        }

        if self.scan.max_workers == 0 {
            return invalid("scan.max_workers must be >= 1".into());
        }
        if self.scan.max_retries > MAX_RETRIES {
            return invalid(format!(
                "scan.max_retries {} exceeds {MAX_RETRIES}",
                self.scan.max_retries
            ));
        }
        if self.scan.timeframes.is_empty() {
            return invalid("scan.timeframes must not be empty".into());
        }
        if self.universe.source == UniverseSource::File && self.universe.path.is_none() {
            return invalid("universe.path is required when universe.source = \"file\"".into());
        }

        self.schedule.trigger_time()?;
        self.schedule.tz()?;
        if self.schedule.poll_secs == 0 {
            return invalid("schedule.poll_secs must be >= 1".into());
        }
        Ok(())
    }
}
