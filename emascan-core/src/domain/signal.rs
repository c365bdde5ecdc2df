//! Emitted breakout signals with their stop-loss and profit targets.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bar interval a strategy variant is evaluated on.
///
/// The NSE source only serves daily history, so the intraday variants are
/// aliases of the daily series there. Other sources may serve real intraday bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "15min")]
    FifteenMinute,
    #[serde(rename = "1h")]
    OneHour,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::FifteenMinute, Timeframe::OneHour];

    /// Suffix used in strategy labels ("EMA50 Daily", "EMA50 15-min", "EMA50 1h").
    pub fn label_suffix(self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::FifteenMinute => "15-min",
            Timeframe::OneHour => "1h",
        }
    }

    /// Strategy label for a breakout over the given short EMA period.
    pub fn strategy_label(self, ema_short: usize) -> String {
        format!("EMA{ema_short} {}", self.label_suffix())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_suffix())
    }
}

/// A detected breakout: entry price, stop-loss and three ATR-spaced targets.
///
/// Field names map onto the persisted table columns
/// `Stock, Price, Strategy, SL, Target1, Target2, Target3, Date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "Stock")]
    pub instrument: String,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Strategy")]
    pub strategy_label: String,
    #[serde(rename = "SL")]
    pub stop_loss: f64,
    #[serde(rename = "Target1")]
    pub target1: f64,
    #[serde(rename = "Target2")]
    pub target2: f64,
    #[serde(rename = "Target3")]
    pub target3: f64,
    #[serde(rename = "Date", with = "emitted_at_format")]
    pub emitted_at: NaiveDateTime,
}

impl Signal {
    pub fn targets(&self) -> [f64; 3] {
        [self.target1, self.target2, self.target3]
    }

    /// Human-readable announcement sent when the signal is emitted.
    pub fn announcement(&self) -> String {
        format!(
            "{} - {} | Price: {:.2} | SL: {:.2} | Targets: {:.2},{:.2},{:.2}",
            self.instrument,
            self.strategy_label,
            self.price,
            self.stop_loss,
            self.target1,
            self.target2,
            self.target3
        )
    }
}

/// Table date column codec.
///
/// Writes `2024-01-02 15:45:01.123456`. Reads that form plus the `T`-separated
/// ISO form and fraction-less variants, which older tables contain.
pub mod emitted_at_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
    const READ_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d",
    ];

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        READ_FORMATS.iter().find_map(|fmt| {
            NaiveDateTime::parse_from_str(raw, fmt).ok().or_else(|| {
                chrono::NaiveDate::parse_from_str(raw, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(WRITE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unrecognised date: {raw}")))
    }
}
