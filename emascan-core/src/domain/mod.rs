//! Domain types for EmaScan

pub mod bar;
pub mod signal;
pub mod trade;

pub use bar::{PriceBar, PriceSeries, SeriesError};
pub use signal::{Signal, Timeframe};
pub use trade::{OpenTrade, Resolution, TradeState};
