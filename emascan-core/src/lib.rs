//! EMA scanner core: domain types, indicators, the breakout evaluator, market
//! data providers, notifiers, and the CSV signal tables.
//!
//! - Domain types (price bars and series, signals, open trades)
//! - Indicator engine (EMA, ATR over True Range)
//! - `BreakoutEvaluator`, a pure function of one price series
//! - `PriceSource` / `UniverseProvider` traits with NSE implementations
//! - `Notifier` trait with Telegram and log sinks
//! - `SignalTable` CSV persistence
//!
//! Orchestration (worker pool, trade monitor, schedule) lives in
//! `emascan-runner`.

pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod notify;
pub mod signal;
pub mod store;
