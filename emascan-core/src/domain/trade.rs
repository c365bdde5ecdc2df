//! Open-trade lifecycle.
//!
//! An open trade is a signal row still present in the open-trades table. Its
//! state is never stored: each monitoring pass derives it from the latest price
//! and either drops the row (terminal state) or keeps it untouched.

use super::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a tracked signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    Open,
    HitTarget1,
    HitTarget2,
    HitTarget3,
    HitStop,
}

impl TradeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TradeState::Open)
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeState::Open => "Open",
            TradeState::HitTarget1 => "Target1",
            TradeState::HitTarget2 => "Target2",
            TradeState::HitTarget3 => "Target3",
            TradeState::HitStop => "Stop-Loss",
        };
        f.write_str(s)
    }
}

/// A signal being tracked until a target or the stop is touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenTrade(pub Signal);

impl OpenTrade {
    pub fn signal(&self) -> &Signal {
        &self.0
    }

    pub fn instrument(&self) -> &str {
        &self.0.instrument
    }

    /// Decide the trade's state against the latest traded price.
    ///
    /// Checked in strict priority order: Target3, Target2, Target1, then the
    /// stop. The first level crossed wins. NaN prices leave the trade open.
    pub fn assess(&self, latest: f64) -> TradeState {
        let s = &self.0;
        if latest.is_nan() {
            TradeState::Open
        } else if latest >= s.target3 {
            TradeState::HitTarget3
        } else if latest >= s.target2 {
            TradeState::HitTarget2
        } else if latest >= s.target1 {
            TradeState::HitTarget1
        } else if latest <= s.stop_loss {
            TradeState::HitStop
        } else {
            TradeState::Open
        }
    }
}

impl From<Signal> for OpenTrade {
    fn from(signal: Signal) -> Self {
        Self(signal)
    }
}

/// A trade that reached a terminal state during a monitoring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub trade: OpenTrade,
    pub state: TradeState,
    pub price: f64,
}

impl Resolution {
    /// Human-readable resolution notice.
    pub fn announcement(&self) -> String {
        let icon = if self.state == TradeState::HitStop {
            "❌"
        } else {
            "🎯"
        };
        format!(
            "{icon} {} hit {}: {:.2}",
            self.trade.instrument(),
            self.state,
            self.price
        )
    }
}
