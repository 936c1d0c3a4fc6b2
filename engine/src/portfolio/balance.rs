//! Balance management

use serde::{Deserialize, Serialize};

use crate::portfolio::Position;

/// Account balance as seen by the strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Available quote balance reported by the venue
    pub available: f64,
    /// Unrealized P&L of open positions at the last price
    pub floating_profit: f64,
    /// Available plus floating
    pub total: f64,
}

impl Balance {
    /// Create new balance
    pub fn new(available: f64) -> Self {
        Self {
            available,
            floating_profit: 0.0,
            total: available,
        }
    }

    /// Recompute floating profit from open positions
    pub fn mark_to_market(&mut self, positions: &[Position], price: f64) {
        self.floating_profit = if price.is_finite() && price > 0.0 {
            positions.iter().map(|p| p.unrealized_pnl(price)).sum()
        } else {
            0.0
        };
        self.total = self.available + self.floating_profit;
    }

    /// Replace the available balance, keeping floating profit
    pub fn set_available(&mut self, available: f64) {
        self.available = available;
        self.total = available + self.floating_profit;
    }

    /// Balance usable for sizing; `None` when missing or non-positive
    pub fn usable(&self) -> Option<f64> {
        (self.available.is_finite() && self.available > 0.0).then_some(self.available)
    }
}
