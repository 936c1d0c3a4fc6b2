//! Periodic trade-count health check

use std::time::Duration;
use tokio::time::Instant;

/// Severity of a health report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthLevel {
    /// Nothing traded in the window
    NoTrades,
    /// Traded, but less than expected
    BelowMinimum,
    Healthy,
}

/// Summary of one reporting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub trades: u32,
    pub window: Duration,
    pub level: HealthLevel,
}

impl HealthReport {
    pub fn message(&self) -> String {
        let minutes = self.window.as_secs() / 60;
        match self.level {
            HealthLevel::NoTrades => format!("No trades in the last {} minutes", minutes),
            HealthLevel::BelowMinimum => format!(
                "Only {} trade(s) in the last {} minutes",
                self.trades, minutes
            ),
            HealthLevel::Healthy => {
                format!("{} trades in the last {} minutes", self.trades, minutes)
            }
        }
    }
}

/// Counts fills per window
#[derive(Debug, Clone)]
pub struct TradeHealth {
    interval: Duration,
    min_trades: u32,
    window_start: Instant,
    trades: u32,
}

impl TradeHealth {
    pub fn new(interval: Duration, min_trades: u32, now: Instant) -> Self {
        Self {
            interval,
            min_trades,
            window_start: now,
            trades: 0,
        }
    }

    pub fn record_trade(&mut self) {
        self.trades = self.trades.saturating_add(1);
    }

    /// Close the window if it has elapsed and return its report
    pub fn maybe_report(&mut self, now: Instant) -> Option<HealthReport> {
        let window = now.saturating_duration_since(self.window_start);
        if window < self.interval {
            return None;
        }

        let level = if self.trades == 0 {
            HealthLevel::NoTrades
        } else if self.trades < self.min_trades {
            HealthLevel::BelowMinimum
        } else {
            HealthLevel::Healthy
        };
        let report = HealthReport {
            trades: self.trades,
            window,
            level,
        };

        self.trades = 0;
        self.window_start = now;
        Some(report)
    }
}
