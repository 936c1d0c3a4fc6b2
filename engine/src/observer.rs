//! Presentation hooks
//!
//! The loop reports through an [`Observer`] and never waits on it.

use tracing::{debug, error, info, warn};

use crate::portfolio::PositionSummary;

/// Severity of an observer message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Receives human-facing updates from the strategy loop
pub trait Observer: Send + Sync {
    fn log(&self, message: &str, level: LogLevel);

    fn update_balance(&self, balance: f64, floating_profit: f64, total_value: f64);

    fn update_positions(&self, positions: &[PositionSummary]);
}

/// Observer that writes everything through `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn log(&self, message: &str, level: LogLevel) {
        match level {
            LogLevel::Debug => debug!(target: "strategy", "{}", message),
            LogLevel::Info => info!(target: "strategy", "{}", message),
            LogLevel::Warn => warn!(target: "strategy", "{}", message),
            LogLevel::Error => error!(target: "strategy", "{}", message),
        }
    }

    fn update_balance(&self, balance: f64, floating_profit: f64, total_value: f64) {
        info!(
            target: "strategy",
            balance,
            floating_profit,
            total_value,
            "balance updated"
        );
    }

    fn update_positions(&self, positions: &[PositionSummary]) {
        if positions.is_empty() {
            info!(target: "strategy", "no open positions");
            return;
        }
        for p in positions {
            info!(
                target: "strategy",
                "{} {} contracts @ {:.2} | SL {:.2} TP {:.2} | uPnL {:.2}{}",
                p.side,
                p.contracts,
                p.entry_price,
                p.stop_loss_price,
                p.take_profit_price,
                p.unrealized_pnl,
                if p.closing { " (closing)" } else { "" }
            );
        }
    }
}
