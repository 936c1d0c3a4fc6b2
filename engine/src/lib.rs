//! Swap-Engine: a trend-following strategy engine for a single perpetual swap
//!
//! This crate holds the trading core:
//! - [ta-rs](https://github.com/greyblake/ta-rs) moving averages plus a Wilder ATR
//! - entry signals from a trend filter and a moving-average stack
//! - risk-based position sizing in venue contracts
//! - an order lifecycle (submit, poll, classify) against an async venue API
//! - trailing stop-loss / take-profit management
//! - a pausable strategy loop fed by a bounded market-event queue
//!
//! Venue clients implement [`exchange::MarketApi`] and [`exchange::OrderApi`]
//! and push [`exchange::MarketEvent`]s into the loop's queue.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swap_engine::prelude::*;
//!
//! async fn start(
//!     market: Arc<dyn MarketApi>,
//!     orders: Arc<dyn OrderApi>,
//!     events: tokio::sync::mpsc::Receiver<MarketEvent>,
//! ) -> Result<()> {
//!     let (strategy, handle) = StrategyLoop::new(
//!         StrategyConfig::default(),
//!         RiskConfig::default(),
//!         market,
//!         orders,
//!         Arc::new(TracingObserver),
//!         events,
//!     )?;
//!     let task = tokio::spawn(strategy.run());
//!     handle.stop();
//!     task.await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod observer;
pub mod portfolio;
pub mod runner;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{RiskConfig, StrategyConfig, CONFIRMATION_MA_INDEX};
    pub use crate::data::*;
    pub use crate::error::*;
    pub use crate::exchange::*;
    pub use crate::indicators::*;
    pub use crate::observer::*;
    pub use crate::portfolio::*;
    pub use crate::runner::*;
    pub use crate::strategy::*;

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_paths_are_unambiguous() {
        // `risk` names the portfolio module; config items come in by name
        let reason: risk::ExitReason = ExitReason::StopLoss;
        assert_eq!(reason, risk::ExitReason::StopLoss);
        assert_eq!(CONFIRMATION_MA_INDEX, 2);
        assert!(RiskConfig::default().validate().is_ok());
        assert!(StrategyConfig::default()
            .validate(&RiskConfig::default())
            .is_ok());
    }
}
