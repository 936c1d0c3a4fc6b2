//! Strategy loop configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RiskConfig;
use crate::error::ConfigError;

/// Timing and instrument settings for the strategy loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Instrument traded (e.g., "BTC-USDT-SWAP")
    pub inst_id: String,
    /// Number of 1m candles requested per indicator refresh
    pub kline_limit: usize,
    /// How often candles are re-fetched and indicators recomputed
    pub candle_update_interval: Duration,
    /// Maximum wait for the next market event before looping again
    pub queue_timeout: Duration,
    /// Sleep between pause checks while paused
    pub pause_poll: Duration,
    /// Sleep after a failed iteration
    pub fault_backoff: Duration,
    /// Pending orders still unresolved after this long are abandoned
    pub pending_order_timeout: Duration,
    /// Minimum spacing between pending-order sweeps
    pub order_sweep_interval: Duration,
    /// Number of status fetches per poll before the order is reported unknown
    pub poll_attempts: u32,
    /// Fixed delay between status fetches
    pub poll_delay: Duration,
    /// Positions younger than this are not risk-managed
    pub min_hold: Duration,
    /// Health summary interval
    pub report_interval: Duration,
    /// Trade count per report window below which a warning is emitted
    pub min_trades_per_report: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            inst_id: "BTC-USDT-SWAP".to_string(),
            kline_limit: 100,
            candle_update_interval: Duration::from_secs(60),
            queue_timeout: Duration::from_secs(5),
            pause_poll: Duration::from_secs(1),
            fault_backoff: Duration::from_secs(5),
            pending_order_timeout: Duration::from_secs(300),
            order_sweep_interval: Duration::from_secs(1),
            poll_attempts: 5,
            poll_delay: Duration::from_secs(1),
            min_hold: Duration::from_secs(5),
            report_interval: Duration::from_secs(1800),
            min_trades_per_report: 2,
        }
    }
}

impl StrategyConfig {
    /// Check that the candle request is large enough for the configured indicators.
    pub fn validate(&self, risk: &RiskConfig) -> Result<(), ConfigError> {
        let required = risk.min_candles();
        if self.kline_limit < required {
            return Err(ConfigError::KlineLimitTooSmall {
                limit: self.kline_limit,
                required,
            });
        }
        if self.poll_attempts == 0 {
            return Err(ConfigError::ZeroPeriod("poll_attempts"));
        }
        Ok(())
    }
}
