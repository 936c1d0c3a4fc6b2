//! Risk and indicator configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Index into `ma_periods` of the medium-term MA used by the entry confirmation rule.
pub const CONFIRMATION_MA_INDEX: usize = 2;

/// Indicator periods and risk parameters. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Moving-average periods, shortest first (e.g. `[5, 10, 30]`)
    pub ma_periods: Vec<usize>,
    /// Period of the trend filter MA
    pub trend_ma_period: usize,
    /// ATR smoothing period
    pub atr_period: usize,
    /// Stop distance in ATRs
    pub atr_multiplier: f64,
    /// Take-profit distance in ATRs
    pub take_profit_multiplier: f64,
    /// Equity risked per trade, in percent (1.0 = 1%)
    pub risk_percent: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            ma_periods: vec![5, 10, 30],
            trend_ma_period: 60,
            atr_period: 14,
            atr_multiplier: 2.0,
            take_profit_multiplier: 3.0,
            risk_percent: 1.0,
        }
    }
}

impl RiskConfig {
    /// Minimum number of candles needed before any indicator can be computed.
    pub fn min_candles(&self) -> usize {
        let longest_ma = self.ma_periods.iter().copied().max().unwrap_or(0);
        longest_ma
            .max(self.trend_ma_period)
            .max(self.atr_period + 1)
    }

    /// Check the invariants the indicator and signal code rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ma_periods.len() <= CONFIRMATION_MA_INDEX {
            return Err(ConfigError::TooFewMaPeriods {
                required: CONFIRMATION_MA_INDEX + 1,
                got: self.ma_periods.len(),
            });
        }
        if self.ma_periods.iter().any(|&p| p == 0) {
            return Err(ConfigError::ZeroPeriod("ma_periods"));
        }
        if self.trend_ma_period == 0 {
            return Err(ConfigError::ZeroPeriod("trend_ma_period"));
        }
        if self.atr_period == 0 {
            return Err(ConfigError::ZeroPeriod("atr_period"));
        }

        for (field, value) in [
            ("atr_multiplier", self.atr_multiplier),
            ("take_profit_multiplier", self.take_profit_multiplier),
            ("risk_percent", self.risk_percent),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        Ok(())
    }
}
