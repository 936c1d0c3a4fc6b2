//! Technical indicators module
//!
//! Moving averages come from the `ta` crate; the ATR uses Wilder smoothing.
//! [`IndicatorEngine`] recomputes the whole snapshot from each candle batch.

pub mod atr;
pub mod sma;

pub use atr::*;
pub use sma::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::data::{Candle, CandleSeries};
use crate::error::ConfigError;

/// Indicator trait for all indicators
pub trait Indicator {
    /// Value consumed per update
    type Input;

    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new value
    fn update(&mut self, input: Self::Input);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}

/// Moving-average value for one configured period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaValue {
    pub period: usize,
    pub value: f64,
}

/// Indicators computed from one candle batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// One entry per configured MA period, in configuration order
    pub ma_values: Vec<MaValue>,
    /// Trend filter MA
    pub trend_ma: f64,
    /// Wilder ATR, `None` when it came out zero or NaN
    pub atr: Option<f64>,
    /// Close of the newest bar
    pub last_close: f64,
    /// Close of the bar before the newest one
    pub prev_close: f64,
    /// Open time of the newest bar
    pub as_of: DateTime<Utc>,
}

impl IndicatorSnapshot {
    /// Short human-readable form for logs
    pub fn describe(&self) -> String {
        let mas = self
            .ma_values
            .iter()
            .map(|ma| format!("MA{}={:.2}", ma.period, ma.value))
            .collect::<Vec<_>>()
            .join(", ");
        let atr = self
            .atr
            .map(|a| format!("{:.4}", a))
            .unwrap_or_else(|| "invalid".to_string());
        format!("{}, trend MA={:.2}, ATR={}", mas, self.trend_ma, atr)
    }
}

/// Outcome of feeding a candle batch to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorUpdate {
    Ready(IndicatorSnapshot),
    InsufficientData { have: usize, need: usize },
}

/// Owns the rolling indicator snapshot
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: RiskConfig,
    snapshot: Option<IndicatorSnapshot>,
    prev_ma_values: Option<Vec<MaValue>>,
}

impl IndicatorEngine {
    /// Create an engine for a validated configuration
    pub fn new(config: RiskConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            snapshot: None,
            prev_ma_values: None,
        })
    }

    /// Candles needed before a snapshot can be produced
    pub fn required_candles(&self) -> usize {
        self.config.min_candles()
    }

    /// Recompute all indicators from a candle batch in any order.
    ///
    /// On success the previous snapshot's MA values become `prev_ma_values`.
    /// A short batch leaves the current snapshot untouched.
    pub fn update(&mut self, candles: Vec<Candle>) -> IndicatorUpdate {
        let need = self.required_candles();
        if candles.len() < need {
            return IndicatorUpdate::InsufficientData {
                have: candles.len(),
                need,
            };
        }

        let series = CandleSeries::chronological(candles);
        let closes = series.closes();

        let ma_values = self
            .config
            .ma_periods
            .iter()
            .map(|&period| MaValue {
                period,
                value: sma_of_last(&closes, period).unwrap_or(f64::NAN),
            })
            .collect();
        let trend_ma = sma_of_last(&closes, self.config.trend_ma_period).unwrap_or(f64::NAN);
        let atr = wilder_atr(series.candles(), self.config.atr_period).and_then(valid_atr);

        // `need >= 2` is guaranteed by atr_period + 1, so both bars exist
        let (last_close, as_of) = series
            .last()
            .map(|c| (c.close, c.open_time))
            .unwrap_or((f64::NAN, Utc::now()));
        let prev_close = series.prev_close().unwrap_or(f64::NAN);

        let snapshot = IndicatorSnapshot {
            ma_values,
            trend_ma,
            atr,
            last_close,
            prev_close,
            as_of,
        };

        if let Some(previous) = self.snapshot.take() {
            self.prev_ma_values = Some(previous.ma_values);
        }
        self.snapshot = Some(snapshot.clone());

        IndicatorUpdate::Ready(snapshot)
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> Option<&IndicatorSnapshot> {
        self.snapshot.as_ref()
    }

    /// MA values from the snapshot before the latest one
    pub fn prev_ma_values(&self) -> Option<&[MaValue]> {
        self.prev_ma_values.as_deref()
    }

    /// Latest valid ATR
    pub fn atr(&self) -> Option<f64> {
        self.snapshot.as_ref().and_then(|s| s.atr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn small_config() -> RiskConfig {
        RiskConfig {
            ma_periods: vec![2, 3, 4],
            trend_ma_period: 5,
            atr_period: 3,
            ..RiskConfig::default()
        }
    }

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Candle::new(
                    base + Duration::minutes(i as i64),
                    close,
                    close + 1.0,
                    close - 1.0,
                    close,
                    5.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let mut engine = IndicatorEngine::new(small_config()).unwrap();
        let result = engine.update(candles_from_closes(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(result, IndicatorUpdate::InsufficientData { have: 4, need: 5 });
        assert!(engine.snapshot().is_none());
    }

    #[test]
    fn test_snapshot_values() {
        let mut engine = IndicatorEngine::new(small_config()).unwrap();
        let result = engine.update(candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));

        let snapshot = match result {
            IndicatorUpdate::Ready(s) => s,
            other => panic!("expected snapshot, got {:?}", other),
        };
        let values: Vec<f64> = snapshot.ma_values.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![5.5, 5.0, 4.5]);
        assert_eq!(snapshot.trend_ma, 4.0);
        assert_eq!(snapshot.last_close, 6.0);
        assert_eq!(snapshot.prev_close, 5.0);
        assert!(snapshot.atr.is_some());
        assert!(engine.prev_ma_values().is_none());
    }

    #[test]
    fn test_newest_first_batch_matches_chronological() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut forward = IndicatorEngine::new(small_config()).unwrap();
        let mut backward = IndicatorEngine::new(small_config()).unwrap();

        let mut reversed = candles_from_closes(&closes);
        reversed.reverse();

        assert_eq!(
            forward.update(candles_from_closes(&closes)),
            backward.update(reversed)
        );
    }

    #[test]
    fn test_previous_ma_values_are_retained() {
        let mut engine = IndicatorEngine::new(small_config()).unwrap();
        engine.update(candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        engine.update(candles_from_closes(&[2.0, 3.0, 4.0, 5.0, 6.0, 7.0]));

        let prev: Vec<f64> = engine
            .prev_ma_values()
            .unwrap()
            .iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(prev, vec![5.5, 5.0, 4.5]);
        assert_eq!(engine.snapshot().unwrap().ma_values[0].value, 6.5);
    }

    #[test]
    fn test_flat_bars_give_invalid_atr() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let flat: Vec<Candle> = (0..6)
            .map(|i| Candle::new(base + Duration::minutes(i), 10.0, 10.0, 10.0, 10.0, 0.0))
            .collect();
        let mut engine = IndicatorEngine::new(small_config()).unwrap();

        match engine.update(flat) {
            IndicatorUpdate::Ready(snapshot) => assert_eq!(snapshot.atr, None),
            other => panic!("expected snapshot, got {:?}", other),
        }
        assert_eq!(engine.atr(), None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = RiskConfig {
            ma_periods: vec![5],
            ..RiskConfig::default()
        };
        assert!(IndicatorEngine::new(config).is_err());
    }
}
