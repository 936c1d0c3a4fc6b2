//! ATR (Average True Range) with Wilder smoothing
//!
//! `ta::indicators::AverageTrueRange` smooths with an EMA (`2 / (n + 1)`), so
//! the recursive `(prev * (n - 1) + tr) / n` form is computed here directly.

use crate::data::Candle;
use crate::indicators::Indicator;

/// Streaming Wilder ATR
#[derive(Debug, Clone)]
pub struct WilderAtr {
    period: usize,
    prev_close: Option<f64>,
    update_count: usize,
    last_value: Option<f64>,
}

impl WilderAtr {
    /// Create new ATR indicator. Returns `None` for a zero period.
    pub fn new(period: usize) -> Option<Self> {
        if period == 0 {
            return None;
        }
        Some(Self {
            period,
            prev_close: None,
            update_count: 0,
            last_value: None,
        })
    }
}

impl Indicator for WilderAtr {
    type Input = Candle;

    fn name(&self) -> &str {
        "ATR"
    }

    fn update(&mut self, candle: Candle) {
        let tr = candle.true_range(self.prev_close);
        let n = self.period as f64;
        self.last_value = Some(match self.last_value {
            None => tr,
            Some(prev) => (prev * (n - 1.0) + tr) / n,
        });
        self.prev_close = Some(candle.close);
        self.update_count += 1;
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.update_count > self.period
    }
}

/// Wilder ATR of the newest bar in a chronological slice.
///
/// Returns the raw value, which may be zero or NaN for degenerate input; use
/// [`valid_atr`] before trading on it.
pub fn wilder_atr(candles: &[Candle], period: usize) -> Option<f64> {
    let mut atr = WilderAtr::new(period)?;
    for candle in candles {
        atr.update(*candle);
    }
    atr.value()
}

/// Filter out ATR values that cannot size a trade (zero, negative, NaN, infinite).
pub fn valid_atr(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fixture() -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let highs = [10.0, 12.0, 11.0, 13.0, 14.0];
        let lows = [9.0, 10.0, 9.0, 11.0, 12.0];
        let closes = [9.5, 11.0, 10.0, 12.0, 13.5];
        (0..5)
            .map(|i| {
                Candle::new(
                    base + Duration::minutes(i as i64),
                    closes[i],
                    highs[i],
                    lows[i],
                    closes[i],
                    1.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_true_ranges_fixture() {
        let candles = fixture();
        let ranges: Vec<f64> = candles
            .iter()
            .enumerate()
            .map(|(i, c)| c.true_range(i.checked_sub(1).map(|p| candles[p].close)))
            .collect();
        assert_eq!(ranges, vec![1.0, 2.5, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn test_wilder_atr_fixture() {
        // 1.0 -> 1.3 -> 1.44 -> 1.752 -> 1.8016
        let atr = wilder_atr(&fixture(), 5).unwrap();
        assert!((atr - 1.8016).abs() < 1e-12, "atr was {}", atr);
    }

    #[test]
    fn test_wilder_atr_is_order_dependent() {
        let mut reversed = fixture();
        reversed.reverse();
        let forward = wilder_atr(&fixture(), 5).unwrap();
        let backward = wilder_atr(&reversed, 5).unwrap();

        assert!((backward - 2.1792).abs() < 1e-12, "atr was {}", backward);
        assert!((forward - backward).abs() > 1e-6);
    }

    #[test]
    fn test_streaming_atr_readiness() {
        let mut atr = WilderAtr::new(3).unwrap();
        assert_eq!(atr.name(), "ATR");
        for candle in fixture().into_iter().take(3) {
            atr.update(candle);
        }
        assert!(!atr.is_ready());
        atr.update(fixture()[3]);
        assert!(atr.is_ready());
    }

    #[test]
    fn test_valid_atr() {
        assert_eq!(valid_atr(1.5), Some(1.5));
        assert_eq!(valid_atr(0.0), None);
        assert_eq!(valid_atr(f64::NAN), None);
        assert_eq!(valid_atr(f64::INFINITY), None);
        assert!(WilderAtr::new(0).is_none());
        assert_eq!(wilder_atr(&[], 5), None);
    }
}
