//! Trend/MA-stack entry rules
//!
//! Buy when price sits above the trend filter and every configured MA, and the
//! previous bar closed at or below the prior medium-term MA, i.e. the move
//! emerged from below it. Sell mirrors every comparison. Buy is checked first.

use tracing::debug;

use crate::config::CONFIRMATION_MA_INDEX;
use crate::indicators::{IndicatorSnapshot, MaValue};
use crate::strategy::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Long,
    Short,
}

impl Direction {
    /// `a` is strictly beyond `b` in this direction
    fn beyond(self, a: f64, b: f64) -> bool {
        match self {
            Direction::Long => a > b,
            Direction::Short => a < b,
        }
    }

    fn word(self) -> &'static str {
        match self {
            Direction::Long => "above",
            Direction::Short => "below",
        }
    }
}

enum Verdict {
    Pass(Vec<String>),
    Fail(String),
}

/// Turns price and indicators into a Buy/Sell/Hold decision
#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator;

impl SignalEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the entry rules at `current_price`.
    ///
    /// Missing or invalid inputs always produce Hold.
    pub fn evaluate(
        &self,
        current_price: f64,
        snapshot: &IndicatorSnapshot,
        prev_ma_values: Option<&[MaValue]>,
    ) -> Signal {
        let confirmation = match Self::check_inputs(current_price, snapshot, prev_ma_values) {
            Ok(ma) => ma,
            Err(reason) => return Signal::hold(current_price, vec![reason]),
        };

        let buy = Self::check(Direction::Long, current_price, snapshot, confirmation);
        let buy_reason = match buy {
            Verdict::Pass(reasons) => return Signal::buy(current_price, reasons),
            Verdict::Fail(reason) => reason,
        };

        match Self::check(Direction::Short, current_price, snapshot, confirmation) {
            Verdict::Pass(reasons) => Signal::sell(current_price, reasons),
            Verdict::Fail(sell_reason) => {
                debug!(buy = %buy_reason, sell = %sell_reason, "no entry signal");
                Signal::hold(
                    current_price,
                    vec![format!("buy: {}", buy_reason), format!("sell: {}", sell_reason)],
                )
            }
        }
    }

    /// Validate everything the rules read; returns the prior medium-term MA.
    fn check_inputs(
        price: f64,
        snapshot: &IndicatorSnapshot,
        prev_ma_values: Option<&[MaValue]>,
    ) -> Result<MaValue, String> {
        if !price.is_finite() || price <= 0.0 {
            return Err("current price unavailable".to_string());
        }
        if snapshot.atr.is_none() {
            return Err("ATR unavailable".to_string());
        }
        if !snapshot.trend_ma.is_finite() {
            return Err("trend MA unavailable".to_string());
        }
        if let Some(ma) = snapshot.ma_values.iter().find(|ma| !ma.value.is_finite()) {
            return Err(format!("MA{} unavailable", ma.period));
        }
        if !snapshot.prev_close.is_finite() {
            return Err("previous close unavailable".to_string());
        }

        let prev = prev_ma_values.ok_or_else(|| "no previous indicator snapshot".to_string())?;
        match prev.get(CONFIRMATION_MA_INDEX) {
            Some(ma) if ma.value.is_finite() => Ok(*ma),
            Some(ma) => Err(format!("previous MA{} unavailable", ma.period)),
            None => Err("previous snapshot lacks the confirmation MA".to_string()),
        }
    }

    fn check(
        direction: Direction,
        price: f64,
        snapshot: &IndicatorSnapshot,
        confirmation: MaValue,
    ) -> Verdict {
        let word = direction.word();

        if !direction.beyond(price, snapshot.trend_ma) {
            return Verdict::Fail(format!(
                "price {:.2} not {} trend MA {:.2}",
                price, word, snapshot.trend_ma
            ));
        }

        if let Some(ma) = snapshot
            .ma_values
            .iter()
            .find(|ma| !direction.beyond(price, ma.value))
        {
            return Verdict::Fail(format!(
                "price {:.2} not {} MA{} {:.2}",
                price, word, ma.period, ma.value
            ));
        }

        // the previous bar must not already have been beyond the prior medium-term MA
        if direction.beyond(snapshot.prev_close, confirmation.value) {
            return Verdict::Fail(format!(
                "previous close {:.2} already {} MA{} {:.2}",
                snapshot.prev_close, word, confirmation.period, confirmation.value
            ));
        }

        Verdict::Pass(vec![
            format!("price {:.2} {} trend MA {:.2}", price, word, snapshot.trend_ma),
            format!("price {} all {} MAs", word, snapshot.ma_values.len()),
            format!(
                "previous close {:.2} crossed from the other side of MA{} {:.2}",
                snapshot.prev_close, confirmation.period, confirmation.value
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Decision;
    use chrono::Utc;

    fn ma(values: [f64; 3]) -> Vec<MaValue> {
        [5, 10, 30]
            .iter()
            .zip(values)
            .map(|(&period, value)| MaValue { period, value })
            .collect()
    }

    fn snapshot(mas: [f64; 3], trend: f64, prev_close: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ma_values: ma(mas),
            trend_ma: trend,
            atr: Some(10.0),
            last_close: prev_close,
            prev_close,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn test_buy_when_breaking_out_from_below() {
        let evaluator = SignalEvaluator::new();
        let snap = snapshot([100.0, 99.0, 98.0], 95.0, 97.0);
        let prev = ma([99.0, 98.5, 98.0]);

        let signal = evaluator.evaluate(101.0, &snap, Some(&prev));
        assert_eq!(signal.decision, Decision::Buy);
        assert_eq!(signal.reasons.len(), 3);
    }

    #[test]
    fn test_no_buy_when_previous_close_already_above() {
        let evaluator = SignalEvaluator::new();
        let snap = snapshot([100.0, 99.0, 98.0], 95.0, 99.0);
        let prev = ma([99.0, 98.5, 98.0]);

        let signal = evaluator.evaluate(101.0, &snap, Some(&prev));
        assert_eq!(signal.decision, Decision::Hold);
        assert!(signal.reason_text().contains("already above MA30"));
    }

    #[test]
    fn test_sell_mirrors_buy() {
        let evaluator = SignalEvaluator::new();
        let snap = snapshot([100.0, 101.0, 102.0], 105.0, 103.0);
        let prev = ma([101.0, 101.5, 102.0]);

        let signal = evaluator.evaluate(99.0, &snap, Some(&prev));
        assert_eq!(signal.decision, Decision::Sell);
    }

    #[test]
    fn test_price_between_mas_holds() {
        let evaluator = SignalEvaluator::new();
        let snap = snapshot([100.0, 99.0, 98.0], 95.0, 97.0);
        let prev = ma([99.0, 98.5, 98.0]);

        let signal = evaluator.evaluate(99.5, &snap, Some(&prev));
        assert_eq!(signal.decision, Decision::Hold);
        assert!(signal.reason_text().contains("not above MA5"));
    }

    #[test]
    fn test_invalid_inputs_force_hold() {
        let evaluator = SignalEvaluator::new();
        let prev = ma([99.0, 98.5, 98.0]);

        let mut no_atr = snapshot([100.0, 99.0, 98.0], 95.0, 97.0);
        no_atr.atr = None;
        assert_eq!(
            evaluator.evaluate(101.0, &no_atr, Some(&prev)).reasons,
            vec!["ATR unavailable".to_string()]
        );

        let nan_trend = snapshot([100.0, 99.0, 98.0], f64::NAN, 97.0);
        assert_eq!(
            evaluator.evaluate(101.0, &nan_trend, Some(&prev)).decision,
            Decision::Hold
        );

        let nan_ma = snapshot([100.0, f64::NAN, 98.0], 95.0, 97.0);
        assert_eq!(
            evaluator.evaluate(101.0, &nan_ma, Some(&prev)).reasons,
            vec!["MA10 unavailable".to_string()]
        );

        let good = snapshot([100.0, 99.0, 98.0], 95.0, 97.0);
        assert_eq!(evaluator.evaluate(101.0, &good, None).decision, Decision::Hold);
        assert_eq!(
            evaluator.evaluate(f64::NAN, &good, Some(&prev)).decision,
            Decision::Hold
        );
    }

    #[test]
    fn test_buy_and_sell_never_coincide() {
        let evaluator = SignalEvaluator::new();
        let levels = [90.0, 95.0, 100.0, 105.0, 110.0];

        for &price in &levels {
            for &m in &levels {
                for &trend in &levels {
                    for &prev_close in &levels {
                        for &prev_mid in &levels {
                            let snap = snapshot([m, m, m], trend, prev_close);
                            let prev = ma([prev_mid, prev_mid, prev_mid]);
                            let signal = evaluator.evaluate(price, &snap, Some(&prev));
                            let expected_buy = price > trend && price > m && prev_close <= prev_mid;
                            let expected_sell = !expected_buy
                                && price < trend
                                && price < m
                                && prev_close >= prev_mid;
                            let expected = if expected_buy {
                                Decision::Buy
                            } else if expected_sell {
                                Decision::Sell
                            } else {
                                Decision::Hold
                            };
                            assert_eq!(signal.decision, expected);
                        }
                    }
                }
            }
        }
    }
}
