//! Risk management for open positions
//!
//! Stops and targets are derived from the entry price and the current ATR and
//! only ever tighten. Exits trigger one percent beyond the level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RiskConfig;
use crate::portfolio::{Position, PositionSide};

const EXIT_BUFFER: f64 = 0.01;

/// Why a position is being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => f.write_str("stop loss"),
            ExitReason::TakeProfit => f.write_str("take profit"),
        }
    }
}

/// Close order the loop should place
#[derive(Debug, Clone, PartialEq)]
pub struct CloseRequest {
    pub position_id: Uuid,
    pub reason: ExitReason,
    /// Price that triggered the exit
    pub price: f64,
}

/// Trailing stop-loss / take-profit manager
#[derive(Debug, Clone)]
pub struct PositionRiskManager {
    atr_multiplier: f64,
    take_profit_multiplier: f64,
    min_hold: Duration,
}

impl PositionRiskManager {
    /// Create new risk manager
    pub fn new(config: &RiskConfig, min_hold: Duration) -> Self {
        Self {
            atr_multiplier: config.atr_multiplier,
            take_profit_multiplier: config.take_profit_multiplier,
            min_hold,
        }
    }

    /// Stop and target for a fresh position
    pub fn initial_levels(&self, side: PositionSide, entry: f64, atr: f64) -> (f64, f64) {
        let stop_distance = self.atr_multiplier * atr;
        let target_distance = self.take_profit_multiplier * atr;
        match side {
            PositionSide::Long => (entry - stop_distance, entry + target_distance),
            PositionSide::Short => (entry + stop_distance, entry - target_distance),
        }
    }

    /// Ratchet levels and collect exits.
    ///
    /// Positions younger than the minimum hold, or with a close already in
    /// flight, are left alone. Without a valid ATR levels stay where they are
    /// but exits are still checked.
    pub fn manage(
        &self,
        positions: &mut [Position],
        price: f64,
        atr: Option<f64>,
        now: Instant,
    ) -> Vec<CloseRequest> {
        if !price.is_finite() || price <= 0.0 {
            return Vec::new();
        }
        let atr = atr.filter(|a| a.is_finite() && *a > 0.0);

        let mut exits = Vec::new();
        for position in positions.iter_mut() {
            if position.is_closing() {
                continue;
            }
            if now.saturating_duration_since(position.opened_at) < self.min_hold {
                continue;
            }

            if let Some(atr) = atr {
                self.ratchet(position, atr);
            }

            if let Some(reason) = Self::exit_reason(position, price) {
                info!(
                    "{} triggered for {} position {} at {:.2} (stop {:.2}, target {:.2})",
                    reason,
                    position.side,
                    position.id,
                    price,
                    position.stop_loss_price,
                    position.take_profit_price
                );
                exits.push(CloseRequest {
                    position_id: position.id,
                    reason,
                    price,
                });
            }
        }
        exits
    }

    fn ratchet(&self, position: &mut Position, atr: f64) {
        let (stop, target) = self.initial_levels(position.side, position.entry_price, atr);
        let (new_stop, new_target) = match position.side {
            PositionSide::Long => (
                position.stop_loss_price.max(stop),
                position.take_profit_price.max(target),
            ),
            PositionSide::Short => (
                position.stop_loss_price.min(stop),
                position.take_profit_price.min(target),
            ),
        };

        if new_stop != position.stop_loss_price || new_target != position.take_profit_price {
            debug!(
                "Position {} levels: stop {:.2} -> {:.2}, target {:.2} -> {:.2}",
                position.id,
                position.stop_loss_price,
                new_stop,
                position.take_profit_price,
                new_target
            );
        }
        position.stop_loss_price = new_stop;
        position.take_profit_price = new_target;
    }

    fn exit_reason(position: &Position, price: f64) -> Option<ExitReason> {
        match position.side {
            PositionSide::Long => {
                if price <= position.stop_loss_price * (1.0 - EXIT_BUFFER) {
                    Some(ExitReason::StopLoss)
                } else if price >= position.take_profit_price * (1.0 + EXIT_BUFFER) {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                }
            }
            PositionSide::Short => {
                if price >= position.stop_loss_price * (1.0 + EXIT_BUFFER) {
                    Some(ExitReason::StopLoss)
                } else if price <= position.take_profit_price * (1.0 - EXIT_BUFFER) {
                    Some(ExitReason::TakeProfit)
                } else {
                    None
                }
            }
        }
    }
}
