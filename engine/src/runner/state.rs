//! State owned by the strategy loop

use std::collections::HashMap;
use uuid::Uuid;

use crate::exchange::PendingOrder;
use crate::indicators::IndicatorEngine;
use crate::portfolio::{Balance, Position, PositionSummary};
use crate::runner::StatusReport;

/// Everything the loop mutates, passed by reference to each step
#[derive(Debug)]
pub struct StrategyState {
    pub last_price: Option<f64>,
    pub balance: Option<Balance>,
    pub positions: Vec<Position>,
    /// Keyed by venue order id
    pub pending: HashMap<String, PendingOrder>,
    pub indicators: IndicatorEngine,
    pub trades_total: u64,
}

impl StrategyState {
    pub fn new(indicators: IndicatorEngine) -> Self {
        Self {
            last_price: None,
            balance: None,
            positions: Vec::new(),
            pending: HashMap::new(),
            indicators,
            trades_total: 0,
        }
    }

    /// An opening order is awaiting confirmation
    pub fn has_pending_open(&self) -> bool {
        self.pending.values().any(|order| order.is_opening())
    }

    pub fn position_mut(&mut self, id: Uuid) -> Option<&mut Position> {
        self.positions.iter_mut().find(|p| p.id == id)
    }

    pub fn remove_position(&mut self, id: Uuid) -> Option<Position> {
        let index = self.positions.iter().position(|p| p.id == id)?;
        Some(self.positions.remove(index))
    }

    /// Observer views at the last known price (entry price when none yet)
    pub fn position_summaries(&self) -> Vec<PositionSummary> {
        self.positions
            .iter()
            .map(|p| p.summary(self.last_price.unwrap_or(p.entry_price)))
            .collect()
    }

    /// Re-mark floating profit at the last price
    pub fn mark_to_market(&mut self) {
        if let (Some(balance), Some(price)) = (self.balance.as_mut(), self.last_price) {
            balance.mark_to_market(&self.positions, price);
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            last_price: self.last_price,
            available_balance: self.balance.map(|b| b.available),
            floating_profit: self.balance.map(|b| b.floating_profit).unwrap_or(0.0),
            open_positions: self.positions.len(),
            pending_orders: self.pending.len(),
            trades_total: self.trades_total,
        }
    }
}
