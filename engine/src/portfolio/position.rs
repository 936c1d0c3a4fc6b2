//! Position tracking

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::exchange::OrderSide;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    /// Long position
    Long,
    /// Short position
    Short,
}

impl PositionSide {
    /// Venue wire form (`posSide`)
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    /// Order side that reduces a position on this side
    pub fn closing_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open position created by a filled opening order
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Position ID
    pub id: Uuid,
    /// Position side (Long/Short)
    pub side: PositionSide,
    /// Entry price
    pub entry_price: f64,
    /// Size in base units
    pub size: f64,
    /// Size in venue contracts
    pub contracts: f64,
    /// When the fill was confirmed
    pub opened_at: Instant,
    /// Ratcheting stop level
    pub stop_loss_price: f64,
    /// Ratcheting target level
    pub take_profit_price: f64,
    /// Order id of a close already in flight
    pub closing_order: Option<String>,
}

impl Position {
    /// Create new position with initial stop/target levels
    pub fn new(
        side: PositionSide,
        entry_price: f64,
        size: f64,
        contracts: f64,
        opened_at: Instant,
        (stop_loss_price, take_profit_price): (f64, f64),
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            side,
            entry_price,
            size,
            contracts,
            opened_at,
            stop_loss_price,
            take_profit_price,
            closing_order: None,
        }
    }

    /// Unrealized P&L in quote currency at `price`
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.size,
            PositionSide::Short => (self.entry_price - price) * self.size,
        }
    }

    /// Whether a closing order is in flight
    pub fn is_closing(&self) -> bool {
        self.closing_order.is_some()
    }

    /// Observer-facing view at `price`
    pub fn summary(&self, price: f64) -> PositionSummary {
        PositionSummary {
            id: self.id,
            side: self.side,
            entry_price: self.entry_price,
            size: self.size,
            contracts: self.contracts,
            stop_loss_price: self.stop_loss_price,
            take_profit_price: self.take_profit_price,
            unrealized_pnl: self.unrealized_pnl(price),
            closing: self.is_closing(),
        }
    }
}

/// Serializable position view handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub id: Uuid,
    pub side: PositionSide,
    pub entry_price: f64,
    pub size: f64,
    pub contracts: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub unrealized_pnl: f64,
    pub closing: bool,
}
