//! Order types exchanged with the venue

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::portfolio::PositionSide;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    /// Buy
    Buy,
    /// Sell
    Sell,
}

impl OrderSide {
    /// Venue wire form
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market order to submit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub pos_side: PositionSide,
    /// Size in venue contracts
    pub contracts: f64,
    /// Venue-side protective stop attached to opening orders
    pub stop_loss_price: Option<f64>,
}

/// Venue acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

/// Order state as reported by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Live,
    PartiallyFilled,
    Filled,
    Canceled,
    OrderFailed,
    /// Any state string not listed above
    Other(String),
}

impl OrderState {
    /// Decode the venue's `state` field
    pub fn from_venue(state: &str) -> Self {
        match state {
            "live" => OrderState::Live,
            "partially_filled" => OrderState::PartiallyFilled,
            "filled" => OrderState::Filled,
            "canceled" => OrderState::Canceled,
            "order_failed" => OrderState::OrderFailed,
            other => OrderState::Other(other.to_string()),
        }
    }
}

/// Snapshot of one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub order_id: String,
    pub state: OrderState,
    /// Average fill price, when any part has filled
    pub avg_price: Option<f64>,
    /// Filled size in contracts
    pub filled_contracts: Option<f64>,
}
