//! Market events and instrument metadata

use serde::{Deserialize, Serialize};

use crate::portfolio::PositionSide;

/// Last-trade update for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub inst_id: String,
    pub last: f64,
    /// Venue timestamp, milliseconds since epoch
    pub ts: i64,
}

/// Account push from the private feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub available_balance: f64,
}

/// Position as reported by the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenuePosition {
    pub pos_side: PositionSide,
    pub contracts: f64,
    pub avg_price: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

/// Event pushed by the feed into the strategy's inbound queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Ticker(Ticker),
    Account(AccountUpdate),
    Positions(Vec<VenuePosition>),
}

/// Lot and tick constraints of a perpetual swap.
///
/// `min_size`, `max_size` and `step_size` are in base-asset units; the
/// `*_contracts` / `contract_increment` fields are in venue contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub inst_id: String,
    /// Minimum price increment
    pub tick_size: f64,
    /// Quote value of one tick per base unit
    pub tick_value: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub step_size: f64,
    /// Base units per contract
    pub contract_value: f64,
    pub contract_increment: f64,
    pub min_contracts: f64,
}

impl InstrumentInfo {
    /// Name of the first field that cannot be used for sizing, if any.
    pub fn invalid_field(&self) -> Option<&'static str> {
        let positive = [
            ("tick_size", self.tick_size),
            ("tick_value", self.tick_value),
            ("step_size", self.step_size),
            ("contract_value", self.contract_value),
            ("contract_increment", self.contract_increment),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| !v.is_finite() || *v <= 0.0) {
            return Some(*name);
        }
        if !self.min_size.is_finite() || self.min_size < 0.0 {
            return Some("min_size");
        }
        if !self.max_size.is_finite() || self.max_size < self.min_size {
            return Some("max_size");
        }
        if !self.min_contracts.is_finite() || self.min_contracts < 0.0 {
            return Some("min_contracts");
        }
        None
    }
}
