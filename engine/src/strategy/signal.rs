//! Trading decisions and their justification

use serde::{Deserialize, Serialize};

use crate::exchange::OrderSide;
use crate::portfolio::PositionSide;

/// What the strategy wants to do on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Open a long position
    Buy,
    /// Open a short position
    Sell,
    /// No action
    Hold,
}

impl Decision {
    /// Order side and position side for an entry, `None` for Hold
    pub fn entry_sides(&self) -> Option<(OrderSide, PositionSide)> {
        match self {
            Decision::Buy => Some((OrderSide::Buy, PositionSide::Long)),
            Decision::Sell => Some((OrderSide::Sell, PositionSide::Short)),
            Decision::Hold => None,
        }
    }
}

/// Trading signal
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    /// Decision taken
    pub decision: Decision,
    /// Price the decision was evaluated at
    pub price: f64,
    /// Why; for logs only, never read by control flow
    pub reasons: Vec<String>,
}

impl Signal {
    /// Create buy signal
    pub fn buy(price: f64, reasons: Vec<String>) -> Self {
        Self {
            decision: Decision::Buy,
            price,
            reasons,
        }
    }

    /// Create sell signal
    pub fn sell(price: f64, reasons: Vec<String>) -> Self {
        Self {
            decision: Decision::Sell,
            price,
            reasons,
        }
    }

    /// Create hold signal
    pub fn hold(price: f64, reasons: Vec<String>) -> Self {
        Self {
            decision: Decision::Hold,
            price,
            reasons,
        }
    }

    /// Check if signal asks for an order
    pub fn is_actionable(&self) -> bool {
        self.decision != Decision::Hold
    }

    /// Reasons joined for a single log line
    pub fn reason_text(&self) -> String {
        self.reasons.join("; ")
    }
}
