//! Risk-based position sizing
//!
//! Size = equity at risk / (stop distance in ticks * tick value), clamped and
//! stepped to the instrument's base-unit limits, then converted to contracts.

use thiserror::Error;

use crate::config::RiskConfig;
use crate::exchange::InstrumentInfo;

/// Sized order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSize {
    /// Base units, `contracts * contract_value`
    pub lot_size: f64,
    /// Venue contracts; what is actually sent
    pub contracts: f64,
    /// Quote currency put at risk
    pub risk_amount: f64,
    /// Stop distance in price
    pub stop_distance: f64,
}

/// Why no size could be produced
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SizeRejection {
    #[error("ATR unavailable or zero")]
    InvalidAtr,
    #[error("current price unavailable")]
    PriceUnavailable,
    #[error("instrument info unavailable")]
    InstrumentUnavailable,
    #[error("instrument field {0} is unusable")]
    InvalidInstrument(&'static str),
    #[error("account balance unavailable or non-positive")]
    BalanceUnavailable,
    #[error("{0} is not a finite number")]
    NonFinite(&'static str),
    #[error("{contracts} contracts is below the venue minimum {min}")]
    BelowMinimum { contracts: f64, min: f64 },
}

/// Outcome of a sizing request
#[derive(Debug, Clone, PartialEq)]
pub enum SizeDecision {
    Sized(OrderSize),
    Rejected(SizeRejection),
}

/// Round to the nearest multiple of `step`, trimming float noise
pub fn round_to_step(value: f64, step: f64) -> f64 {
    let stepped = (value / step).round() * step;
    (stepped * 1e12).round() / 1e12
}

/// Round down to a multiple of `step`; values within float noise of a
/// multiple keep it
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    let stepped = (value / step + 1e-9).floor() * step;
    (stepped * 1e12).round() / 1e12
}

fn finite(value: f64, name: &'static str) -> Result<f64, SizeRejection> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SizeRejection::NonFinite(name))
    }
}

/// Converts account risk into an order size
#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_percent: f64,
    atr_multiplier: f64,
}

impl PositionSizer {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            risk_percent: config.risk_percent,
            atr_multiplier: config.atr_multiplier,
        }
    }

    /// Size a new position. Never panics; every failure is a `Rejected`.
    pub fn size(
        &self,
        balance: Option<f64>,
        atr: Option<f64>,
        price: Option<f64>,
        instrument: Option<&InstrumentInfo>,
    ) -> SizeDecision {
        match self.try_size(balance, atr, price, instrument) {
            Ok(size) => SizeDecision::Sized(size),
            Err(rejection) => SizeDecision::Rejected(rejection),
        }
    }

    fn try_size(
        &self,
        balance: Option<f64>,
        atr: Option<f64>,
        price: Option<f64>,
        instrument: Option<&InstrumentInfo>,
    ) -> Result<OrderSize, SizeRejection> {
        let atr = atr
            .filter(|a| a.is_finite() && *a > 0.0)
            .ok_or(SizeRejection::InvalidAtr)?;
        price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or(SizeRejection::PriceUnavailable)?;
        let instrument = instrument.ok_or(SizeRejection::InstrumentUnavailable)?;
        if let Some(field) = instrument.invalid_field() {
            return Err(SizeRejection::InvalidInstrument(field));
        }
        let balance = balance
            .filter(|b| b.is_finite() && *b > 0.0)
            .ok_or(SizeRejection::BalanceUnavailable)?;

        let risk_amount = finite(balance * self.risk_percent / 100.0, "risk_amount")?;
        let stop_distance = finite(self.atr_multiplier * atr, "stop_distance")?;
        let risk_per_unit = finite(
            stop_distance / instrument.tick_size * instrument.tick_value,
            "risk_per_unit",
        )?;
        if risk_per_unit <= 0.0 {
            return Err(SizeRejection::NonFinite("risk_per_unit"));
        }

        let raw_lot = finite(risk_amount / risk_per_unit, "lot_size")?;
        let clamped = raw_lot.max(instrument.min_size).min(instrument.max_size);
        let mut lot = round_to_step(clamped, instrument.step_size);
        if lot > instrument.max_size {
            lot = floor_to_step(instrument.max_size, instrument.step_size);
        }

        // the contract count may not round past the venue maximum either
        let increment = instrument.contract_increment;
        let max_contracts =
            floor_to_step(instrument.max_size / instrument.contract_value, increment);
        let contracts = round_to_step(lot / instrument.contract_value, increment)
            .max(increment)
            .min(max_contracts);
        finite(contracts, "contracts")?;
        if contracts < instrument.min_contracts {
            return Err(SizeRejection::BelowMinimum {
                contracts,
                min: instrument.min_contracts,
            });
        }

        Ok(OrderSize {
            lot_size: round_to_step(contracts * instrument.contract_value, instrument.step_size),
            contracts,
            risk_amount,
            stop_distance,
        })
    }
}
