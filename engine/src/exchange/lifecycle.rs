//! Order lifecycle: submit, then poll until the venue reports a terminal state

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ApiError, SubmitError};
use crate::exchange::{OrderApi, OrderRequest, OrderSide, OrderState};
use crate::portfolio::{ExitReason, PositionSide};

/// Handle to a submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRef {
    pub order_id: String,
}

/// Fill details reported with a filled order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub avg_price: Option<f64>,
    pub filled_contracts: Option<f64>,
}

/// Classified result of polling an order
#[derive(Debug, Clone, PartialEq)]
pub enum OrderStatus {
    /// Still working on the venue
    Pending,
    Filled(Fill),
    /// Terminal without a fill; carries the venue state
    Failed(String),
    /// Status could not be established within the retry budget
    Unknown,
}

/// Why an order was placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderIntent {
    /// Opening order; carries the ATR the stop/target are derived from
    Open { atr: f64 },
    Close {
        position_id: uuid::Uuid,
        reason: ExitReason,
    },
}

/// Order submitted but not yet confirmed filled or failed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub order_id: String,
    pub submitted_at: Instant,
    pub side: OrderSide,
    pub pos_side: PositionSide,
    pub contracts: f64,
    /// Size in base units
    pub size: f64,
    pub intent: OrderIntent,
    /// Price the decision was made at; fallback entry price when the venue
    /// reports no average fill price
    pub reference_price: f64,
    pub last_polled: Option<Instant>,
}

impl PendingOrder {
    pub fn is_opening(&self) -> bool {
        matches!(self.intent, OrderIntent::Open { .. })
    }

    /// Time since submission
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.submitted_at)
    }
}

/// Submits orders and classifies their status
#[derive(Clone)]
pub struct OrderLifecycleManager {
    api: Arc<dyn OrderApi>,
    poll_attempts: u32,
    poll_delay: Duration,
}

impl OrderLifecycleManager {
    pub fn new(api: Arc<dyn OrderApi>, poll_attempts: u32, poll_delay: Duration) -> Self {
        Self {
            api,
            poll_attempts: poll_attempts.max(1),
            poll_delay,
        }
    }

    /// Submit a market order. Failures are reported as-is, never retried.
    pub async fn place(
        &self,
        side: OrderSide,
        pos_side: PositionSide,
        contracts: f64,
        stop_loss_price: Option<f64>,
    ) -> Result<OrderRef, SubmitError> {
        if !contracts.is_finite() || contracts <= 0.0 {
            return Err(SubmitError::InvalidSize(contracts));
        }

        let request = OrderRequest {
            side,
            pos_side,
            contracts,
            stop_loss_price,
        };
        let ack = self.api.place_order(request).await?;
        info!(
            "Order submitted: {} {} {:?} contracts={}",
            ack.order_id, side, pos_side, contracts
        );
        Ok(OrderRef {
            order_id: ack.order_id,
        })
    }

    /// Fetch and classify the order's state.
    ///
    /// Unrecognized states and transient fetch errors are retried with a fixed
    /// delay; once the attempts run out the status is `Unknown`.
    pub async fn poll(&self, order_id: &str) -> OrderStatus {
        for attempt in 1..=self.poll_attempts {
            match self.api.get_order_info(order_id).await {
                Ok(info) => match info.state {
                    OrderState::Live | OrderState::PartiallyFilled => return OrderStatus::Pending,
                    OrderState::Filled => {
                        return OrderStatus::Filled(Fill {
                            avg_price: info.avg_price,
                            filled_contracts: info.filled_contracts,
                        })
                    }
                    OrderState::Canceled => return OrderStatus::Failed("canceled".to_string()),
                    OrderState::OrderFailed => {
                        return OrderStatus::Failed("order_failed".to_string())
                    }
                    OrderState::Other(state) => {
                        debug!(
                            "Order {} in unrecognized state '{}' (attempt {}/{})",
                            order_id, state, attempt, self.poll_attempts
                        );
                    }
                },
                Err(err @ ApiError::Rejected { .. }) => {
                    warn!("Order {} status query rejected: {}", order_id, err);
                    return OrderStatus::Unknown;
                }
                Err(err) => {
                    debug!(
                        "Order {} status fetch failed (attempt {}/{}): {}",
                        order_id, attempt, self.poll_attempts, err
                    );
                }
            }

            if attempt < self.poll_attempts {
                tokio::time::sleep(self.poll_delay).await;
            }
        }

        warn!(
            "Order {} status unknown after {} attempts",
            order_id, self.poll_attempts
        );
        OrderStatus::Unknown
    }
}
