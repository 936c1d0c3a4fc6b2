//! Collaborator traits implemented by venue clients

use async_trait::async_trait;

use crate::data::Candle;
use crate::error::ApiResult;
use crate::exchange::{InstrumentInfo, OrderAck, OrderInfo, OrderRequest};

/// Market and account queries
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Available quote-currency balance
    async fn get_account_balance(&self) -> ApiResult<f64>;

    /// Last traded price of the configured instrument
    async fn get_current_price(&self) -> ApiResult<f64>;

    /// Up to `limit` recent candles, in whatever order the venue returns them
    async fn get_kline_data(&self, limit: usize) -> ApiResult<Vec<Candle>>;

    /// Lot and tick constraints of an instrument
    async fn get_symbol_info(&self, inst_id: &str) -> ApiResult<InstrumentInfo>;
}

/// Order submission and status queries
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Submit a market order. A venue-level refusal is `ApiError::Rejected`.
    async fn place_order(&self, request: OrderRequest) -> ApiResult<OrderAck>;

    /// Current state of a previously placed order
    async fn get_order_info(&self, order_id: &str) -> ApiResult<OrderInfo>;
}
