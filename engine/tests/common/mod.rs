//! In-memory venue used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use swap_engine::data::Candle;
use swap_engine::error::{ApiError, ApiResult};
use swap_engine::exchange::{
    InstrumentInfo, MarketApi, OrderAck, OrderApi, OrderInfo, OrderRequest, OrderState,
};
use swap_engine::observer::{LogLevel, Observer};
use swap_engine::portfolio::PositionSummary;

pub const INST_ID: &str = "BTC-USDT-SWAP";

/// Flat bars: every close at `close`, high/low one unit away, so TR = ATR = 2
pub fn flat_candles(count: usize, close: f64) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .rev()
        .map(|i| {
            Candle::new(
                base + Duration::minutes(i as i64),
                close,
                close + 1.0,
                close - 1.0,
                close,
                10.0,
            )
        })
        .collect()
}

pub fn instrument() -> InstrumentInfo {
    InstrumentInfo {
        inst_id: INST_ID.to_string(),
        tick_size: 0.1,
        tick_value: 0.1,
        min_size: 0.01,
        max_size: 100.0,
        step_size: 0.01,
        contract_value: 0.01,
        contract_increment: 1.0,
        min_contracts: 1.0,
    }
}

/// Fake venue implementing both collaborator traits
pub struct FakeVenue {
    pub candles: Mutex<Vec<Candle>>,
    pub balance: Mutex<f64>,
    /// Per-order state and fill price; unknown ids report `live`
    pub orders: Mutex<HashMap<String, (OrderState, Option<f64>)>>,
    pub placed: Mutex<Vec<OrderRequest>>,
    pub balance_queries: AtomicUsize,
    /// Make kline requests fail
    pub fail_candles: AtomicBool,
    /// Make balance requests fail
    pub fail_balance: AtomicBool,
    next_id: AtomicUsize,
}

impl FakeVenue {
    pub fn new(candles: Vec<Candle>, balance: f64) -> Self {
        Self {
            candles: Mutex::new(candles),
            balance: Mutex::new(balance),
            orders: Mutex::new(HashMap::new()),
            placed: Mutex::new(Vec::new()),
            balance_queries: AtomicUsize::new(0),
            fail_candles: AtomicBool::new(false),
            fail_balance: AtomicBool::new(false),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn place_calls(&self) -> usize {
        self.placed.lock().unwrap().len()
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn set_order_state(&self, order_id: &str, state: OrderState, avg_price: Option<f64>) {
        self.orders
            .lock()
            .unwrap()
            .insert(order_id.to_string(), (state, avg_price));
    }

    pub fn fill(&self, order_id: &str, price: f64) {
        self.set_order_state(order_id, OrderState::Filled, Some(price));
    }
}

#[async_trait]
impl MarketApi for FakeVenue {
    async fn get_account_balance(&self) -> ApiResult<f64> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable("balance down".to_string()));
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_current_price(&self) -> ApiResult<f64> {
        self.candles
            .lock()
            .unwrap()
            .first()
            .map(|c| c.close)
            .ok_or_else(|| ApiError::Unavailable("no candles".to_string()))
    }

    async fn get_kline_data(&self, limit: usize) -> ApiResult<Vec<Candle>> {
        if self.fail_candles.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("candles down".to_string()));
        }
        Ok(self.candles.lock().unwrap().iter().take(limit).copied().collect())
    }

    async fn get_symbol_info(&self, inst_id: &str) -> ApiResult<InstrumentInfo> {
        if inst_id == INST_ID {
            Ok(instrument())
        } else {
            Err(ApiError::Unavailable(format!("unknown instrument {}", inst_id)))
        }
    }
}

#[async_trait]
impl OrderApi for FakeVenue {
    async fn place_order(&self, request: OrderRequest) -> ApiResult<OrderAck> {
        self.placed.lock().unwrap().push(request);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(OrderAck {
            order_id: id.to_string(),
        })
    }

    async fn get_order_info(&self, order_id: &str) -> ApiResult<OrderInfo> {
        let (state, avg_price) = self
            .orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .unwrap_or((OrderState::Live, None));
        Ok(OrderInfo {
            order_id: order_id.to_string(),
            state,
            avg_price,
            filled_contracts: None,
        })
    }
}

/// Observer that keeps every log line
#[derive(Default)]
pub struct RecordingObserver {
    pub logs: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingObserver {
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

impl Observer for RecordingObserver {
    fn log(&self, message: &str, level: LogLevel) {
        self.logs.lock().unwrap().push((level, message.to_string()));
    }

    fn update_balance(&self, _available: f64, _floating_profit: f64, _total: f64) {}

    fn update_positions(&self, _positions: &[PositionSummary]) {}
}
