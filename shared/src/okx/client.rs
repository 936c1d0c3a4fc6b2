//! OKX v5 REST client.
//!
//! Every request is signed. GETs are retried on transport failures and 5xx
//! responses; order submission is sent exactly once.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use swap_engine::data::Candle;
use swap_engine::error::ApiResult;
use swap_engine::exchange::{
    InstrumentInfo, MarketApi, OrderAck, OrderApi, OrderInfo, OrderRequest,
};

use super::error::OkxError;
use super::responses::{
    self, candle_from_row, BalanceData, CandleRow, Envelope, InstrumentData, OrderAckData,
    OrderData, TickerData,
};
use super::signer;
use crate::config::{Config, Credentials};

const QUOTE_CCY: &str = "USDT";
const CANDLE_BAR: &str = "1m";
const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct OkxClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    simulated: bool,
    inst_id: String,
    td_mode: String,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl OkxClient {
    pub fn new(config: &Config) -> Result<Self, OkxError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
            simulated: config.simulated,
            inst_id: config.strategy.inst_id.clone(),
            td_mode: config.td_mode.clone(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Override the GET retry policy.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    async fn send(&self, method: Method, path: &str, body: Option<&str>) -> Result<String, OkxError> {
        let timestamp = signer::timestamp(Utc::now());
        let payload = body.unwrap_or("");
        let sign = signer::sign(
            &self.credentials.secret_key,
            &timestamp,
            method.as_str(),
            path,
            payload,
        )?;

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header("OK-ACCESS-KEY", &self.credentials.api_key)
            .header("OK-ACCESS-SIGN", sign)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &self.credentials.passphrase);
        if self.simulated {
            request = request.header("x-simulated-trading", "1");
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        debug!(%method, path, "OKX request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(OkxError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>, OkxError> {
        let mut attempt = 1;
        loop {
            match self.send(Method::GET, path, None).await {
                Ok(text) => return responses::decode(&text),
                Err(e) if e.is_retryable() && attempt < self.retry_attempts => {
                    warn!(
                        path,
                        attempt,
                        max_attempts = self.retry_attempts,
                        error = %e,
                        "OKX request failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<Envelope<T>, OkxError> {
        let body = serde_json::to_string(body)?;
        let text = self.send(Method::POST, path, Some(&body)).await?;
        responses::decode(&text)
    }

    fn order_body(&self, request: &OrderRequest) -> Value {
        let mut body = json!({
            "instId": self.inst_id,
            "tdMode": self.td_mode,
            "side": request.side.as_str(),
            "ordType": "market",
            "sz": format_size(request.contracts),
            "posSide": request.pos_side.as_str(),
        });
        if let Some(stop) = request.stop_loss_price {
            body["slTriggerPx"] = json!(stop.to_string());
            body["slOrdPx"] = json!(stop.to_string());
        }
        body
    }
}

/// Contracts with at most four decimals and no trailing zeros.
fn format_size(contracts: f64) -> String {
    let fixed = format!("{:.4}", contracts);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[async_trait]
impl MarketApi for OkxClient {
    async fn get_account_balance(&self) -> ApiResult<f64> {
        let path = format!("/api/v5/account/balance?ccy={}", QUOTE_CCY);
        let data: BalanceData = self.get(&path).await?.into_first("balance")?;
        Ok(data.cash_balance(QUOTE_CCY)?)
    }

    async fn get_current_price(&self) -> ApiResult<f64> {
        let path = format!("/api/v5/market/ticker?instId={}", self.inst_id);
        let ticker: TickerData = self.get(&path).await?.into_first("ticker")?;
        Ok(responses::num("last", &ticker.last)?)
    }

    async fn get_kline_data(&self, limit: usize) -> ApiResult<Vec<Candle>> {
        let path = format!(
            "/api/v5/market/candles?instId={}&bar={}&limit={}",
            self.inst_id, CANDLE_BAR, limit
        );
        let rows: Vec<CandleRow> = self.get(&path).await?.into_data()?;
        let candles = rows
            .iter()
            .map(candle_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(candles)
    }

    async fn get_symbol_info(&self, inst_id: &str) -> ApiResult<InstrumentInfo> {
        let path = format!("/api/v5/public/instruments?instType=SWAP&instId={}", inst_id);
        let data: InstrumentData = self.get(&path).await?.into_first("instrument")?;
        Ok(InstrumentInfo::try_from(data)?)
    }
}

#[async_trait]
impl OrderApi for OkxClient {
    async fn place_order(&self, request: OrderRequest) -> ApiResult<OrderAck> {
        let body = self.order_body(&request);
        let envelope: Envelope<OrderAckData> = self.post("/api/v5/trade/order", &body).await?;
        let ack = responses::order_ack(envelope)?;
        debug!(order_id = %ack.order_id, %body, "order accepted");
        Ok(ack)
    }

    async fn get_order_info(&self, order_id: &str) -> ApiResult<OrderInfo> {
        let path = format!(
            "/api/v5/trade/order?instId={}&ordId={}",
            self.inst_id, order_id
        );
        let data: OrderData = self.get(&path).await?.into_first("order")?;
        Ok(data.into())
    }
}
