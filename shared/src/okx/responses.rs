//! OKX v5 response payloads.
//!
//! OKX encodes numbers as strings and uses `""` for "not set".

use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use swap_engine::data::Candle;
use swap_engine::exchange::{InstrumentInfo, OrderAck, OrderInfo, OrderState};

use super::error::OkxError;

/// `{"code": "0", "msg": "", "data": [...]}`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<Vec<T>, OkxError> {
        if self.code != "0" {
            return Err(OkxError::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(self.data)
    }

    /// First data item; an empty list is a decode error.
    pub fn into_first(self, what: &str) -> Result<T, OkxError> {
        self.into_data()?
            .into_iter()
            .next()
            .ok_or_else(|| OkxError::Decode(format!("empty {} response", what)))
    }
}

pub fn decode<T: DeserializeOwned>(body: &str) -> Result<Envelope<T>, OkxError> {
    Ok(serde_json::from_str(body)?)
}

pub(crate) fn num(field: &str, value: &str) -> Result<f64, OkxError> {
    value
        .parse::<f64>()
        .map_err(|_| OkxError::Decode(format!("{}: not a number: {:?}", field, value)))
}

pub(crate) fn opt_num(value: &str) -> Option<f64> {
    if value.is_empty() {
        None
    } else {
        value.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct BalanceData {
    #[serde(default)]
    pub details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDetail {
    pub ccy: String,
    #[serde(default)]
    pub cash_bal: String,
    #[serde(default)]
    pub avail_bal: String,
}

impl BalanceData {
    pub fn cash_balance(&self, ccy: &str) -> Result<f64, OkxError> {
        let detail = self
            .details
            .iter()
            .find(|d| d.ccy == ccy)
            .ok_or_else(|| OkxError::Decode(format!("no {} balance", ccy)))?;
        num("cashBal", &detail.cash_bal)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    pub inst_id: String,
    pub last: String,
    #[serde(default)]
    pub ts: String,
}

/// `[ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]`
pub type CandleRow = Vec<String>;

pub fn candle_from_row(row: &CandleRow) -> Result<Candle, OkxError> {
    if row.len() < 6 {
        return Err(OkxError::Decode(format!(
            "candle row has {} fields",
            row.len()
        )));
    }
    let ts = row[0]
        .parse::<i64>()
        .map_err(|_| OkxError::Decode(format!("candle ts: {:?}", row[0])))?;
    let open_time = Utc
        .timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| OkxError::Decode(format!("candle ts out of range: {}", ts)))?;

    Ok(Candle::new(
        open_time,
        num("o", &row[1])?,
        num("h", &row[2])?,
        num("l", &row[3])?,
        num("c", &row[4])?,
        num("vol", &row[5])?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentData {
    pub inst_id: String,
    pub tick_sz: String,
    pub lot_sz: String,
    pub min_sz: String,
    pub ct_val: String,
    #[serde(default)]
    pub max_mkt_sz: String,
    #[serde(default)]
    pub max_lmt_sz: String,
}

impl TryFrom<InstrumentData> for InstrumentInfo {
    type Error = OkxError;

    /// Contract-denominated limits are converted to base units via `ctVal`.
    fn try_from(data: InstrumentData) -> Result<Self, Self::Error> {
        let tick_size = num("tickSz", &data.tick_sz)?;
        let lot = num("lotSz", &data.lot_sz)?;
        let min = num("minSz", &data.min_sz)?;
        let ct_val = num("ctVal", &data.ct_val)?;
        let max = opt_num(&data.max_mkt_sz)
            .or_else(|| opt_num(&data.max_lmt_sz))
            .ok_or_else(|| OkxError::Decode("instrument has no max size".to_string()))?;

        Ok(InstrumentInfo {
            inst_id: data.inst_id,
            tick_size,
            tick_value: tick_size,
            min_size: min * ct_val,
            max_size: max * ct_val,
            step_size: lot * ct_val,
            contract_value: ct_val,
            contract_increment: lot,
            min_contracts: min,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAckData {
    #[serde(default)]
    pub ord_id: String,
    #[serde(default)]
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

/// Per-order `sCode` takes precedence over the envelope code, which OKX
/// sets to `1` for any item failure.
pub fn order_ack(envelope: Envelope<OrderAckData>) -> Result<OrderAck, OkxError> {
    let Envelope { code, msg, data } = envelope;
    match data.into_iter().next() {
        Some(item) if !item.s_code.is_empty() && item.s_code != "0" => Err(OkxError::Api {
            code: item.s_code,
            msg: item.s_msg,
        }),
        Some(item) if code == "0" && !item.ord_id.is_empty() => Ok(OrderAck {
            order_id: item.ord_id,
        }),
        _ if code != "0" => Err(OkxError::Api { code, msg }),
        _ => Err(OkxError::Decode("order ack without ordId".to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub ord_id: String,
    pub state: String,
    #[serde(default)]
    pub avg_px: String,
    #[serde(default)]
    pub acc_fill_sz: String,
}

impl From<OrderData> for OrderInfo {
    fn from(data: OrderData) -> Self {
        OrderInfo {
            order_id: data.ord_id,
            state: OrderState::from_venue(&data.state),
            avg_price: opt_num(&data.avg_px),
            filled_contracts: opt_num(&data.acc_fill_sz),
        }
    }
}
