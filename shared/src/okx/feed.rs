//! OKX WebSocket market feed.
//!
//! Runs the public `tickers` socket and, unless disabled, the private
//! `account`/`positions` socket. Each socket reconnects on a fixed delay until
//! cancelled. Decoded events are pushed with `try_send`: when the strategy's
//! queue is full the event is dropped, so the socket reader never stalls.

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use swap_engine::exchange::{AccountUpdate, MarketEvent, Ticker, VenuePosition};
use swap_engine::portfolio::PositionSide;

use super::error::OkxError;
use super::responses::{num, opt_num, BalanceDetail, TickerData};
use super::signer;
use crate::config::{Config, Credentials};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const PING_INTERVAL: Duration = Duration::from_secs(20);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);
const QUOTE_CCY: &str = "USDT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Socket {
    Public,
    Private,
}

impl Socket {
    fn name(self) -> &'static str {
        match self {
            Socket::Public => "public",
            Socket::Private => "private",
        }
    }
}

/// How a connected session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    /// The strategy dropped its receiver; nobody is listening any more.
    ConsumerGone,
}

/// A decoded inbound frame
#[derive(Debug, PartialEq)]
pub enum FeedMessage {
    Events(Vec<MarketEvent>),
    Subscribed(String),
    LoggedIn,
    Error { code: String, msg: String },
    Pong,
    Ignored,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Push {
    event: Option<String>,
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
    arg: Option<PushArg>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PushArg {
    channel: String,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(default)]
    details: Vec<BalanceDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionData {
    inst_id: String,
    pos_side: String,
    #[serde(default)]
    pos: String,
    #[serde(default)]
    avg_px: String,
    #[serde(default)]
    upl: String,
}

/// Decode one text frame. Pushes for other instruments are dropped.
pub fn decode_message(text: &str, inst_id: &str) -> Result<FeedMessage, OkxError> {
    if text == "pong" {
        return Ok(FeedMessage::Pong);
    }
    let push: Push = serde_json::from_str(text)?;

    if let Some(event) = push.event.as_deref() {
        return Ok(match event {
            "subscribe" => FeedMessage::Subscribed(
                push.arg.map(|a| a.channel).unwrap_or_default(),
            ),
            "login" if push.code.is_empty() || push.code == "0" => FeedMessage::LoggedIn,
            "login" | "error" => FeedMessage::Error {
                code: push.code,
                msg: push.msg,
            },
            _ => FeedMessage::Ignored,
        });
    }

    let (Some(arg), Some(data)) = (push.arg, push.data) else {
        return Ok(FeedMessage::Ignored);
    };

    let events = match arg.channel.as_str() {
        "tickers" => {
            let tickers: Vec<TickerData> = serde_json::from_value(data)?;
            let mut events = Vec::new();
            for t in tickers.into_iter().filter(|t| t.inst_id == inst_id) {
                events.push(MarketEvent::Ticker(Ticker {
                    last: num("last", &t.last)?,
                    ts: t.ts.parse().unwrap_or_default(),
                    inst_id: t.inst_id,
                }));
            }
            events
        }
        "account" => {
            let accounts: Vec<AccountData> = serde_json::from_value(data)?;
            accounts
                .iter()
                .flat_map(|a| a.details.iter())
                .filter(|d| d.ccy == QUOTE_CCY)
                .filter_map(|d| opt_num(&d.avail_bal).or_else(|| opt_num(&d.cash_bal)))
                .map(|available_balance| MarketEvent::Account(AccountUpdate { available_balance }))
                .collect()
        }
        "positions" => {
            let rows: Vec<PositionData> = serde_json::from_value(data)?;
            let positions = rows
                .into_iter()
                .filter(|p| p.inst_id == inst_id)
                .filter_map(|p| {
                    let pos_side = match p.pos_side.as_str() {
                        "long" => PositionSide::Long,
                        "short" => PositionSide::Short,
                        _ => return None,
                    };
                    Some(VenuePosition {
                        pos_side,
                        contracts: opt_num(&p.pos).unwrap_or(0.0).abs(),
                        avg_price: opt_num(&p.avg_px),
                        unrealized_pnl: opt_num(&p.upl),
                    })
                })
                .collect();
            vec![MarketEvent::Positions(positions)]
        }
        _ => return Ok(FeedMessage::Ignored),
    };

    Ok(if events.is_empty() {
        FeedMessage::Ignored
    } else {
        FeedMessage::Events(events)
    })
}

/// Push events without waiting. Returns `false` once the receiver is gone.
pub fn forward(tx: &mpsc::Sender<MarketEvent>, events: Vec<MarketEvent>) -> bool {
    for event in events {
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event queue full, dropping market event");
            }
            Err(TrySendError::Closed(_)) => return false,
        }
    }
    true
}

pub struct MarketFeed {
    inst_id: String,
    public_url: String,
    private_url: String,
    credentials: Credentials,
    private: bool,
    tx: mpsc::Sender<MarketEvent>,
}

impl MarketFeed {
    pub fn new(config: &Config, tx: mpsc::Sender<MarketEvent>) -> Self {
        Self {
            inst_id: config.strategy.inst_id.clone(),
            public_url: config.ws_public_url.clone(),
            private_url: config.ws_private_url.clone(),
            credentials: config.credentials.clone(),
            private: true,
            tx,
        }
    }

    /// Tickers only; account and position pushes are not subscribed.
    pub fn public_only(mut self) -> Self {
        self.private = false;
        self
    }

    /// Run until cancelled or until the event receiver is dropped.
    pub async fn run(self, cancel: CancellationToken) {
        info!(inst_id = %self.inst_id, private = self.private, "Market feed starting");
        if self.private {
            tokio::join!(
                self.run_socket(Socket::Public, &cancel),
                self.run_socket(Socket::Private, &cancel),
            );
        } else {
            self.run_socket(Socket::Public, &cancel).await;
        }
        info!("Market feed stopped");
    }

    async fn run_socket(&self, socket: Socket, cancel: &CancellationToken) {
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = self.session(socket) => result,
            };

            match result {
                Ok(SessionEnd::ConsumerGone) => {
                    info!(socket = socket.name(), "Event receiver closed, stopping socket");
                    cancel.cancel();
                    return;
                }
                Ok(SessionEnd::Disconnected) => {
                    warn!(socket = socket.name(), "WebSocket closed by peer");
                }
                Err(e) => {
                    error!(socket = socket.name(), error = %e, "WebSocket session failed");
                }
            }

            info!(
                socket = socket.name(),
                delay_secs = RECONNECT_DELAY.as_secs(),
                "Reconnecting"
            );
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    fn subscription(&self, socket: Socket) -> Value {
        let args = match socket {
            Socket::Public => json!([{ "channel": "tickers", "instId": self.inst_id }]),
            Socket::Private => json!([
                { "channel": "account", "ccy": QUOTE_CCY },
                { "channel": "positions", "instType": "SWAP", "instId": self.inst_id },
            ]),
        };
        json!({ "op": "subscribe", "args": args })
    }

    async fn session(&self, socket: Socket) -> Result<SessionEnd, OkxError> {
        let url = match socket {
            Socket::Public => &self.public_url,
            Socket::Private => &self.private_url,
        };
        let (stream, _) = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| OkxError::Timeout(format!("connecting to {}", url)))??;
        info!(socket = socket.name(), url = %url, "WebSocket connected");

        let (mut write, mut read) = stream.split();

        if socket == Socket::Private {
            let login = signer::login_payload(&self.credentials, Utc::now())?;
            write.send(Message::Text(login.to_string())).await?;

            let deadline = Instant::now() + LOGIN_TIMEOUT;
            loop {
                let frame = timeout_at(deadline, read.next())
                    .await
                    .map_err(|_| OkxError::Timeout("waiting for login".to_string()))?;
                let text = match frame {
                    None => return Ok(SessionEnd::Disconnected),
                    Some(frame) => match frame? {
                        Message::Text(text) => text,
                        _ => continue,
                    },
                };
                match decode_message(&text, &self.inst_id)? {
                    FeedMessage::LoggedIn => break,
                    FeedMessage::Error { code, msg } => return Err(OkxError::Api { code, msg }),
                    _ => {}
                }
            }
            info!(socket = socket.name(), "Logged in");
        }

        write
            .send(Message::Text(self.subscription(socket).to_string()))
            .await?;

        let mut ping = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                frame = timeout_at(last_seen + IDLE_TIMEOUT, read.next()) => {
                    let frame = match frame {
                        Err(_) => {
                            return Err(OkxError::Timeout(format!(
                                "no message for {}s",
                                IDLE_TIMEOUT.as_secs()
                            )))
                        }
                        Ok(None) => return Ok(SessionEnd::Disconnected),
                        Ok(Some(frame)) => frame?,
                    };
                    last_seen = Instant::now();

                    match frame {
                        Message::Text(text) => {
                            if !self.handle_text(socket, &text) {
                                return Ok(SessionEnd::ConsumerGone);
                            }
                        }
                        Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
                        Message::Close(_) => return Ok(SessionEnd::Disconnected),
                        _ => {}
                    }
                }
                _ = ping.tick() => {
                    write.send(Message::Text("ping".to_string())).await?;
                }
            }
        }
    }

    fn handle_text(&self, socket: Socket, text: &str) -> bool {
        match decode_message(text, &self.inst_id) {
            Ok(FeedMessage::Events(events)) => forward(&self.tx, events),
            Ok(FeedMessage::Subscribed(channel)) => {
                info!(socket = socket.name(), channel = %channel, "Subscribed");
                true
            }
            Ok(FeedMessage::Error { code, msg }) => {
                error!(socket = socket.name(), code = %code, msg = %msg, "OKX error event");
                true
            }
            Ok(_) => true,
            Err(e) => {
                debug!(socket = socket.name(), error = %e, text, "Undecodable message");
                true
            }
        }
    }
}
