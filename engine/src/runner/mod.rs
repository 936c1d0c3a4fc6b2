//! Strategy loop
//!
//! A single task that drains the inbound market-event queue and drives the
//! indicator, signal, sizing, order and risk components. All mutable state
//! lives in [`StrategyState`]; only the queue and the [`StrategyHandle`]
//! cross task boundaries.

pub mod control;
pub mod health;
pub mod state;

pub use control::*;
pub use health::*;
pub use state::*;

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RiskConfig, StrategyConfig};
use crate::error::{ConfigError, EngineError};
use crate::exchange::{
    AccountUpdate, Fill, InstrumentInfo, MarketApi, MarketEvent, OrderApi, OrderIntent,
    OrderLifecycleManager, OrderStatus, PendingOrder, Ticker, VenuePosition,
};
use crate::indicators::{IndicatorEngine, IndicatorUpdate};
use crate::observer::{LogLevel, Observer};
use crate::portfolio::{
    Balance, CloseRequest, Position, PositionRiskManager, PositionSizer, SizeDecision,
};
use crate::strategy::SignalEvaluator;

enum Flow {
    Continue,
    Stop,
}

/// The orchestrating control loop
pub struct StrategyLoop {
    config: StrategyConfig,
    market: Arc<dyn MarketApi>,
    orders: OrderLifecycleManager,
    evaluator: SignalEvaluator,
    sizer: PositionSizer,
    risk: PositionRiskManager,
    observer: Arc<dyn Observer>,
    events: mpsc::Receiver<MarketEvent>,
    handle: StrategyHandle,
    status: watch::Sender<StatusReport>,
    instrument: Option<InstrumentInfo>,
    state: StrategyState,
    health: TradeHealth,
    last_candle_update: Option<Instant>,
    last_sweep: Option<Instant>,
    last_ready_attempt: Option<Instant>,
}

impl StrategyLoop {
    /// Build a loop and the handle that controls it
    pub fn new(
        config: StrategyConfig,
        risk: RiskConfig,
        market: Arc<dyn MarketApi>,
        orders: Arc<dyn OrderApi>,
        observer: Arc<dyn Observer>,
        events: mpsc::Receiver<MarketEvent>,
    ) -> Result<(Self, StrategyHandle), ConfigError> {
        let indicators = IndicatorEngine::new(risk.clone())?;
        config.validate(&risk)?;
        let (handle, status) = StrategyHandle::new();

        let strategy = Self {
            orders: OrderLifecycleManager::new(orders, config.poll_attempts, config.poll_delay),
            evaluator: SignalEvaluator::new(),
            sizer: PositionSizer::new(&risk),
            risk: PositionRiskManager::new(&risk, config.min_hold),
            health: TradeHealth::new(
                config.report_interval,
                config.min_trades_per_report,
                Instant::now(),
            ),
            config,
            market,
            observer,
            events,
            handle: handle.clone(),
            status,
            instrument: None,
            state: StrategyState::new(indicators),
            last_candle_update: None,
            last_sweep: None,
            last_ready_attempt: None,
        };
        Ok((strategy, handle))
    }

    /// Use already-fetched instrument metadata instead of querying it on start
    pub fn with_instrument(mut self, instrument: InstrumentInfo) -> Self {
        self.instrument = Some(instrument);
        self
    }

    /// Run until stopped or the inbound queue closes. Returns the final state.
    pub async fn run(mut self) -> StrategyState {
        let cancel = self.handle.cancellation_token();
        info!(
            "Strategy loop started for {} (candles every {:?}, queue timeout {:?})",
            self.config.inst_id, self.config.candle_update_interval, self.config.queue_timeout
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if self.handle.is_paused() {
                self.handle.set_phase(LoopPhase::Paused);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.pause_poll) => continue,
                }
            }
            self.handle.set_phase(LoopPhase::Running);

            match self.iterate(&cancel).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(err) => {
                    error!("Strategy iteration failed: {}", err);
                    self.observer
                        .log(&format!("iteration failed: {}", err), LogLevel::Error);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.fault_backoff) => {}
                    }
                }
            }
            self.status.send_replace(self.state.status());
        }

        self.handle.set_phase(LoopPhase::Stopped);
        self.status.send_replace(self.state.status());
        info!(
            "Strategy loop stopped: {} open position(s), {} pending order(s), {} trade(s)",
            self.state.positions.len(),
            self.state.pending.len(),
            self.state.trades_total
        );
        self.state
    }

    async fn iterate(&mut self, cancel: &CancellationToken) -> Result<Flow, EngineError> {
        // data failures only skip their own step; exits must keep running
        self.ensure_ready().await;
        self.refresh_indicators_if_due().await;

        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Flow::Stop),
            received = tokio::time::timeout(self.config.queue_timeout, self.events.recv()) => received,
        };
        match received {
            Ok(Some(event)) => self.handle_event(event).await?,
            Ok(None) => {
                info!("Market event queue closed");
                return Ok(Flow::Stop);
            }
            Err(_) => debug!(
                "No market event within {:?}",
                self.config.queue_timeout
            ),
        }

        self.sweep_pending().await;
        self.manage_positions().await;
        self.report_health();
        Ok(Flow::Continue)
    }

    /// Instrument metadata and an initial balance are needed before entries.
    ///
    /// Missing either one only disables entries (the sizer rejects them);
    /// fetches are retried at most once per `fault_backoff`.
    async fn ensure_ready(&mut self) {
        if self.instrument.is_some() && self.state.balance.is_some() {
            return;
        }
        let now = Instant::now();
        if let Some(at) = self.last_ready_attempt {
            if now.saturating_duration_since(at) < self.config.fault_backoff {
                return;
            }
        }
        self.last_ready_attempt = Some(now);

        if self.instrument.is_none() {
            match self.market.get_symbol_info(&self.config.inst_id).await {
                Ok(info) => {
                    info!(
                        "Instrument {}: tick {} ctVal {} lot {} min {}",
                        info.inst_id,
                        info.tick_size,
                        info.contract_value,
                        info.contract_increment,
                        info.min_contracts
                    );
                    self.instrument = Some(info);
                }
                Err(err) => warn!(
                    "Instrument {} unavailable, entries disabled: {}",
                    self.config.inst_id, err
                ),
            }
        }
        if self.state.balance.is_none() {
            if let Err(err) = self.refresh_balance().await {
                warn!("Balance unavailable, entries disabled: {}", err);
            }
        }
    }

    async fn refresh_indicators_if_due(&mut self) {
        let now = Instant::now();
        let due = self
            .last_candle_update
            .map_or(true, |at| now.saturating_duration_since(at) >= self.config.candle_update_interval);
        if !due {
            return;
        }
        // a failed fetch waits a full interval too
        self.last_candle_update = Some(now);

        let candles = match self.market.get_kline_data(self.config.kline_limit).await {
            Ok(candles) => candles,
            Err(err) => {
                warn!("Candle fetch failed, keeping previous indicators: {}", err);
                self.observer
                    .log(&format!("candle fetch failed: {}", err), LogLevel::Warn);
                return;
            }
        };

        match self.state.indicators.update(candles) {
            IndicatorUpdate::Ready(snapshot) => {
                info!("Indicators updated: {}", snapshot.describe());
                if snapshot.atr.is_none() {
                    warn!("ATR is zero or invalid; trading disabled until the next update");
                }
            }
            IndicatorUpdate::InsufficientData { have, need } => {
                warn!("Not enough candles for indicators: have {}, need {}", have, need);
            }
        }
    }

    async fn refresh_balance(&mut self) -> Result<(), EngineError> {
        let available = self.market.get_account_balance().await?;
        self.apply_available_balance(available);
        Ok(())
    }

    fn apply_available_balance(&mut self, available: f64) {
        match self.state.balance.as_mut() {
            Some(balance) => balance.set_available(available),
            None => self.state.balance = Some(Balance::new(available)),
        }
        self.state.mark_to_market();
        if let Some(balance) = self.state.balance {
            self.observer
                .update_balance(balance.available, balance.floating_profit, balance.total);
        }
    }

    async fn handle_event(&mut self, event: MarketEvent) -> Result<(), EngineError> {
        match event {
            MarketEvent::Ticker(ticker) => self.on_ticker(ticker).await,
            MarketEvent::Account(update) => {
                self.on_account(update);
                Ok(())
            }
            MarketEvent::Positions(positions) => {
                self.on_venue_positions(&positions);
                Ok(())
            }
        }
    }

    async fn on_ticker(&mut self, ticker: Ticker) -> Result<(), EngineError> {
        if ticker.inst_id != self.config.inst_id {
            debug!("Ignoring ticker for {}", ticker.inst_id);
            return Ok(());
        }
        if !ticker.last.is_finite() || ticker.last <= 0.0 {
            warn!("Ignoring invalid ticker price {}", ticker.last);
            return Ok(());
        }
        let price = ticker.last;
        self.state.last_price = Some(price);
        self.state.mark_to_market();

        let signal = match self.state.indicators.snapshot() {
            Some(snapshot) => {
                self.evaluator
                    .evaluate(price, snapshot, self.state.indicators.prev_ma_values())
            }
            None => {
                debug!("Indicators not ready; skipping signal evaluation");
                return Ok(());
            }
        };

        let (side, pos_side) = match signal.decision.entry_sides() {
            Some(sides) => sides,
            None => {
                debug!("Hold at {:.2}: {}", price, signal.reason_text());
                return Ok(());
            }
        };
        info!("{:?} signal at {:.2}: {}", signal.decision, price, signal.reason_text());

        // pause may have been requested while waiting on the queue
        if self.handle.is_paused() {
            info!("Strategy paused; entry skipped");
            return Ok(());
        }
        if self.state.has_pending_open() {
            debug!("Opening order already pending; entry skipped");
            return Ok(());
        }

        let atr = match self.state.indicators.atr() {
            Some(atr) => atr,
            None => {
                warn!("ATR invalid; entry skipped");
                return Ok(());
            }
        };
        let size = match self.sizer.size(
            self.state.balance.and_then(|b| b.usable()),
            Some(atr),
            Some(price),
            self.instrument.as_ref(),
        ) {
            SizeDecision::Sized(size) => size,
            SizeDecision::Rejected(reason) => {
                warn!("Entry not sized: {}", reason);
                self.observer
                    .log(&format!("entry skipped: {}", reason), LogLevel::Warn);
                return Ok(());
            }
        };

        let (stop_loss, _) = self.risk.initial_levels(pos_side, price, atr);
        match self
            .orders
            .place(side, pos_side, size.contracts, Some(stop_loss))
            .await
        {
            Ok(order) => {
                self.observer.log(
                    &format!(
                        "opening {} {} contracts ({:.4} base) at ~{:.2}, stop {:.2}",
                        pos_side, size.contracts, size.lot_size, price, stop_loss
                    ),
                    LogLevel::Info,
                );
                self.state.pending.insert(
                    order.order_id.clone(),
                    PendingOrder {
                        order_id: order.order_id,
                        submitted_at: Instant::now(),
                        side,
                        pos_side,
                        contracts: size.contracts,
                        size: size.lot_size,
                        intent: OrderIntent::Open { atr },
                        reference_price: price,
                        last_polled: None,
                    },
                );
            }
            Err(err) => {
                warn!("Entry order failed: {}", err);
                self.observer
                    .log(&format!("entry order failed: {}", err), LogLevel::Warn);
            }
        }
        Ok(())
    }

    fn on_account(&mut self, update: AccountUpdate) {
        if update.available_balance.is_finite() {
            self.apply_available_balance(update.available_balance);
        } else {
            warn!("Ignoring non-finite account balance");
        }
    }

    fn on_venue_positions(&mut self, positions: &[VenuePosition]) {
        let described = positions
            .iter()
            .map(|p| format!("{} {}", p.pos_side, p.contracts))
            .collect::<Vec<_>>()
            .join(", ");
        self.observer.log(
            &format!("venue positions: [{}]", described),
            LogLevel::Debug,
        );
        self.observer.update_positions(&self.state.position_summaries());
    }

    /// Poll every pending order once and apply terminal results
    async fn sweep_pending(&mut self) {
        if self.state.pending.is_empty() {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_sweep {
            if now.saturating_duration_since(last) < self.config.order_sweep_interval {
                return;
            }
        }
        self.last_sweep = Some(now);

        let order_ids: Vec<String> = self.state.pending.keys().cloned().collect();
        let mut balance_stale = false;

        for order_id in order_ids {
            let status = self.orders.poll(&order_id).await;
            let polled_at = Instant::now();

            match status {
                OrderStatus::Pending => {
                    let expired_age = match self.state.pending.get_mut(&order_id) {
                        Some(order) => {
                            order.last_polled = Some(polled_at);
                            Some(order.age(polled_at))
                                .filter(|age| *age >= self.config.pending_order_timeout)
                        }
                        None => None,
                    };
                    if let Some(age) = expired_age {
                        warn!(
                            "Order {} still pending after {:?}; abandoning",
                            order_id, age
                        );
                        self.observer.log(
                            &format!("order {} abandoned after {}s", order_id, age.as_secs()),
                            LogLevel::Warn,
                        );
                        self.discard_pending(&order_id);
                    }
                }
                OrderStatus::Filled(fill) => {
                    if let Some(order) = self.state.pending.remove(&order_id) {
                        self.apply_fill(order, fill, polled_at);
                        balance_stale = true;
                    }
                }
                OrderStatus::Failed(state) => {
                    warn!("Order {} ended without fill: {}", order_id, state);
                    self.discard_pending(&order_id);
                }
                OrderStatus::Unknown => {
                    let last_seen = match self.discard_pending(&order_id) {
                        Some(PendingOrder {
                            last_polled: Some(at),
                            ..
                        }) => format!(
                            "last seen pending {}s ago",
                            polled_at.saturating_duration_since(at).as_secs()
                        ),
                        _ => "never seen pending".to_string(),
                    };
                    error!(
                        "Order {} status unknown ({}); dropped from tracking, review manually",
                        order_id, last_seen
                    );
                    self.observer.log(
                        &format!("order {} status unknown, review manually", order_id),
                        LogLevel::Error,
                    );
                }
            }
        }

        if balance_stale {
            if let Err(err) = self.refresh_balance().await {
                warn!("Balance refresh after fill failed: {}", err);
            }
        }
    }

    /// Stop tracking an order that will not fill; a close becomes retryable
    fn discard_pending(&mut self, order_id: &str) -> Option<PendingOrder> {
        let order = self.state.pending.remove(order_id)?;
        if let OrderIntent::Close { position_id, .. } = order.intent {
            if let Some(position) = self.state.position_mut(position_id) {
                position.closing_order = None;
            }
        }
        Some(order)
    }

    fn apply_fill(&mut self, order: PendingOrder, fill: Fill, now: Instant) {
        let fill_price = fill
            .avg_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .unwrap_or(order.reference_price);

        match order.intent {
            OrderIntent::Open { atr } => {
                let contracts = fill
                    .filled_contracts
                    .filter(|c| c.is_finite() && *c > 0.0)
                    .unwrap_or(order.contracts);
                let size = order.size * contracts / order.contracts;
                let levels = self.risk.initial_levels(order.pos_side, fill_price, atr);
                let position = Position::new(order.pos_side, fill_price, size, contracts, now, levels);
                info!(
                    "Opened {} position {}: {} contracts @ {:.2}, stop {:.2}, target {:.2}",
                    position.side,
                    position.id,
                    contracts,
                    fill_price,
                    position.stop_loss_price,
                    position.take_profit_price
                );
                self.state.positions.push(position);
            }
            OrderIntent::Close {
                position_id,
                reason,
            } => match self.state.remove_position(position_id) {
                Some(position) => {
                    let pnl = position.unrealized_pnl(fill_price);
                    info!(
                        "Closed {} position {} ({}) @ {:.2}, realized {:.2}",
                        position.side, position.id, reason, fill_price, pnl
                    );
                    self.observer.log(
                        &format!("closed {} position on {}: pnl {:.2}", position.side, reason, pnl),
                        LogLevel::Info,
                    );
                }
                None => warn!("Close filled for unknown position {}", position_id),
            },
        }

        self.state.trades_total += 1;
        self.health.record_trade();
        self.observer.update_positions(&self.state.position_summaries());
    }

    async fn manage_positions(&mut self) {
        let price = match self.state.last_price {
            Some(price) => price,
            None => return,
        };
        if self.state.positions.is_empty() || self.handle.is_paused() {
            return;
        }

        let exits = self.risk.manage(
            &mut self.state.positions,
            price,
            self.state.indicators.atr(),
            Instant::now(),
        );
        for exit in exits {
            self.close_position(exit).await;
        }
    }

    async fn close_position(&mut self, exit: CloseRequest) {
        let (side, contracts, size) = match self.state.position_mut(exit.position_id) {
            Some(position) => (position.side, position.contracts, position.size),
            None => return,
        };

        match self
            .orders
            .place(side.closing_order_side(), side, contracts, None)
            .await
        {
            Ok(order) => {
                if let Some(position) = self.state.position_mut(exit.position_id) {
                    position.closing_order = Some(order.order_id.clone());
                }
                self.state.pending.insert(
                    order.order_id.clone(),
                    PendingOrder {
                        order_id: order.order_id,
                        submitted_at: Instant::now(),
                        side: side.closing_order_side(),
                        pos_side: side,
                        contracts,
                        size,
                        intent: OrderIntent::Close {
                            position_id: exit.position_id,
                            reason: exit.reason,
                        },
                        reference_price: exit.price,
                        last_polled: None,
                    },
                );
            }
            Err(err) => {
                warn!("Close order for {} failed: {}", exit.position_id, err);
                self.observer.log(
                    &format!("close order failed ({}): {}", exit.reason, err),
                    LogLevel::Warn,
                );
            }
        }
    }

    fn report_health(&mut self) {
        let report = match self.health.maybe_report(Instant::now()) {
            Some(report) => report,
            None => return,
        };
        let message = report.message();
        match report.level {
            HealthLevel::NoTrades | HealthLevel::BelowMinimum => {
                warn!("{}", message);
                self.observer.log(&message, LogLevel::Warn);
            }
            HealthLevel::Healthy => {
                info!("{}", message);
                self.observer.log(&message, LogLevel::Info);
            }
        }
    }
}
