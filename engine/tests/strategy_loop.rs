//! Strategy loop tests against an in-memory venue, on paused tokio time

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use swap_engine::prelude::*;

use common::{flat_candles, FakeVenue, RecordingObserver, INST_ID};

fn configs() -> (StrategyConfig, RiskConfig) {
    let strategy = StrategyConfig {
        kline_limit: 10,
        candle_update_interval: Duration::from_secs(10),
        ..StrategyConfig::default()
    };
    let risk = RiskConfig {
        ma_periods: vec![2, 3, 4],
        trend_ma_period: 5,
        atr_period: 3,
        ..RiskConfig::default()
    };
    (strategy, risk)
}

fn tick(last: f64) -> MarketEvent {
    MarketEvent::Ticker(Ticker {
        inst_id: INST_ID.to_string(),
        last,
        ts: 0,
    })
}

type Started = (
    mpsc::Sender<MarketEvent>,
    StrategyHandle,
    tokio::task::JoinHandle<StrategyState>,
);

fn start(venue: Arc<FakeVenue>, config: StrategyConfig, risk: RiskConfig) -> Started {
    start_with(venue, config, risk, Arc::new(TracingObserver))
}

fn start_with(
    venue: Arc<FakeVenue>,
    config: StrategyConfig,
    risk: RiskConfig,
    observer: Arc<dyn Observer>,
) -> Started {
    let (tx, rx) = mpsc::channel(100);
    let (strategy, handle) =
        StrategyLoop::new(config, risk, venue.clone(), venue, observer, rx).unwrap();
    (tx, handle, tokio::spawn(strategy.run()))
}

fn long_closes(venue: &FakeVenue) -> Vec<usize> {
    venue
        .placed()
        .iter()
        .enumerate()
        .filter(|(_, o)| o.side == OrderSide::Sell && o.pos_side == PositionSide::Long)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Warm up, enter long at 101 and fill it; returns once the position is open
async fn open_long(
    venue: &FakeVenue,
    tx: &mpsc::Sender<MarketEvent>,
    handle: &StrategyHandle,
) -> Result<()> {
    tokio::time::sleep(Duration::from_secs(12)).await;
    tx.send(tick(101.0)).await?;
    settle().await;
    assert_eq!(venue.place_calls(), 1);

    venue.fill("1", 101.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(tick(101.0)).await?;
    settle().await;
    assert_eq!(handle.status().open_positions, 1);
    Ok(())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_blocks_orders_until_resume() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let (config, risk) = configs();
    let (tx, handle, task) = start(venue.clone(), config, risk);

    // two candle refreshes so a previous snapshot exists
    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(handle.phase(), LoopPhase::Running);

    handle.pause();
    for _ in 0..3 {
        tx.send(tick(101.0)).await?;
        settle().await;
    }
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.phase(), LoopPhase::Paused);
    assert_eq!(venue.place_calls(), 0);

    handle.resume();
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(tick(101.0)).await?;
    settle().await;

    // one entry; later buy signals wait for the pending opening order
    assert_eq!(venue.place_calls(), 1);
    let order = &venue.placed()[0];
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.pos_side, PositionSide::Long);
    assert_eq!(order.contracts, 250.0);
    assert_eq!(order.stop_loss_price, Some(97.0));

    handle.stop();
    let state = task.await?;
    assert_eq!(handle.phase(), LoopPhase::Stopped);
    assert_eq!(state.pending.len(), 1);
    assert!(state.positions.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fill_then_stop_loss_closes_position() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let (config, risk) = configs();
    let (tx, handle, task) = start(venue.clone(), config, risk);

    tokio::time::sleep(Duration::from_secs(12)).await;
    tx.send(tick(101.0)).await?;
    settle().await;
    assert_eq!(venue.place_calls(), 1);
    let balance_queries_before = venue.balance_queries.load(Ordering::SeqCst);

    // entry fills; the next tick drives a sweep
    venue.fill("1", 101.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(tick(101.0)).await?;
    settle().await;

    let status = handle.status();
    assert_eq!(status.open_positions, 1);
    assert_eq!(status.pending_orders, 0);
    assert_eq!(status.trades_total, 1);
    assert_eq!(
        venue.balance_queries.load(Ordering::SeqCst),
        balance_queries_before + 1
    );

    // past the minimum hold; 95 is below stop 97 minus the 1% buffer
    tokio::time::sleep(Duration::from_secs(6)).await;
    tx.send(tick(95.0)).await?;
    settle().await;

    let placed = venue.placed();
    let close = placed
        .iter()
        .find(|o| o.side == OrderSide::Sell && o.pos_side == PositionSide::Long)
        .expect("closing order placed");
    assert_eq!(close.contracts, 250.0);
    assert_eq!(close.stop_loss_price, None);
    let close_id = (placed
        .iter()
        .position(|o| o.side == OrderSide::Sell && o.pos_side == PositionSide::Long)
        .unwrap()
        + 1)
    .to_string();

    venue.fill(&close_id, 95.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(tick(95.0)).await?;
    settle().await;

    handle.stop();
    let state = task.await?;
    assert!(state.positions.is_empty());
    assert_eq!(state.trades_total, 2);
    assert!(state.pending.values().all(|o| o.pos_side == PositionSide::Short));
    assert_eq!(
        venue.balance_queries.load(Ordering::SeqCst),
        balance_queries_before + 2
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_closed_queue_ends_loop() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let (config, risk) = configs();
    let (tx, handle, task) = start(venue.clone(), config, risk);

    drop(tx);
    let state = task.await?;
    assert_eq!(handle.phase(), LoopPhase::Stopped);
    assert_eq!(state.balance.map(|b| b.available), Some(1000.0));
    assert!(state.indicators.snapshot().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_missing_instrument_disables_entries_only() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let observer = Arc::new(RecordingObserver::default());
    let (mut config, risk) = configs();
    config.inst_id = "ETH-USDT-SWAP".to_string();
    let (tx, handle, task) = start_with(venue.clone(), config, risk, observer.clone());

    tokio::time::sleep(Duration::from_secs(30)).await;
    tx.send(MarketEvent::Ticker(Ticker {
        inst_id: "ETH-USDT-SWAP".to_string(),
        last: 101.0,
        ts: 0,
    }))
    .await?;
    settle().await;
    assert_eq!(handle.status().last_price, Some(101.0));
    assert!(observer.contains(LogLevel::Warn, "entry skipped"));
    handle.stop();

    let state = task.await?;
    assert_eq!(venue.place_calls(), 0);
    assert_eq!(state.balance.map(|b| b.available), Some(1000.0));
    assert!(state.indicators.snapshot().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_candle_outage_still_closes_positions() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let observer = Arc::new(RecordingObserver::default());
    let (config, risk) = configs();
    let (tx, handle, task) = start_with(venue.clone(), config, risk, observer.clone());
    open_long(&venue, &tx, &handle).await?;

    // the refresh due at 20s fails; the stop must still fire
    venue.fail_candles.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    tx.send(tick(80.0)).await?;
    settle().await;

    assert!(observer.contains(LogLevel::Warn, "candle fetch failed"));
    assert_eq!(handle.phase(), LoopPhase::Running);
    assert_eq!(handle.status().last_price, Some(80.0));
    assert_eq!(long_closes(&venue).len(), 1);

    handle.stop();
    let state = task.await?;
    assert_eq!(state.positions.len(), 1);
    assert!(state.positions[0].is_closing());
    assert!(state.indicators.snapshot().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_balance_outage_retries_with_backoff() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    venue.fail_balance.store(true, Ordering::SeqCst);
    let (config, risk) = configs();
    let (tx, handle, task) = start(venue.clone(), config, risk);

    tokio::time::sleep(Duration::from_secs(12)).await;
    for _ in 0..20 {
        tx.send(tick(101.0)).await?;
    }
    settle().await;

    // ticks are handled, entries are not, retries stay throttled
    let status = handle.status();
    assert_eq!(status.last_price, Some(101.0));
    assert_eq!(status.available_balance, None);
    assert_eq!(venue.place_calls(), 0);
    assert!(venue.balance_queries.load(Ordering::SeqCst) <= 4);

    venue.fail_balance.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(handle.status().available_balance, Some(1000.0));
    tx.send(tick(101.0)).await?;
    settle().await;
    assert_eq!(venue.place_calls(), 1);

    handle.stop();
    task.await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stale_open_order_is_abandoned() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let observer = Arc::new(RecordingObserver::default());
    let (config, risk) = configs();
    let (tx, handle, task) = start_with(venue.clone(), config, risk, observer.clone());

    tokio::time::sleep(Duration::from_secs(12)).await;
    tx.send(tick(101.0)).await?;
    settle().await;
    assert_eq!(handle.status().pending_orders, 1);

    // the venue keeps reporting `live` past the 300 s limit
    tokio::time::sleep(Duration::from_secs(310)).await;
    assert_eq!(handle.status().pending_orders, 0);
    assert!(observer.contains(LogLevel::Warn, "order 1 abandoned"));

    tx.send(tick(101.0)).await?;
    settle().await;
    assert_eq!(venue.place_calls(), 2);

    handle.stop();
    let state = task.await?;
    assert!(state.positions.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_order_state_is_dropped() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let observer = Arc::new(RecordingObserver::default());
    let (config, risk) = configs();
    let (tx, handle, task) = start_with(venue.clone(), config, risk, observer.clone());

    tokio::time::sleep(Duration::from_secs(12)).await;
    tx.send(tick(101.0)).await?;
    settle().await;
    venue.set_order_state("1", OrderState::Other("mmp_canceled".to_string()), None);

    // five attempts one second apart, then the order is given up on
    tokio::time::sleep(Duration::from_secs(15)).await;
    let status = handle.status();
    assert_eq!(status.pending_orders, 0);
    assert_eq!(status.open_positions, 0);
    assert!(observer.contains(LogLevel::Error, "order 1 status unknown"));

    handle.stop();
    let state = task.await?;
    assert_eq!(state.trades_total, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_canceled_close_is_retried() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let (config, risk) = configs();
    let (tx, handle, task) = start(venue.clone(), config, risk);
    open_long(&venue, &tx, &handle).await?;

    tokio::time::sleep(Duration::from_secs(6)).await;
    tx.send(tick(95.0)).await?;
    settle().await;
    let closes = long_closes(&venue);
    assert_eq!(closes.len(), 1);

    venue.set_order_state(&closes[0].to_string(), OrderState::Canceled, None);
    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(tick(95.0)).await?;
    settle().await;
    assert_eq!(long_closes(&venue).len(), 2);

    handle.stop();
    let state = task.await?;
    assert_eq!(state.positions.len(), 1);
    assert!(state.positions[0].is_closing());
    assert_eq!(state.trades_total, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_quiet_window_reports_no_trades() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(10, 100.0), 1000.0));
    let observer = Arc::new(RecordingObserver::default());
    let (config, risk) = configs();
    let (_tx, handle, task) = start_with(venue.clone(), config, risk, observer.clone());

    tokio::time::sleep(Duration::from_secs(1790)).await;
    assert!(!observer.contains(LogLevel::Warn, "No trades"));
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(observer.contains(LogLevel::Warn, "No trades in the last 30 minutes"));

    handle.stop();
    task.await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_candles_never_trade() -> Result<()> {
    let venue = Arc::new(FakeVenue::new(flat_candles(3, 100.0), 1000.0));
    let (config, risk) = configs();
    let (tx, handle, task) = start(venue.clone(), config, risk);

    tokio::time::sleep(Duration::from_secs(25)).await;
    tx.send(tick(101.0)).await?;
    settle().await;
    handle.stop();

    let state = task.await?;
    assert!(state.indicators.snapshot().is_none());
    assert_eq!(venue.place_calls(), 0);
    Ok(())
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let venue = Arc::new(FakeVenue::new(Vec::new(), 0.0));
    let (_tx, rx) = mpsc::channel(1);
    let (config, _) = configs();
    let risk = RiskConfig {
        ma_periods: vec![5, 10],
        ..RiskConfig::default()
    };

    let result = StrategyLoop::new(
        config,
        risk,
        venue.clone(),
        venue,
        Arc::new(TracingObserver),
        rx,
    );
    assert!(matches!(result, Err(ConfigError::TooFewMaPeriods { .. })));
}
