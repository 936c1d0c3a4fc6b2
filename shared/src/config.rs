use dotenv::dotenv;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use swap_engine::config::{RiskConfig, StrategyConfig};
use swap_engine::error::ConfigError;

const LIVE_REST_URL: &str = "https://www.okx.com";
const LIVE_WS_PUBLIC_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
const LIVE_WS_PRIVATE_URL: &str = "wss://ws.okx.com:8443/ws/v5/private";
const DEMO_WS_PUBLIC_URL: &str = "wss://wspap.okx.com:8443/ws/v5/public";
const DEMO_WS_PRIVATE_URL: &str = "wss://wspap.okx.com:8443/ws/v5/private";

#[derive(Debug, Error, PartialEq)]
pub enum EnvError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Engine(#[from] ConfigError),
}

/// OKX API credentials
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub rest_url: String,
    pub ws_public_url: String,
    pub ws_private_url: String,
    /// Send `x-simulated-trading: 1` (OKX demo trading)
    pub simulated: bool,
    /// OKX trade mode, `cross` or `isolated`
    pub td_mode: String,
    pub request_timeout: Duration,
    /// Capacity of the market-event queue between feed and strategy
    pub event_queue_capacity: usize,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build from any key lookup; unset and empty values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let credentials = Credentials {
            api_key: env.required("OKX_API_KEY")?,
            secret_key: env.required("OKX_SECRET_KEY")?,
            passphrase: env.required("OKX_PASSPHRASE")?,
        };
        let simulated = env.parse("OKX_SIMULATED", true)?;
        let (public_default, private_default) = if simulated {
            (DEMO_WS_PUBLIC_URL, DEMO_WS_PRIVATE_URL)
        } else {
            (LIVE_WS_PUBLIC_URL, LIVE_WS_PRIVATE_URL)
        };

        let defaults = StrategyConfig::default();
        let strategy = StrategyConfig {
            inst_id: env.string("INST_ID", &defaults.inst_id),
            kline_limit: env.parse("KLINE_LIMIT", defaults.kline_limit)?,
            candle_update_interval: env.secs("CANDLE_UPDATE_SECS", defaults.candle_update_interval)?,
            queue_timeout: env.secs("QUEUE_TIMEOUT_SECS", defaults.queue_timeout)?,
            pause_poll: defaults.pause_poll,
            fault_backoff: env.secs("FAULT_BACKOFF_SECS", defaults.fault_backoff)?,
            pending_order_timeout: env.secs(
                "PENDING_ORDER_TIMEOUT_SECS",
                defaults.pending_order_timeout,
            )?,
            order_sweep_interval: defaults.order_sweep_interval,
            poll_attempts: env.parse("POLL_ATTEMPTS", defaults.poll_attempts)?,
            poll_delay: defaults.poll_delay,
            min_hold: env.secs("MIN_HOLD_SECS", defaults.min_hold)?,
            report_interval: env.secs("REPORT_INTERVAL_SECS", defaults.report_interval)?,
            min_trades_per_report: env.parse(
                "MIN_TRADES_PER_REPORT",
                defaults.min_trades_per_report,
            )?,
        };

        let defaults = RiskConfig::default();
        let risk = RiskConfig {
            ma_periods: env.list("MA_PERIODS", defaults.ma_periods)?,
            trend_ma_period: env.parse("TREND_MA_PERIOD", defaults.trend_ma_period)?,
            atr_period: env.parse("ATR_PERIOD", defaults.atr_period)?,
            atr_multiplier: env.parse("ATR_MULTIPLIER", defaults.atr_multiplier)?,
            take_profit_multiplier: env.parse(
                "TAKE_PROFIT_MULTIPLIER",
                defaults.take_profit_multiplier,
            )?,
            risk_percent: env.parse("RISK_PERCENT", defaults.risk_percent)?,
        };
        risk.validate()?;
        strategy.validate(&risk)?;

        Ok(Config {
            credentials,
            rest_url: env.string("OKX_REST_URL", LIVE_REST_URL),
            ws_public_url: env.string("OKX_WS_PUBLIC_URL", public_default),
            ws_private_url: env.string("OKX_WS_PRIVATE_URL", private_default),
            simulated,
            td_mode: env.string("TD_MODE", "cross"),
            request_timeout: env.secs("REQUEST_TIMEOUT_SECS", Duration::from_secs(10))?,
            event_queue_capacity: env.parse("EVENT_QUEUE_CAPACITY", 1000usize)?.max(1),
            strategy,
            risk,
        })
    }
}

struct Env<'a, F>(&'a F);

impl<'a, F> Env<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, EnvError> {
        self.get(key).ok_or(EnvError::Missing(key))
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &'static str, default: T) -> Result<T, EnvError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| EnvError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn secs(&self, key: &'static str, default: Duration) -> Result<Duration, EnvError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }

    fn list(&self, key: &'static str, default: Vec<usize>) -> Result<Vec<usize>, EnvError> {
        let value = match self.get(key) {
            None => return Ok(default),
            Some(value) => value,
        };
        value
            .split(',')
            .map(|part| part.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EnvError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
    }
}
