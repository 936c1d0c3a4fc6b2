//! Venue collaborators for the swap engine: environment configuration, the
//! OKX REST client and the OKX WebSocket market feed.

pub mod config;
pub mod okx;

pub use config::{Config, Credentials};
pub use okx::{MarketFeed, OkxClient, OkxError};
