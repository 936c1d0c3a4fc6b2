//! OKX v5 REST client and WebSocket market feed

pub mod client;
pub mod error;
pub mod feed;
pub mod responses;
pub mod signer;

pub use client::OkxClient;
pub use error::OkxError;
pub use feed::MarketFeed;
