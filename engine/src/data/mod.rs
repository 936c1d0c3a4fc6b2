//! Market data module
//!
//! Candle structures and chronological normalization.

pub mod candle;

pub use candle::*;
