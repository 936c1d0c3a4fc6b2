//! Configuration module

pub mod strategy;
pub mod risk;

pub use strategy::*;
pub use risk::*;
