//! Portfolio management module
//!
//! Positions, the balance view, position sizing and trailing risk levels.

pub mod balance;
pub mod position;
pub mod risk;
pub mod sizing;

pub use balance::*;
pub use position::*;
pub use risk::*;
pub use sizing::*;
