//! Strategy module
//!
//! Signal types and the entry rule evaluator.

pub mod evaluator;
pub mod signal;

pub use evaluator::*;
pub use signal::*;
