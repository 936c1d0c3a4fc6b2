//! Exchange integration module
//!
//! Venue-neutral types and the async collaborator traits the strategy loop
//! talks to. Concrete venue clients live outside this crate.

pub mod api;
pub mod lifecycle;
pub mod market;
pub mod order;

pub use api::*;
pub use lifecycle::*;
pub use market::*;
pub use order::*;
