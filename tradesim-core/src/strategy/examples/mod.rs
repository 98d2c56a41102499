//! Demonstration strategies used by tests, benchmarks and the CLI.

pub mod buy_and_hold;
pub mod sma_cross;

pub use buy_and_hold::{BuyAndHold, BuyAndHoldParams};
pub use sma_cross::{SmaCross, SmaCrossParams};
