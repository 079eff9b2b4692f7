//! Backtesting module
//!
//! Replays a policy's trigger over historical observations

mod analytics;
mod replay;

pub use analytics::{implied_loss_ratio, BacktestResult};
pub use replay::{replay, BacktestEvent};
