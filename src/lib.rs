//! parametric-pricing: premium pricing and trigger backtesting for
//! parametric insurance pools
//!
//! This library provides the core components for:
//! - Policy parameters and the peril catalogue
//! - Historical signal fetching with retry, cancellation and caching
//! - Trigger evaluation with binary and graduated payouts
//! - Premium pricing from trigger frequency and severity
//! - Backtesting a trigger against the full signal history
//! - Logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod config;
pub mod engine;
pub mod policy;
pub mod pricing;
pub mod signal;
pub mod telemetry;
pub mod trigger;
