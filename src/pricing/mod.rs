//! Premium pricing module
//!
//! Turns evaluated trigger outcomes into a risk-loaded premium

mod breakdown;
mod loading;
mod stats;

pub use breakdown::{price_outcomes, PremiumBreakdown};
pub use loading::{LoadingError, LoadingOverride, LoadingTable, PerilLoading};
pub use stats::{expected_frequency, expected_severity, history_years};
