//! Chronological replay of a trigger over a signal series

use crate::signal::SignalObservation;
use crate::trigger::TriggerSpec;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One observation as the policy would have seen it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestEvent {
    pub timestamp: DateTime<Utc>,
    pub observed_value: Decimal,
    pub source: String,
    pub fired: bool,
    pub payout_fraction: Decimal,
    /// payout_fraction × coverage
    pub payout_amount: Decimal,
}

/// Evaluate every observation in order, firing or not
///
/// The series is expected to be chronological already; the output preserves
/// its order one-to-one.
pub fn replay(
    spec: &TriggerSpec,
    series: &[SignalObservation],
    coverage_amount: Decimal,
) -> Vec<BacktestEvent> {
    series
        .iter()
        .map(|observation| {
            let outcome = spec.evaluate(observation);
            BacktestEvent {
                timestamp: observation.timestamp,
                observed_value: observation.value,
                source: observation.source.clone(),
                fired: outcome.fired,
                payout_fraction: outcome.payout_fraction,
                payout_amount: outcome.payout_fraction.saturating_mul(coverage_amount),
            }
        })
        .collect()
}
