//! Frequency and severity statistics over an evaluated history

use crate::signal::{SignalSeries, SECONDS_PER_YEAR};
use crate::trigger::TriggerOutcome;
use rust_decimal::Decimal;

/// Length of the history a series covers, in years
///
/// Measured over the bounds the series was queried for, so quiet years
/// before the first and after the last reading still count. An empty series
/// has no history.
pub fn history_years(series: &SignalSeries) -> Decimal {
    if series.is_empty() {
        return Decimal::ZERO;
    }

    let seconds = (series.query.end - series.query.start).num_seconds();
    Decimal::from(seconds.max(0)) / Decimal::from(SECONDS_PER_YEAR)
}

/// Firings per year; histories shorter than a year count as one year
pub fn expected_frequency(fired: usize, history_years: Decimal) -> Decimal {
    if fired == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(fired) / history_years.max(Decimal::ONE)
}

/// Mean payout fraction over firing outcomes, 0 when none fired
pub fn expected_severity(outcomes: &[TriggerOutcome]) -> Decimal {
    let (count, total) = outcomes
        .iter()
        .filter(|o| o.fired)
        .fold((0u64, Decimal::ZERO), |(n, sum), o| {
            (n + 1, sum + o.payout_fraction)
        });

    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}
