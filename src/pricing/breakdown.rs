//! Premium breakdown and the pure aggregation that produces it

use super::stats::{expected_frequency, expected_severity};
use super::PerilLoading;
use crate::policy::{Peril, PolicyParameters};
use crate::trigger::TriggerOutcome;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Decimal places kept on the settlement amount
const AMOUNT_DP: u32 = 8;

/// Transparent premium computation for one policy
///
/// Invariants: `gross_premium_rate >= pure_risk_rate >= 0` and
/// `premium_amount > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumBreakdown {
    pub peril: Peril,
    pub coverage_amount: Decimal,
    /// Observations evaluated
    pub observation_count: usize,
    /// Observations that fired
    pub fired_count: usize,
    /// Years of history the frequency was measured over
    pub history_years: Decimal,
    /// Firings per year
    pub expected_frequency: Decimal,
    /// Mean payout fraction given a firing
    pub expected_severity: Decimal,
    /// Coverage term as a fraction of a year
    pub exposure_period_fraction: Decimal,
    /// frequency × severity × exposure
    pub pure_risk_rate: Decimal,
    pub loading_factor: Decimal,
    pub floor_premium_rate: Decimal,
    /// Whether the floor, not the loaded pure rate, set the gross rate
    pub floor_applied: bool,
    pub gross_premium_rate: Decimal,
    pub premium_amount: Decimal,
    /// Too little history for the frequency estimate to be trusted
    pub low_confidence: bool,
}

/// Price a policy from its evaluated history
///
/// Pure: identical inputs give identical output.
pub fn price_outcomes(
    policy: &PolicyParameters,
    outcomes: &[TriggerOutcome],
    history_years: Decimal,
    loading: &PerilLoading,
    min_history_years: Decimal,
) -> PremiumBreakdown {
    let fired_count = outcomes.iter().filter(|o| o.fired).count();
    let expected_frequency = expected_frequency(fired_count, history_years);
    let expected_severity = expected_severity(outcomes);
    let exposure_period_fraction = policy.exposure_period_fraction();

    let pure_risk_rate = expected_frequency
        .saturating_mul(expected_severity)
        .saturating_mul(exposure_period_fraction);

    // Loading factors below one would undercut the pure rate
    let loading_factor = loading.loading_factor.max(Decimal::ONE);
    let floor_premium_rate = loading.floor_premium_rate.max(Decimal::ZERO);
    let loaded_rate = pure_risk_rate.saturating_mul(loading_factor);

    let floor_applied = floor_premium_rate > loaded_rate;
    let gross_premium_rate = loaded_rate.max(floor_premium_rate);

    let premium_amount = gross_premium_rate
        .saturating_mul(policy.coverage_amount())
        .round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::AwayFromZero);

    PremiumBreakdown {
        peril: policy.peril(),
        coverage_amount: policy.coverage_amount(),
        observation_count: outcomes.len(),
        fired_count,
        history_years,
        expected_frequency,
        expected_severity,
        exposure_period_fraction,
        pure_risk_rate,
        loading_factor,
        floor_premium_rate,
        floor_applied,
        gross_premium_rate,
        premium_amount,
        low_confidence: outcomes.is_empty() || history_years < min_history_years,
    }
}

impl PremiumBreakdown {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               PREMIUM QUOTE: {}
══════════════════════════════════════════════════════

RISK
───────────────────────────────────────────────────────
Observations:     {} ({} fired over {:.1} years)
Frequency:        {:.4} / year
Severity:         {:.2}%
Exposure:         {:.2} years
Pure Risk Rate:   {:.4}%

PREMIUM
───────────────────────────────────────────────────────
Loading Factor:   {:.2}x
Floor Rate:       {:.4}%{}
Gross Rate:       {:.4}%
Coverage:         {:.2}
Premium:          {:.2}
{}══════════════════════════════════════════════════════
"#,
            self.peril,
            self.observation_count,
            self.fired_count,
            self.history_years,
            self.expected_frequency,
            self.expected_severity * dec!(100),
            self.exposure_period_fraction,
            self.pure_risk_rate * dec!(100),
            self.loading_factor,
            self.floor_premium_rate * dec!(100),
            if self.floor_applied { " (applied)" } else { "" },
            self.gross_premium_rate * dec!(100),
            self.coverage_amount,
            self.premium_amount,
            if self.low_confidence {
                "WARNING: low confidence, insufficient signal history\n"
            } else {
                ""
            },
        )
    }
}
