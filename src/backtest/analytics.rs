//! Backtest analytics and reporting

use super::BacktestEvent;
use crate::policy::{Peril, PolicyParameters};
use crate::pricing::PremiumBreakdown;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Simulated payouts over simulated premium for the replayed window
///
/// The premium rate is held constant: the window collects
/// `rate × history_years × 12 / term_months` in premium-equivalent coverage
/// fractions. `None` when that is zero.
pub fn implied_loss_ratio(
    total_payout_fraction: Decimal,
    premium_rate: Decimal,
    history_years: Decimal,
    term_months: u32,
) -> Option<Decimal> {
    if term_months == 0 {
        return None;
    }
    let periods = history_years.checked_mul(dec!(12))? / Decimal::from(term_months);
    let premium_equivalent = premium_rate.checked_mul(periods)?;
    if premium_equivalent <= Decimal::ZERO {
        return None;
    }
    total_payout_fraction.checked_div(premium_equivalent)
}

/// Complete backtest report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub peril: Peril,
    /// Every replayed observation, chronological
    pub events: Vec<BacktestEvent>,
    pub total_fired: usize,
    /// Sum of payout fractions across events
    pub total_payout_fraction: Decimal,
    pub total_payout_amount: Decimal,
    /// Span of the replayed history
    pub history_years: Decimal,
    /// Gross premium rate held constant across the window
    pub premium_rate: Decimal,
    /// Premium the window would have collected
    pub premium_equivalent_amount: Decimal,
    /// Payouts over premium, absent when no premium would have been collected
    pub implied_loss_ratio: Option<Decimal>,
    pub low_confidence: bool,
}

impl BacktestResult {
    /// Summarize replayed events priced at `breakdown`'s gross rate
    pub fn from_events(
        policy: &PolicyParameters,
        events: Vec<BacktestEvent>,
        breakdown: &PremiumBreakdown,
    ) -> Self {
        let total_fired = events.iter().filter(|e| e.fired).count();
        let total_payout_fraction = events
            .iter()
            .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.payout_fraction));
        let total_payout_amount = events
            .iter()
            .fold(Decimal::ZERO, |acc, e| acc.saturating_add(e.payout_amount));

        let history_years = breakdown.history_years;
        let premium_rate = breakdown.gross_premium_rate;
        let periods = history_years.saturating_mul(dec!(12)) / Decimal::from(policy.term_months());
        let premium_equivalent_amount = premium_rate
            .saturating_mul(periods)
            .saturating_mul(policy.coverage_amount());

        Self {
            peril: policy.peril(),
            total_fired,
            total_payout_fraction,
            total_payout_amount,
            history_years,
            premium_rate,
            premium_equivalent_amount,
            implied_loss_ratio: implied_loss_ratio(
                total_payout_fraction,
                premium_rate,
                history_years,
                policy.term_months(),
            ),
            low_confidence: breakdown.low_confidence,
            events,
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let loss_ratio = match self.implied_loss_ratio {
            Some(ratio) => format!("{:.2}%", ratio * dec!(100)),
            None => "n/a".to_string(),
        };

        let mut fired_lines = String::new();
        for event in self.events.iter().filter(|e| e.fired) {
            fired_lines.push_str(&format!(
                "{}  {:>10}  {:>6.2}%  {:.2}\n",
                event.timestamp.format("%Y-%m-%d"),
                event.observed_value,
                event.payout_fraction * dec!(100),
                event.payout_amount,
            ));
        }
        if fired_lines.is_empty() {
            fired_lines.push_str("(no trigger events)\n");
        }

        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS: {}
══════════════════════════════════════════════════════

HISTORY
───────────────────────────────────────────────────────
Observations:     {}
Span:             {:.1} years
Trigger Events:   {}

ECONOMICS
───────────────────────────────────────────────────────
Premium Rate:     {:.4}%
Total Premium:    {:.2}
Total Payout:     {:.2}
Loss Ratio:       {}

TRIGGER EVENTS
───────────────────────────────────────────────────────
{}══════════════════════════════════════════════════════
"#,
            self.peril,
            self.events.len(),
            self.history_years,
            self.total_fired,
            self.premium_rate * dec!(100),
            self.premium_equivalent_amount,
            self.total_payout_amount,
            loss_ratio,
            fired_lines,
        )
    }
}
