//! Trigger evaluation
//!
//! Decides whether a single observation fires a policy's trigger and how much
//! of the coverage it pays. Evaluation is pure and total: every observation
//! yields an outcome, including degenerate thresholds and curves.
//!
//! Boundary convention: an observation exactly equal to the trigger value
//! fires. Values are fixed-point decimals, so equality is exact.

use crate::policy::{Direction, PayoutStyle, PolicyParameters};
use crate::pricing::{LoadingTable, PerilLoading};
use crate::signal::SignalObservation;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of evaluating one observation against one policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutcome {
    pub fired: bool,
    /// Share of coverage paid, in [0, 1]
    pub payout_fraction: Decimal,
}

impl TriggerOutcome {
    pub const NOT_FIRED: TriggerOutcome = TriggerOutcome {
        fired: false,
        payout_fraction: Decimal::ZERO,
    };

    pub const FULL_PAYOUT: TriggerOutcome = TriggerOutcome {
        fired: true,
        payout_fraction: Decimal::ONE,
    };
}

/// Payout as a function of how far past the threshold the signal went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutCurve {
    /// 1 on any firing observation
    Binary,
    /// 0 at the threshold rising linearly to 1 at `ceiling`
    Graduated { ceiling: Decimal },
}

/// A policy trigger reduced to what evaluation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSpec {
    pub threshold: Decimal,
    pub direction: Direction,
    pub curve: PayoutCurve,
}

impl TriggerSpec {
    pub fn new(threshold: Decimal, direction: Direction, curve: PayoutCurve) -> Self {
        Self {
            threshold,
            direction,
            curve,
        }
    }

    /// Build the trigger for a policy using its peril's saturation multiple
    pub fn for_policy(policy: &PolicyParameters, loading: &PerilLoading) -> Self {
        let peril = policy.peril();
        let threshold = policy.trigger_value();
        let direction = peril.direction();

        let curve = match peril.payout_style() {
            PayoutStyle::Binary => PayoutCurve::Binary,
            PayoutStyle::Graduated => PayoutCurve::Graduated {
                ceiling: saturation_ceiling(threshold, direction, loading.saturation_multiple),
            },
        };

        Self::new(threshold, direction, curve)
    }

    /// Whether `value` is at or beyond the threshold on the loss side
    pub fn fires(&self, value: Decimal) -> bool {
        match self.direction {
            Direction::HigherIsWorse => value >= self.threshold,
            Direction::LowerIsWorse => value <= self.threshold,
        }
    }

    pub fn evaluate_value(&self, value: Decimal) -> TriggerOutcome {
        if !self.fires(value) {
            return TriggerOutcome::NOT_FIRED;
        }

        match self.curve {
            PayoutCurve::Binary => TriggerOutcome::FULL_PAYOUT,
            PayoutCurve::Graduated { ceiling } => TriggerOutcome {
                fired: true,
                payout_fraction: self.ramp(value, ceiling),
            },
        }
    }

    pub fn evaluate(&self, observation: &SignalObservation) -> TriggerOutcome {
        self.evaluate_value(observation.value)
    }

    /// Linear position of `value` between threshold and ceiling, clamped to [0, 1]
    fn ramp(&self, value: Decimal, ceiling: Decimal) -> Decimal {
        let (past, span) = match self.direction {
            Direction::HigherIsWorse => (
                value.checked_sub(self.threshold),
                ceiling.checked_sub(self.threshold),
            ),
            Direction::LowerIsWorse => (
                self.threshold.checked_sub(value),
                self.threshold.checked_sub(ceiling),
            ),
        };

        match (past, span) {
            (Some(past), Some(span)) if span > Decimal::ZERO => past
                .checked_div(span)
                .unwrap_or(Decimal::ONE)
                .clamp(Decimal::ZERO, Decimal::ONE),
            // Ceiling not beyond the threshold: saturated on firing
            _ => Decimal::ONE,
        }
    }
}

/// Ceiling where a graduated payout saturates
///
/// Higher-is-worse perils saturate at `threshold × multiple`, lower-is-worse
/// perils at `threshold / multiple`. Falls back to the threshold itself (full
/// payout on firing) when the multiple is not positive or the arithmetic
/// overflows.
pub fn saturation_ceiling(threshold: Decimal, direction: Direction, multiple: Decimal) -> Decimal {
    if multiple <= Decimal::ZERO {
        return threshold;
    }
    let ceiling = match direction {
        Direction::HigherIsWorse => threshold.checked_mul(multiple),
        Direction::LowerIsWorse => threshold.checked_div(multiple),
    };
    ceiling.unwrap_or(threshold)
}

/// Evaluate one observation against a policy using the table's saturation multiple
pub fn evaluate(
    observation: &SignalObservation,
    policy: &PolicyParameters,
    table: &LoadingTable,
) -> TriggerOutcome {
    TriggerSpec::for_policy(policy, &table.get(policy.peril())).evaluate(observation)
}
