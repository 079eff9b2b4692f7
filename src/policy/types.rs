//! Policy parameters and validation errors

use super::Peril;
use crate::signal::ErrorKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest coverage amount accepted, in settlement currency units
pub const MAX_COVERAGE: Decimal = dec!(1000000000000000);

/// Longest coverage term accepted, in months
pub const MAX_TERM_MONTHS: u32 = 120;

/// Policy construction errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// Latitude or longitude outside WGS84 bounds
    #[error("Invalid location: lat={lat}, lng={lng}")]
    InvalidLocation { lat: Decimal, lng: Decimal },
    /// Coverage amount not in (0, MAX_COVERAGE]
    #[error("Coverage amount out of range: {0}")]
    InvalidCoverage(Decimal),
    /// Trigger unit does not match the peril's natural unit
    #[error("Trigger unit '{unit}' does not match {peril} (expected '{expected}')")]
    UnitMismatch {
        peril: Peril,
        unit: String,
        expected: &'static str,
    },
    /// Term outside 1..=MAX_TERM_MONTHS
    #[error("Coverage term out of range: {0} months")]
    InvalidTerm(u32),
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::InvalidLocation { .. } => ErrorKind::InvalidLocation,
            _ => ErrorKind::InvalidPolicy,
        }
    }
}

/// Returns true when the coordinates are valid WGS84 decimal degrees
pub(crate) fn is_valid_location(lat: Decimal, lng: Decimal) -> bool {
    (dec!(-90)..=dec!(90)).contains(&lat) && (dec!(-180)..=dec!(180)).contains(&lng)
}

/// Everything pricing and backtesting needs to know about a policy
///
/// Fields are private so a value can only exist once validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyParameters {
    peril: Peril,
    latitude: Decimal,
    longitude: Decimal,
    trigger_value: Decimal,
    trigger_unit: String,
    coverage_amount: Decimal,
    term_months: u32,
}

/// Unvalidated wire form, checked by `PolicyParameters::new` on deserialize
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    peril: Peril,
    latitude: Decimal,
    longitude: Decimal,
    trigger_value: Decimal,
    trigger_unit: String,
    coverage_amount: Decimal,
    #[serde(default = "default_term_months")]
    term_months: u32,
}

fn default_term_months() -> u32 {
    12
}

impl<'de> Deserialize<'de> for PolicyParameters {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPolicy::deserialize(deserializer)?;
        PolicyParameters::new(
            raw.peril,
            raw.latitude,
            raw.longitude,
            raw.trigger_value,
            raw.trigger_unit,
            raw.coverage_amount,
        )
        .and_then(|p| p.with_term_months(raw.term_months))
        .map_err(serde::de::Error::custom)
    }
}

impl PolicyParameters {
    /// Build a twelve-month policy, validating location, unit and coverage
    pub fn new(
        peril: Peril,
        latitude: Decimal,
        longitude: Decimal,
        trigger_value: Decimal,
        trigger_unit: impl Into<String>,
        coverage_amount: Decimal,
    ) -> Result<Self, PolicyError> {
        if !is_valid_location(latitude, longitude) {
            return Err(PolicyError::InvalidLocation {
                lat: latitude,
                lng: longitude,
            });
        }

        let trigger_unit = trigger_unit.into();
        let expected = peril.natural_unit();
        if !trigger_unit.trim().eq_ignore_ascii_case(expected) {
            return Err(PolicyError::UnitMismatch {
                peril,
                unit: trigger_unit,
                expected,
            });
        }

        if coverage_amount <= Decimal::ZERO || coverage_amount > MAX_COVERAGE {
            return Err(PolicyError::InvalidCoverage(coverage_amount));
        }

        Ok(Self {
            peril,
            latitude,
            longitude,
            trigger_value,
            trigger_unit: expected.to_string(),
            coverage_amount,
            term_months: default_term_months(),
        })
    }

    /// Replace the coverage term
    pub fn with_term_months(mut self, months: u32) -> Result<Self, PolicyError> {
        if months == 0 || months > MAX_TERM_MONTHS {
            return Err(PolicyError::InvalidTerm(months));
        }
        self.term_months = months;
        Ok(self)
    }

    pub fn peril(&self) -> Peril {
        self.peril
    }

    pub fn latitude(&self) -> Decimal {
        self.latitude
    }

    pub fn longitude(&self) -> Decimal {
        self.longitude
    }

    pub fn trigger_value(&self) -> Decimal {
        self.trigger_value
    }

    pub fn trigger_unit(&self) -> &str {
        &self.trigger_unit
    }

    pub fn coverage_amount(&self) -> Decimal {
        self.coverage_amount
    }

    pub fn term_months(&self) -> u32 {
        self.term_months
    }

    /// Fraction of a year the policy is exposed for
    pub fn exposure_period_fraction(&self) -> Decimal {
        Decimal::from(self.term_months) / dec!(12)
    }
}
