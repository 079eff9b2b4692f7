//! Per-peril loading table
//!
//! Single authoritative source for loading factors, saturation multiples and
//! floor premium rates. The defaults are provisional calibration, not
//! verified actuarial constants; deployments override them from config.

use crate::policy::Peril;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Highest loading factor accepted from configuration
pub const MAX_LOADING_FACTOR: Decimal = dec!(10);

/// Loading table validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadingError {
    #[error("{peril}: loading factor {value} outside [1, 10]")]
    LoadingFactorOutOfRange { peril: Peril, value: Decimal },
    #[error("{peril}: saturation multiple must be positive, got {value}")]
    NonPositiveSaturation { peril: Peril, value: Decimal },
    #[error("{peril}: floor premium rate {value} outside (0, 1]")]
    FloorOutOfRange { peril: Peril, value: Decimal },
}

/// Pricing constants for one peril
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerilLoading {
    /// Multiplier over the pure risk rate (margin, volatility, cost)
    pub loading_factor: Decimal,
    /// Graduated payouts saturate this many times past the threshold
    pub saturation_multiple: Decimal,
    /// Minimum gross premium rate
    pub floor_premium_rate: Decimal,
}

impl PerilLoading {
    pub fn new(loading_factor: Decimal, saturation_multiple: Decimal, floor_premium_rate: Decimal) -> Self {
        Self {
            loading_factor,
            saturation_multiple,
            floor_premium_rate,
        }
    }

    /// Provisional defaults
    pub fn default_for(peril: Peril) -> Self {
        match peril {
            Peril::Earthquake => Self::new(dec!(1.8), dec!(2.0), dec!(0.004)),
            Peril::Flood => Self::new(dec!(1.6), dec!(2.0), dec!(0.006)),
            Peril::Drought => Self::new(dec!(1.5), dec!(2.0), dec!(0.005)),
            Peril::CropYield => Self::new(dec!(1.4), dec!(2.0), dec!(0.006)),
            Peril::ExtremeHeat => Self::new(dec!(1.5), dec!(1.25), dec!(0.004)),
            Peril::FlightDelay => Self::new(dec!(1.4), dec!(2.0), dec!(0.010)),
            Peril::ShippingDisruption => Self::new(dec!(1.7), dec!(2.0), dec!(0.008)),
            Peril::CyberOutage => Self::new(dec!(2.2), dec!(2.0), dec!(0.010)),
        }
    }

    fn validate(&self, peril: Peril) -> Result<(), LoadingError> {
        if self.loading_factor < Decimal::ONE || self.loading_factor > MAX_LOADING_FACTOR {
            return Err(LoadingError::LoadingFactorOutOfRange {
                peril,
                value: self.loading_factor,
            });
        }
        if self.saturation_multiple <= Decimal::ZERO {
            return Err(LoadingError::NonPositiveSaturation {
                peril,
                value: self.saturation_multiple,
            });
        }
        if self.floor_premium_rate <= Decimal::ZERO || self.floor_premium_rate > Decimal::ONE {
            return Err(LoadingError::FloorOutOfRange {
                peril,
                value: self.floor_premium_rate,
            });
        }
        Ok(())
    }
}

/// Partial per-peril override as written in config
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LoadingOverride {
    pub loading_factor: Option<Decimal>,
    pub saturation_multiple: Option<Decimal>,
    pub floor_premium_rate: Option<Decimal>,
}

/// Read-only peril → loading lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadingTable {
    entries: BTreeMap<Peril, PerilLoading>,
}

impl Default for LoadingTable {
    fn default() -> Self {
        Self {
            entries: Peril::ALL
                .into_iter()
                .map(|p| (p, PerilLoading::default_for(p)))
                .collect(),
        }
    }
}

impl LoadingTable {
    /// Defaults with config overrides applied field by field
    pub fn from_overrides(overrides: &HashMap<Peril, LoadingOverride>) -> Result<Self, LoadingError> {
        let mut table = Self::default();
        for (peril, o) in overrides {
            let base = table.get(*peril);
            table.entries.insert(
                *peril,
                PerilLoading {
                    loading_factor: o.loading_factor.unwrap_or(base.loading_factor),
                    saturation_multiple: o.saturation_multiple.unwrap_or(base.saturation_multiple),
                    floor_premium_rate: o.floor_premium_rate.unwrap_or(base.floor_premium_rate),
                },
            );
        }
        table.validate()?;
        Ok(table)
    }

    /// Replace one entry
    pub fn with_entry(mut self, peril: Peril, entry: PerilLoading) -> Self {
        self.entries.insert(peril, entry);
        self
    }

    pub fn get(&self, peril: Peril) -> PerilLoading {
        self.entries
            .get(&peril)
            .copied()
            .unwrap_or_else(|| PerilLoading::default_for(peril))
    }

    pub fn validate(&self) -> Result<(), LoadingError> {
        self.entries
            .iter()
            .try_for_each(|(peril, entry)| entry.validate(*peril))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Peril, PerilLoading)> + '_ {
        self.entries.iter().map(|(p, e)| (*p, *e))
    }
}
