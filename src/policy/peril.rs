//! Peril catalogue
//!
//! Each peril carries its natural trigger unit, the direction in which the
//! signal gets worse, and whether payouts are binary or graduated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of insured risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Peril {
    Earthquake,
    Flood,
    Drought,
    CropYield,
    ExtremeHeat,
    FlightDelay,
    ShippingDisruption,
    CyberOutage,
}

/// Which side of the threshold is the loss side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fires when the observed value is at or above the threshold
    HigherIsWorse,
    /// Fires when the observed value is at or below the threshold
    LowerIsWorse,
}

/// Shape of the payout once the trigger has fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStyle {
    /// Full payout on any firing observation
    Binary,
    /// Linear ramp from the threshold up to a saturation ceiling
    Graduated,
}

impl Peril {
    /// Every supported peril, in display order
    pub const ALL: [Peril; 8] = [
        Peril::Earthquake,
        Peril::Flood,
        Peril::Drought,
        Peril::CropYield,
        Peril::ExtremeHeat,
        Peril::FlightDelay,
        Peril::ShippingDisruption,
        Peril::CyberOutage,
    ];

    /// Stable kebab-case name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Peril::Earthquake => "earthquake",
            Peril::Flood => "flood",
            Peril::Drought => "drought",
            Peril::CropYield => "crop-yield",
            Peril::ExtremeHeat => "extreme-heat",
            Peril::FlightDelay => "flight-delay",
            Peril::ShippingDisruption => "shipping-disruption",
            Peril::CyberOutage => "cyber-outage",
        }
    }

    /// Unit tag a policy trigger for this peril must be expressed in
    pub fn natural_unit(&self) -> &'static str {
        match self {
            Peril::Earthquake => "magnitude",
            Peril::Flood => "m",
            Peril::Drought => "mm",
            Peril::CropYield => "t/ha",
            Peril::ExtremeHeat => "celsius",
            Peril::FlightDelay => "minutes",
            Peril::ShippingDisruption => "hours",
            Peril::CyberOutage => "minutes",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Peril::Drought | Peril::CropYield => Direction::LowerIsWorse,
            _ => Direction::HigherIsWorse,
        }
    }

    pub fn payout_style(&self) -> PayoutStyle {
        match self {
            Peril::Flood | Peril::ExtremeHeat | Peril::Drought | Peril::CropYield => {
                PayoutStyle::Graduated
            }
            Peril::Earthquake
            | Peril::FlightDelay
            | Peril::ShippingDisruption
            | Peril::CyberOutage => PayoutStyle::Binary,
        }
    }
}

impl fmt::Display for Peril {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Peril {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Peril::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("unknown peril: {}", s))
    }
}
