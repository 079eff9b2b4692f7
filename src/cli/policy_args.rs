//! Policy arguments shared by the pricing commands

use crate::policy::{Peril, PolicyParameters};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Peril covered (e.g. earthquake, flood, crop-yield)
    #[arg(long)]
    pub peril: Peril,

    /// Latitude of the insured location
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Decimal,

    /// Longitude of the insured location
    #[arg(long, allow_hyphen_values = true)]
    pub lng: Decimal,

    /// Trigger threshold in the peril's natural unit
    #[arg(long, allow_hyphen_values = true)]
    pub trigger: Decimal,

    /// Unit of the trigger threshold
    #[arg(long)]
    pub unit: String,

    /// Coverage amount paid on a full payout
    #[arg(long)]
    pub coverage: Decimal,

    /// Coverage term in months
    #[arg(long, default_value = "12")]
    pub term_months: u32,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl PolicyArgs {
    /// Validate into policy parameters, tagging failures with their kind
    pub fn to_policy(&self) -> anyhow::Result<PolicyParameters> {
        PolicyParameters::new(
            self.peril,
            self.lat,
            self.lng,
            self.trigger,
            &self.unit,
            self.coverage,
        )
        .and_then(|p| p.with_term_months(self.term_months))
        .map_err(|e| anyhow::anyhow!("[{}] {}", e.kind(), e))
    }

    /// Print a result in the requested format
    pub fn render<T: Serialize>(&self, value: &T, table: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Table => println!("{}", table(value)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        }
        Ok(())
    }
}
