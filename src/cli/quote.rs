//! Quote command implementation

use super::{build_engine, cancel_on_ctrl_c, fetch_failure, PolicyArgs};
use crate::config::Config;
use crate::signal::FetchOptions;
use clap::Args;

#[derive(Args, Debug)]
pub struct QuoteArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,
}

impl QuoteArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let policy = self.policy.to_policy()?;
        let engine = build_engine(config)?;
        let options = FetchOptions::new(cancel_on_ctrl_c());

        tracing::info!(peril = %policy.peril(), coverage = %policy.coverage_amount(), "Pricing policy...");
        let breakdown = engine
            .calculate_premium(&policy, &options)
            .await
            .map_err(fetch_failure)?;

        self.policy.render(&breakdown, |b| b.format_table())
    }
}
