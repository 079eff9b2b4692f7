//! Status command implementation

use super::{build_engine, cancel_on_ctrl_c, fetch_failure, PolicyArgs};
use crate::config::Config;
use crate::engine::LiveStatus;
use crate::signal::FetchOptions;
use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let policy = self.policy.to_policy()?;
        let engine = build_engine(config)?;
        let options = FetchOptions::new(cancel_on_ctrl_c());

        let status = engine
            .live_status(&policy, &options)
            .await
            .map_err(fetch_failure)?;

        self.policy.render(&status, |s| format_status(s, policy.trigger_unit()))
    }
}

fn format_status(status: &LiveStatus, unit: &str) -> String {
    match &status.observation {
        None => "No recent reading available".to_string(),
        Some(obs) => format!(
            "Latest reading: {} {} at {} ({})\n  Fired: {}\n  Payout: {:.2}%",
            obs.value,
            unit,
            obs.timestamp.format("%Y-%m-%d %H:%M UTC"),
            obs.source,
            if status.outcome.fired { "YES" } else { "no" },
            status.outcome.payout_fraction * rust_decimal_macros::dec!(100),
        ),
    }
}
