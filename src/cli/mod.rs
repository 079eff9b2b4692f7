//! CLI interface for parametric-pricing
//!
//! Provides subcommands for:
//! - `quote`: Price a policy from its trailing history
//! - `backtest`: Replay a trigger over the full signal history
//! - `status`: Evaluate the latest reading against a trigger
//! - `perils`: List supported perils and their loading
//! - `config`: Show the effective configuration

mod backtest;
mod policy_args;
mod quote;
mod status;

pub use backtest::BacktestArgs;
pub use policy_args::{OutputFormat, PolicyArgs};
pub use quote::QuoteArgs;
pub use status::StatusArgs;

use crate::config::Config;
use crate::engine::QuoteEngine;
use crate::signal::{FetchError, PerilRouter, SignalFetcher};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "parametric")]
#[command(about = "Premium pricing and trigger backtesting for parametric insurance")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Price a policy
    Quote(QuoteArgs),
    /// Replay a trigger over historical signals
    Backtest(BacktestArgs),
    /// Evaluate the latest signal reading
    Status(StatusArgs),
    /// List supported perils
    Perils,
    /// Show configuration
    Config,
}

/// Engine wired to the configured providers
pub fn build_engine(config: &Config) -> anyhow::Result<QuoteEngine<PerilRouter>> {
    let fetcher = SignalFetcher::new(config.build_router()?)
        .with_retry(config.retry_config())
        .with_latest_lookback_days(config.fetcher.latest_lookback_days);

    Ok(QuoteEngine::new(
        fetcher,
        config.loading_table()?,
        config.engine_settings(),
    ))
}

/// Token cancelled on Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling...");
            token.cancel();
        }
    });
    cancel
}

/// Attach the stable kind tag to a fetch failure
pub(crate) fn fetch_failure(err: FetchError) -> anyhow::Error {
    anyhow::anyhow!("[{}] {}", err.kind(), err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Peril;

    #[test]
    fn test_parse_quote_command() {
        let cli = Cli::try_parse_from([
            "parametric",
            "quote",
            "--peril",
            "earthquake",
            "--lat",
            "35.68",
            "--lng",
            "139.69",
            "--trigger",
            "6.0",
            "--unit",
            "magnitude",
            "--coverage",
            "10000",
        ])
        .unwrap();

        assert_eq!(cli.config, "config.toml");
        match cli.command {
            Commands::Quote(args) => {
                assert_eq!(args.policy.peril, Peril::Earthquake);
                assert_eq!(args.policy.term_months, 12);
                assert_eq!(args.policy.format, OutputFormat::Table);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_coordinates_and_json() {
        let cli = Cli::try_parse_from([
            "parametric",
            "--config",
            "custom.toml",
            "backtest",
            "--peril",
            "drought",
            "--lat=-33.87",
            "--lng=151.21",
            "--trigger",
            "20",
            "--unit",
            "mm",
            "--coverage",
            "5000",
            "--term-months",
            "6",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Commands::Backtest(args) => {
                assert_eq!(args.policy.term_months, 6);
                assert_eq!(args.policy.format, OutputFormat::Json);
                assert!(args.policy.to_policy().is_ok());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_peril_rejected() {
        let result = Cli::try_parse_from([
            "parametric",
            "status",
            "--peril",
            "volcano",
            "--lat",
            "0",
            "--lng",
            "0",
            "--trigger",
            "1",
            "--unit",
            "magnitude",
            "--coverage",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_fetch_failure_carries_kind() {
        let err = fetch_failure(FetchError::Cancelled);
        assert!(err.to_string().starts_with("[cancelled]"));
    }
}
