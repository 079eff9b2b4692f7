use clap::Parser;
use parametric_pricing::cli::{Cli, Commands};
use parametric_pricing::config::Config;
use parametric_pricing::policy::Peril;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = parametric_pricing::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Quote(args) => args.execute(&config).await?,
        Commands::Backtest(args) => args.execute(&config).await?,
        Commands::Status(args) => args.execute(&config).await?,
        Commands::Perils => {
            let router = config.build_router()?;
            let table = config.loading_table()?;
            println!(
                "{:<22} {:<10} {:<10} {:>8} {:>8}  {}",
                "PERIL", "UNIT", "PAYOUT", "LOADING", "FLOOR", "SOURCE"
            );
            for peril in Peril::ALL {
                let loading = table.get(peril);
                println!(
                    "{:<22} {:<10} {:<10} {:>8} {:>8}  {}",
                    peril.as_str(),
                    peril.natural_unit(),
                    format!("{:?}", peril.payout_style()).to_lowercase(),
                    loading.loading_factor,
                    loading.floor_premium_rate,
                    if router.supports(peril) { "configured" } else { "none" },
                );
            }
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Fetcher: attempts={}, backoff={}..{}ms, timeout={}s",
                config.fetcher.max_attempts,
                config.fetcher.initial_backoff_ms,
                config.fetcher.max_backoff_ms,
                config.fetcher.request_timeout_secs
            );
            println!("  USGS: {}", config.providers.usgs_url);
            println!("  Open-Meteo: {}", config.providers.open_meteo_archive_url);
            println!(
                "  Oracle: {}",
                config.providers.oracle_url.as_deref().unwrap_or("(none)")
            );
            println!(
                "  Pricing: lookback={}y, min history={}y",
                config.pricing.lookback_years, config.pricing.min_history_years
            );
            for (peril, loading) in config.loading_table()?.iter() {
                println!(
                    "  Loading {}: factor={}, saturation={}x, floor={}%",
                    peril,
                    loading.loading_factor,
                    loading.saturation_multiple,
                    loading.floor_premium_rate * rust_decimal_macros::dec!(100)
                );
            }
        }
    }

    Ok(())
}
