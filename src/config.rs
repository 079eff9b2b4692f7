//! Configuration types for parametric-pricing

use crate::engine::EngineSettings;
use crate::policy::Peril;
use crate::pricing::{LoadingOverride, LoadingTable};
use crate::signal::{
    HttpConfig, OpenMeteoProvider, OracleProvider, PerilRouter, RetryConfig, UsgsProvider,
    OPEN_METEO_ARCHIVE_URL, USGS_FDSN_URL,
};
use crate::telemetry::LogFormat;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Longest trailing window a quote may price over
pub const MAX_LOOKBACK_YEARS: u32 = 200;

/// Longest window searched for a live reading
pub const MAX_LATEST_LOOKBACK_DAYS: u32 = 3650;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Per-peril loading overrides keyed by peril name
    #[serde(default)]
    pub loading: HashMap<String, LoadingOverride>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Signal fetch retry and timeout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Total attempts per fetch including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap on the delay between retries (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-request HTTP timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Days searched when asked for the latest reading
    #[serde(default = "default_latest_lookback_days")]
    pub latest_lookback_days: u32,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_max_backoff_ms() -> u64 {
    5_000
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_latest_lookback_days() -> u32 {
    30
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
            request_timeout_secs: 15,
            latest_lookback_days: 30,
        }
    }
}

/// Upstream signal source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_usgs_url")]
    pub usgs_url: String,

    #[serde(default = "default_open_meteo_archive_url")]
    pub open_meteo_archive_url: String,

    /// Generic oracle endpoint serving every peril without a dedicated source
    #[serde(default)]
    pub oracle_url: Option<String>,

    /// Search radius around the insured location (km)
    #[serde(default = "default_earthquake_radius_km")]
    pub earthquake_radius_km: Decimal,

    /// Catalogue cutoff; weaker events are never requested
    #[serde(default = "default_earthquake_min_magnitude")]
    pub earthquake_min_magnitude: Decimal,
}

fn default_usgs_url() -> String {
    USGS_FDSN_URL.to_string()
}
fn default_open_meteo_archive_url() -> String {
    OPEN_METEO_ARCHIVE_URL.to_string()
}
fn default_earthquake_radius_km() -> Decimal {
    Decimal::new(100, 0)
}
fn default_earthquake_min_magnitude() -> Decimal {
    Decimal::new(45, 1) // 4.5
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            usgs_url: default_usgs_url(),
            open_meteo_archive_url: default_open_meteo_archive_url(),
            oracle_url: None,
            earthquake_radius_km: default_earthquake_radius_km(),
            earthquake_min_magnitude: default_earthquake_min_magnitude(),
        }
    }
}

/// Pricing history configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    /// Trailing years of history used for quotes
    #[serde(default = "default_lookback_years")]
    pub lookback_years: u32,

    /// Shorter histories are flagged low-confidence
    #[serde(default = "default_min_history_years")]
    pub min_history_years: Decimal,
}

fn default_lookback_years() -> u32 {
    30
}
fn default_min_history_years() -> Decimal {
    Decimal::new(5, 0)
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            lookback_years: 30,
            min_history_years: Decimal::new(5, 0),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus exporter port; no exporter when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot price with
    pub fn validate(&self) -> anyhow::Result<()> {
        self.loading_table()?;
        if !(1..=MAX_LOOKBACK_YEARS).contains(&self.pricing.lookback_years) {
            anyhow::bail!(
                "pricing.lookback_years must be between 1 and {}",
                MAX_LOOKBACK_YEARS
            );
        }
        if !(1..=MAX_LATEST_LOOKBACK_DAYS).contains(&self.fetcher.latest_lookback_days) {
            anyhow::bail!(
                "fetcher.latest_lookback_days must be between 1 and {}",
                MAX_LATEST_LOOKBACK_DAYS
            );
        }
        if self.pricing.min_history_years < Decimal::ZERO {
            anyhow::bail!("pricing.min_history_years must not be negative");
        }
        if self.fetcher.request_timeout_secs == 0 {
            anyhow::bail!("fetcher.request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Default loading table with the `[loading.<peril>]` overrides applied
    pub fn loading_table(&self) -> anyhow::Result<LoadingTable> {
        let overrides = self
            .loading
            .iter()
            .map(|(name, o)| {
                Peril::from_str(name)
                    .map(|p| (p, *o))
                    .map_err(|e| anyhow::anyhow!("[loading.{}]: {}", name, e))
            })
            .collect::<anyhow::Result<HashMap<_, _>>>()?;

        Ok(LoadingTable::from_overrides(&overrides)?)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(self.fetcher.max_attempts)
            .initial_delay(Duration::from_millis(self.fetcher.initial_backoff_ms))
            .max_delay(Duration::from_millis(self.fetcher.max_backoff_ms))
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.fetcher.request_timeout_secs),
            ..HttpConfig::default()
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            lookback_years: self.pricing.lookback_years,
            min_history_years: self.pricing.min_history_years,
        }
    }

    /// Wire the configured providers into a router
    ///
    /// USGS serves earthquakes, Open-Meteo drought and extreme heat, and the
    /// oracle (when configured) every remaining peril.
    pub fn build_router(&self) -> anyhow::Result<PerilRouter> {
        let http = self.http_config();
        let p = &self.providers;

        let usgs = UsgsProvider::new(
            &p.usgs_url,
            p.earthquake_radius_km,
            p.earthquake_min_magnitude,
            &http,
        )
        .context("Failed to build USGS provider")?;
        let open_meteo = OpenMeteoProvider::new(&p.open_meteo_archive_url, &http)
            .context("Failed to build Open-Meteo provider")?;

        let mut router = PerilRouter::new()
            .route(Peril::Earthquake, Arc::new(usgs))
            .route_all([Peril::Drought, Peril::ExtremeHeat], Arc::new(open_meteo));

        if let Some(url) = &p.oracle_url {
            let oracle =
                OracleProvider::new(url, &http).context("Failed to build oracle provider")?;
            router = router.fallback(Peril::ALL, Arc::new(oracle));
        }

        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [fetcher]
            max_attempts = 6
            initial_backoff_ms = 100
            max_backoff_ms = 2000
            request_timeout_secs = 10
            latest_lookback_days = 14

            [providers]
            usgs_url = "http://localhost:8080/fdsnws/event/1"
            oracle_url = "http://localhost:9000"
            earthquake_radius_km = 250
            earthquake_min_magnitude = 5.0

            [pricing]
            lookback_years = 20
            min_history_years = 3

            [loading.flood]
            loading_factor = 2.5

            [telemetry]
            log_level = "debug"
            log_format = "json"
            metrics_port = 9090
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.fetcher.max_attempts, 6);
        assert_eq!(config.fetcher.latest_lookback_days, 14);
        assert_eq!(config.providers.oracle_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.providers.earthquake_radius_km, dec!(250));
        assert_eq!(config.providers.open_meteo_archive_url, OPEN_METEO_ARCHIVE_URL);
        assert_eq!(config.pricing.lookback_years, 20);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.telemetry.metrics_port, Some(9090));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.fetcher.max_attempts, 4);
        assert_eq!(config.pricing.lookback_years, 30);
        assert_eq!(config.pricing.min_history_years, dec!(5));
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
        assert!(config.telemetry.metrics_port.is_none());
        assert!(config.providers.oracle_url.is_none());
        assert_eq!(config.loading_table().unwrap(), LoadingTable::default());
    }

    #[test]
    fn test_bundled_example_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml.example")).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_loading_overrides_apply() {
        let config: Config = toml::from_str(
            r#"
            [loading.crop_yield]
            floor_premium_rate = 0.02

            [loading.cyber-outage]
            loading_factor = 3
            "#,
        )
        .unwrap();

        let table = config.loading_table().unwrap();
        assert_eq!(table.get(Peril::CropYield).floor_premium_rate, dec!(0.02));
        assert_eq!(table.get(Peril::CropYield).loading_factor, dec!(1.4));
        assert_eq!(table.get(Peril::CyberOutage).loading_factor, dec!(3));
    }

    #[test]
    fn test_unknown_peril_rejected() {
        let config: Config = toml::from_str("[loading.hail]\nloading_factor = 2").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_loading_rejected() {
        let config: Config = toml::from_str("[loading.flood]\nloading_factor = 0.5").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lookback_bounds() {
        for bad in ["[pricing]\nlookback_years = 0", "[pricing]\nlookback_years = 300000"] {
            let config: Config = toml::from_str(bad).unwrap();
            assert!(config.validate().is_err(), "{}", bad);
        }
        let config: Config = toml::from_str("[pricing]\nlookback_years = 200").unwrap();
        assert!(config.validate().is_ok());

        for bad in ["[fetcher]\nlatest_lookback_days = 0", "[fetcher]\nlatest_lookback_days = 4000000000"] {
            let config: Config = toml::from_str(bad).unwrap();
            assert!(config.validate().is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_retry_and_http_config() {
        let config = Config::default();
        let retry = config.retry_config();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.initial_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_secs(5));
        assert_eq!(config.http_config().timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_build_router_routes() {
        let config = Config::default();
        let router = config.build_router().unwrap();
        assert_eq!(
            router.supported_perils(),
            vec![Peril::Earthquake, Peril::Drought, Peril::ExtremeHeat]
        );

        let mut config = Config::default();
        config.providers.oracle_url = Some("http://localhost:9000".to_string());
        let router = config.build_router().unwrap();
        assert_eq!(router.supported_perils().len(), Peril::ALL.len());
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pricing]\nlookback_years = 12").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.pricing.lookback_years, 12);
        assert_eq!(config.engine_settings().lookback_years, 12);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
