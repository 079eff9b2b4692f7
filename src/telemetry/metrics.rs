//! Prometheus metrics

use crate::policy::Peril;
use std::net::SocketAddr;
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One provider round trip
    SignalFetch,
    /// Full premium calculation including fetch
    Quote,
    /// Full backtest including fetch
    Backtest,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Provider call started
    FetchAttempt,
    /// Transient failure followed by another attempt
    FetchRetry,
    /// Fetch gave up with an error
    FetchFailure,
    /// Fetch aborted by the caller
    FetchCancelled,
    /// Series served from a caller-supplied cache
    CacheHit,
    /// Premium breakdown produced
    QuoteComputed,
    /// Backtest report produced
    BacktestComputed,
}

impl LatencyMetric {
    pub fn name(&self) -> &'static str {
        match self {
            LatencyMetric::SignalFetch => "parametric_signal_fetch_seconds",
            LatencyMetric::Quote => "parametric_quote_seconds",
            LatencyMetric::Backtest => "parametric_backtest_seconds",
        }
    }
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::FetchAttempt => "parametric_fetch_attempts_total",
            CounterMetric::FetchRetry => "parametric_fetch_retries_total",
            CounterMetric::FetchFailure => "parametric_fetch_failures_total",
            CounterMetric::FetchCancelled => "parametric_fetch_cancelled_total",
            CounterMetric::CacheHit => "parametric_signal_cache_hits_total",
            CounterMetric::QuoteComputed => "parametric_quotes_total",
            CounterMetric::BacktestComputed => "parametric_backtests_total",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, peril: Peril, duration: Duration) {
    ::metrics::histogram!(metric.name(), "peril" => peril.as_str()).record(duration.as_secs_f64());
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric, peril: Peril) {
    ::metrics::counter!(metric.name(), "peril" => peril.as_str()).increment(1);
}

/// Start the Prometheus scrape endpoint on the given port
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus metrics endpoint listening");
    Ok(())
}
