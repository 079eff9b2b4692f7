//! Signal fetcher with bounded retry and cancellation
//!
//! Wraps a provider with the policy every fetch must follow: validate the
//! location, resolve the window to concrete bounds, retry transient failures
//! with exponential backoff, and hand back a chronologically ordered,
//! deduplicated series.

use super::{
    FetchError, FetchWindow, SignalCache, SignalObservation, SignalProvider, SignalQuery,
    SignalRequest, SignalSeries, SECONDS_PER_YEAR,
};
use crate::policy::is_valid_location;
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Retry policy for transient fetch failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts including the first (minimum 1)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Set total attempts
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set initial retry delay
    pub fn initial_delay(mut self, d: Duration) -> Self {
        self.initial_delay = d;
        self
    }

    /// Set maximum retry delay
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }
}

/// Per-call options: cancellation and an optional caller-owned cache
#[derive(Debug, Clone, Default)]
pub struct FetchOptions<'a> {
    pub cancel: CancellationToken,
    pub cache: Option<&'a SignalCache>,
}

impl<'a> FetchOptions<'a> {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a SignalCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Fetches signal series from a provider
pub struct SignalFetcher<P> {
    provider: P,
    retry: RetryConfig,
    latest_lookback: chrono::Duration,
}

impl<P: SignalProvider> SignalFetcher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            retry: RetryConfig::default(),
            latest_lookback: chrono::Duration::days(30),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// How far back to look when asked for the latest reading
    pub fn with_latest_lookback_days(mut self, days: u32) -> Self {
        self.latest_lookback = chrono::Duration::days(i64::from(days.max(1)));
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Turn a request window into concrete provider bounds as of `now`
    ///
    /// Relative windows never start before the provider's earliest record,
    /// and a lookback too long to represent starts there too.
    pub fn resolve(&self, request: &SignalRequest, now: DateTime<Utc>) -> SignalQuery {
        let earliest = self.provider.earliest_available(request.peril);
        let since = |lookback: Option<chrono::Duration>| {
            lookback
                .and_then(|d| now.checked_sub_signed(d))
                .map_or(earliest, |start| start.max(earliest))
        };

        let (start, end) = match request.window {
            FetchWindow::Latest => (since(Some(self.latest_lookback)), now),
            FetchWindow::Trailing { years } => (
                since(chrono::Duration::try_seconds(
                    i64::from(years) * SECONDS_PER_YEAR,
                )),
                now,
            ),
            FetchWindow::Range { start, end } => (start, end),
            FetchWindow::FullHistory => (earliest, now),
        };

        SignalQuery {
            peril: request.peril,
            latitude: request.latitude,
            longitude: request.longitude,
            start,
            end,
            min_value: request.min_value,
        }
    }

    /// Fetch the series for a request
    ///
    /// Empty results are valid. Only `FetchError::Transient` is retried;
    /// everything else returns immediately. Cancellation never writes to the
    /// cache, and `Latest` requests neither read nor write it.
    pub async fn fetch_signals(
        &self,
        request: &SignalRequest,
        options: &FetchOptions<'_>,
    ) -> Result<SignalSeries, FetchError> {
        if !is_valid_location(request.latitude, request.longitude) {
            return Err(FetchError::InvalidLocation {
                lat: request.latitude,
                lng: request.longitude,
            });
        }

        if options.cancel.is_cancelled() {
            telemetry::increment(CounterMetric::FetchCancelled, request.peril);
            return Err(FetchError::Cancelled);
        }

        let cache = options.cache.filter(|_| request.window != FetchWindow::Latest);

        if let Some(cache) = cache {
            if let Some(series) = cache.get(request).await {
                tracing::debug!(peril = %request.peril, observations = series.len(), "Signal cache hit");
                telemetry::increment(CounterMetric::CacheHit, request.peril);
                return Ok(series);
            }
        }

        let query = self.resolve(request, Utc::now());
        if query.start > query.end {
            return Ok(SignalSeries::new(query, Vec::new()));
        }

        let raw = self.fetch_with_retry(&query, &options.cancel).await?;
        let observations = normalize(raw, &query, request.window);

        tracing::info!(
            peril = %request.peril,
            observations = observations.len(),
            start = %query.start,
            end = %query.end,
            "Signal series fetched"
        );

        let series = SignalSeries::new(query, observations);
        if let Some(cache) = cache {
            cache.insert(request.clone(), series.clone()).await;
        }

        Ok(series)
    }

    async fn fetch_with_retry(
        &self,
        query: &SignalQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SignalObservation>, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            attempt += 1;
            telemetry::increment(CounterMetric::FetchAttempt, query.peril);

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(peril = %query.peril, attempt, "Signal fetch cancelled");
                    telemetry::increment(CounterMetric::FetchCancelled, query.peril);
                    return Err(FetchError::Cancelled);
                }
                result = self.provider.fetch(query) => result,
            };
            telemetry::record_latency(LatencyMetric::SignalFetch, query.peril, started.elapsed());

            let err = match result {
                Ok(observations) => return Ok(observations),
                Err(e) => e,
            };

            if !err.is_retryable() {
                tracing::warn!(peril = %query.peril, error = %err, kind = %err.kind(), "Signal fetch failed");
                telemetry::increment(CounterMetric::FetchFailure, query.peril);
                return Err(err);
            }

            if attempt >= max_attempts {
                tracing::error!(peril = %query.peril, attempts = attempt, error = %err, "Signal fetch retries exhausted");
                telemetry::increment(CounterMetric::FetchFailure, query.peril);
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            tracing::warn!(
                peril = %query.peril,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient signal fetch error, retrying..."
            );
            telemetry::increment(CounterMetric::FetchRetry, query.peril);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    telemetry::increment(CounterMetric::FetchCancelled, query.peril);
                    return Err(FetchError::Cancelled);
                }
                _ = sleep(delay) => {}
            }
            delay = (delay * 2).min(self.retry.max_delay);
        }
    }
}

/// Order by timestamp, drop duplicates and anything outside bounded windows
fn normalize(
    mut observations: Vec<SignalObservation>,
    query: &SignalQuery,
    window: FetchWindow,
) -> Vec<SignalObservation> {
    if window.is_bounded() {
        observations.retain(|o| o.timestamp >= query.start && o.timestamp <= query.end);
    }

    observations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut seen = HashSet::new();
    observations.retain(|o| seen.insert((o.timestamp, o.source.clone())));

    if window == FetchWindow::Latest {
        let newest = observations.pop();
        observations.clear();
        observations.extend(newest);
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Peril;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ts(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn request(window: FetchWindow) -> SignalRequest {
        SignalRequest::new(Peril::Earthquake, dec!(35.68), dec!(139.69), window)
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::default()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(2))
    }

    /// Fails with a fixed error for the first `failures` calls
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: FetchError,
        series: Vec<SignalObservation>,
    }

    impl Flaky {
        fn new(failures: u32, error: FetchError, series: Vec<SignalObservation>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                error,
                series,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SignalProvider for Flaky {
        async fn fetch(&self, _query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(self.series.clone())
            }
        }

        fn earliest_available(&self, _peril: Peril) -> DateTime<Utc> {
            ts(1990)
        }
    }

    /// Never completes
    struct Hanging;

    #[async_trait]
    impl SignalProvider for Hanging {
        async fn fetch(&self, _query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
            std::future::pending().await
        }
    }

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::default()
            .max_attempts(6)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(2));
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_resolve_windows() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]))
            .with_latest_lookback_days(7);
        let now = ts(2024);

        let q = fetcher.resolve(&request(FetchWindow::FullHistory), now);
        assert_eq!(q.start, ts(1990));
        assert_eq!(q.end, now);

        let q = fetcher.resolve(&request(FetchWindow::Latest), now);
        assert_eq!(q.end - q.start, chrono::Duration::days(7));

        let q = fetcher.resolve(&request(FetchWindow::Trailing { years: 2 }), now);
        assert_eq!((q.end - q.start).num_seconds(), 2 * SECONDS_PER_YEAR);

        let q = fetcher.resolve(
            &request(FetchWindow::Range {
                start: ts(2000),
                end: ts(2010),
            }),
            now,
        );
        assert_eq!((q.start, q.end), (ts(2000), ts(2010)));
    }

    #[test]
    fn test_resolve_clamps_long_lookbacks_to_earliest() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]))
            .with_latest_lookback_days(u32::MAX);
        let now = ts(2024);

        let q = fetcher.resolve(&request(FetchWindow::Trailing { years: 300_000 }), now);
        assert_eq!((q.start, q.end), (ts(1990), now));

        let q = fetcher.resolve(&request(FetchWindow::Trailing { years: u32::MAX }), now);
        assert_eq!(q.start, ts(1990));

        let q = fetcher.resolve(&request(FetchWindow::Trailing { years: 50 }), now);
        assert_eq!(q.start, ts(1990));

        let q = fetcher.resolve(&request(FetchWindow::Latest), now);
        assert_eq!(q.start, ts(1990));
    }

    #[test]
    fn test_resolve_carries_min_value() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]));
        let req = request(FetchWindow::FullHistory).with_min_value(dec!(3.5));
        assert_eq!(fetcher.resolve(&req, ts(2024)).min_value, Some(dec!(3.5)));
        assert_eq!(
            fetcher.resolve(&request(FetchWindow::FullHistory), ts(2024)).min_value,
            None
        );
    }

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let query = SignalQuery {
            peril: Peril::Earthquake,
            latitude: dec!(0),
            longitude: dec!(0),
            start: ts(2000),
            end: ts(2020),
            min_value: None,
        };
        let raw = vec![
            SignalObservation::new(ts(2010), dec!(6.0), "a"),
            SignalObservation::new(ts(2005), dec!(5.0), "b"),
            SignalObservation::new(ts(2010), dec!(6.0), "a"),
            SignalObservation::new(ts(2010), dec!(6.3), "c"),
        ];
        let out = normalize(raw, &query, FetchWindow::FullHistory);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].source, "b");
        assert_eq!(out[1].source, "a");
        assert_eq!(out[2].source, "c");
    }

    #[test]
    fn test_normalize_clips_bounded_windows() {
        let query = SignalQuery {
            peril: Peril::Earthquake,
            latitude: dec!(0),
            longitude: dec!(0),
            start: ts(2000),
            end: ts(2010),
            min_value: None,
        };
        let raw = vec![
            SignalObservation::new(ts(1999), dec!(7.0), "early"),
            SignalObservation::new(ts(2000), dec!(6.0), "start"),
            SignalObservation::new(ts(2011), dec!(7.0), "late"),
        ];
        let out = normalize(raw.clone(), &query, FetchWindow::Trailing { years: 10 });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "start");

        let out = normalize(raw, &query, FetchWindow::FullHistory);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_normalize_latest_keeps_newest() {
        let query = SignalQuery {
            peril: Peril::Earthquake,
            latitude: dec!(0),
            longitude: dec!(0),
            start: ts(2000),
            end: ts(2020),
            min_value: None,
        };
        let raw = vec![
            SignalObservation::new(ts(2019), dec!(5.1), "newest"),
            SignalObservation::new(ts(2001), dec!(5.0), "old"),
        ];
        let out = normalize(raw, &query, FetchWindow::Latest);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "newest");

        assert!(normalize(vec![], &query, FetchWindow::Latest).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_location_fails_without_calling_provider() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]));
        let bad = SignalRequest::new(Peril::Earthquake, dec!(91), dec!(0), FetchWindow::FullHistory);
        let err = fetcher
            .fetch_signals(&bad, &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidLocation { .. }));
        assert_eq!(fetcher.provider().calls(), 0);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let series = vec![SignalObservation::new(ts(2015), dec!(6.5), "usgs:1")];
        let fetcher = SignalFetcher::new(Flaky::new(
            2,
            FetchError::Transient("HTTP 503".into()),
            series,
        ))
        .with_retry(fast_retry());

        let out = fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(fetcher.provider().calls(), 3);
    }

    #[tokio::test]
    async fn test_series_keeps_queried_bounds() {
        let series = vec![SignalObservation::new(ts(2015), dec!(6.5), "usgs:1")];
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, series));

        let out = fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(out.query.start, ts(1990));
        assert!(out.query.end > ts(2015));
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let fetcher = SignalFetcher::new(Flaky::new(
            10,
            FetchError::Transient("timeout".into()),
            vec![],
        ))
        .with_retry(fast_retry());

        let err = fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::RetriesExhausted {
                attempts: 3,
                last_error: "Transient fetch error: timeout".into()
            }
        );
        assert_eq!(fetcher.provider().calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let fetcher = SignalFetcher::new(Flaky::new(
            10,
            FetchError::UnsupportedPeril {
                peril: Peril::Earthquake,
                reason: "HTTP 400".into(),
            },
            vec![],
        ))
        .with_retry(fast_retry());

        let err = fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedPeril { .. }));
        assert_eq!(fetcher.provider().calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]))
            .with_retry(RetryConfig::default().max_attempts(0));
        fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(fetcher.provider().calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &FetchOptions::new(cancel))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
        assert_eq!(fetcher.provider().calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_in_flight_fetch() {
        let fetcher = SignalFetcher::new(Hanging);
        let cancel = CancellationToken::new();
        let cache = SignalCache::new();
        let options = FetchOptions::new(cancel.clone()).with_cache(&cache);

        let trigger = tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let err = fetcher
            .fetch_signals(&request(FetchWindow::FullHistory), &options)
            .await
            .unwrap_err();
        trigger.await.unwrap();

        assert_eq!(err, FetchError::Cancelled);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let series = vec![SignalObservation::new(ts(2015), dec!(6.5), "usgs:1")];
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, series));
        let cache = SignalCache::new();
        let options = FetchOptions::default().with_cache(&cache);
        let req = request(FetchWindow::FullHistory);

        let first = fetcher.fetch_signals(&req, &options).await.unwrap();
        let second = fetcher.fetch_signals(&req, &options).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.provider().calls(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_latest_bypasses_cache() {
        let series = vec![SignalObservation::new(Utc::now(), dec!(5.2), "usgs:1")];
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, series));
        let cache = SignalCache::new();
        let options = FetchOptions::default().with_cache(&cache);
        let req = request(FetchWindow::Latest);

        fetcher.fetch_signals(&req, &options).await.unwrap();
        fetcher.fetch_signals(&req, &options).await.unwrap();

        assert_eq!(fetcher.provider().calls(), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let fetcher = SignalFetcher::new(Flaky::new(0, FetchError::Cancelled, vec![]));
        let out = fetcher
            .fetch_signals(
                &request(FetchWindow::Range {
                    start: ts(2020),
                    end: ts(2010),
                }),
                &FetchOptions::default(),
            )
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(fetcher.provider().calls(), 0);
    }
}
