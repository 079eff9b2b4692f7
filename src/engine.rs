//! Quote engine
//!
//! Fetches signals, evaluates every observation against the policy trigger
//! and aggregates the outcomes. The engine holds only read-only
//! configuration, so concurrent calls for different policies share nothing
//! mutable.

use crate::backtest::{replay, BacktestResult};
use crate::pricing::{history_years, price_outcomes, LoadingTable, PremiumBreakdown};
use crate::policy::{Direction, PolicyParameters};
use crate::signal::{
    FetchError, FetchOptions, FetchWindow, SignalFetcher, SignalObservation, SignalProvider,
    SignalRequest, SignalSeries,
};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use crate::trigger::{TriggerOutcome, TriggerSpec};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// History settings used when pricing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Trailing years of history a premium is estimated from
    pub lookback_years: u32,
    /// Histories shorter than this are flagged low-confidence
    pub min_history_years: Decimal,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookback_years: 30,
            min_history_years: dec!(5),
        }
    }
}

/// Most recent reading and what it would mean for the policy now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub observation: Option<SignalObservation>,
    pub outcome: TriggerOutcome,
}

/// Prices and backtests policies against a signal provider
pub struct QuoteEngine<P> {
    fetcher: SignalFetcher<P>,
    loading: LoadingTable,
    settings: EngineSettings,
}

impl<P: SignalProvider> QuoteEngine<P> {
    pub fn new(fetcher: SignalFetcher<P>, loading: LoadingTable, settings: EngineSettings) -> Self {
        Self {
            fetcher,
            loading,
            settings,
        }
    }

    pub fn fetcher(&self) -> &SignalFetcher<P> {
        &self.fetcher
    }

    pub fn loading_table(&self) -> &LoadingTable {
        &self.loading
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn trigger_for(&self, policy: &PolicyParameters) -> TriggerSpec {
        TriggerSpec::for_policy(policy, &self.loading.get(policy.peril()))
    }

    /// Readings below a higher-is-worse trigger can never fire, so providers
    /// may drop them from a history. Live status keeps every reading.
    fn request(&self, policy: &PolicyParameters, window: FetchWindow) -> SignalRequest {
        let request =
            SignalRequest::new(policy.peril(), policy.latitude(), policy.longitude(), window);
        match policy.peril().direction() {
            Direction::HigherIsWorse if window != FetchWindow::Latest => {
                request.with_min_value(policy.trigger_value())
            }
            _ => request,
        }
    }

    /// Price a policy from its trailing lookback window
    pub async fn calculate_premium(
        &self,
        policy: &PolicyParameters,
        options: &FetchOptions<'_>,
    ) -> Result<PremiumBreakdown, FetchError> {
        let span = tracing::info_span!("quote", request_id = %Uuid::new_v4(), peril = %policy.peril());
        async {
            let started = Instant::now();
            let window = FetchWindow::Trailing {
                years: self.settings.lookback_years,
            };
            let series = self
                .fetcher
                .fetch_signals(&self.request(policy, window), options)
                .await?;

            let breakdown = self.price_series(policy, &series);

            tracing::info!(
                observations = breakdown.observation_count,
                fired = breakdown.fired_count,
                gross_rate = %breakdown.gross_premium_rate,
                premium = %breakdown.premium_amount,
                low_confidence = breakdown.low_confidence,
                "Premium calculated"
            );
            telemetry::increment(CounterMetric::QuoteComputed, policy.peril());
            telemetry::record_latency(LatencyMetric::Quote, policy.peril(), started.elapsed());

            Ok(breakdown)
        }
        .instrument(span)
        .await
    }

    /// Replay the trigger over the provider's full history
    pub async fn run_backtest(
        &self,
        policy: &PolicyParameters,
        options: &FetchOptions<'_>,
    ) -> Result<BacktestResult, FetchError> {
        let span = tracing::info_span!("backtest", request_id = %Uuid::new_v4(), peril = %policy.peril());
        async {
            let started = Instant::now();
            let window = FetchWindow::FullHistory;
            let series = self
                .fetcher
                .fetch_signals(&self.request(policy, window), options)
                .await?;

            let result = self.backtest_series(policy, &series);

            tracing::info!(
                observations = result.events.len(),
                fired = result.total_fired,
                loss_ratio = ?result.implied_loss_ratio,
                "Backtest complete"
            );
            telemetry::increment(CounterMetric::BacktestComputed, policy.peril());
            telemetry::record_latency(LatencyMetric::Backtest, policy.peril(), started.elapsed());

            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Evaluate the latest available reading
    pub async fn live_status(
        &self,
        policy: &PolicyParameters,
        options: &FetchOptions<'_>,
    ) -> Result<LiveStatus, FetchError> {
        let span = tracing::info_span!("status", request_id = %Uuid::new_v4(), peril = %policy.peril());
        async {
            let series = self
                .fetcher
                .fetch_signals(&self.request(policy, FetchWindow::Latest), options)
                .await?;

            let observation = series.last().cloned();
            let outcome = observation
                .as_ref()
                .map(|o| self.trigger_for(policy).evaluate(o))
                .unwrap_or(TriggerOutcome::NOT_FIRED);

            tracing::debug!(has_reading = observation.is_some(), fired = outcome.fired, "Live status evaluated");

            Ok(LiveStatus {
                observation,
                outcome,
            })
        }
        .instrument(span)
        .await
    }

    /// Price an already-fetched series
    pub fn price_series(&self, policy: &PolicyParameters, series: &SignalSeries) -> PremiumBreakdown {
        let spec = self.trigger_for(policy);
        let outcomes: Vec<TriggerOutcome> = series.iter().map(|o| spec.evaluate(o)).collect();
        price_outcomes(
            policy,
            &outcomes,
            history_years(series),
            &self.loading.get(policy.peril()),
            self.settings.min_history_years,
        )
    }

    /// Backtest an already-fetched series
    pub fn backtest_series(&self, policy: &PolicyParameters, series: &SignalSeries) -> BacktestResult {
        let spec = self.trigger_for(policy);
        let events = replay(&spec, series, policy.coverage_amount());
        let outcomes: Vec<TriggerOutcome> = events
            .iter()
            .map(|e| TriggerOutcome {
                fired: e.fired,
                payout_fraction: e.payout_fraction,
            })
            .collect();
        let breakdown = price_outcomes(
            policy,
            &outcomes,
            history_years(series),
            &self.loading.get(policy.peril()),
            self.settings.min_history_years,
        );
        BacktestResult::from_events(policy, events, &breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Peril;
    use crate::signal::{SignalQuery, SECONDS_PER_YEAR};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    /// Returns a fixed series regardless of the query
    struct Static(Vec<SignalObservation>);

    #[async_trait]
    impl SignalProvider for Static {
        async fn fetch(&self, _query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn engine(series: Vec<SignalObservation>) -> QuoteEngine<Static> {
        QuoteEngine::new(
            SignalFetcher::new(Static(series)),
            LoadingTable::default(),
            EngineSettings::default(),
        )
    }

    fn quake_policy() -> PolicyParameters {
        PolicyParameters::new(
            Peril::Earthquake,
            dec!(35.68),
            dec!(139.69),
            dec!(6.0),
            "magnitude",
            dec!(10000),
        )
        .unwrap()
    }

    fn years_ago(years: i64, value: Decimal) -> SignalObservation {
        SignalObservation::new(
            Utc::now() - Duration::seconds(years * SECONDS_PER_YEAR),
            value,
            format!("usgs:{}", years),
        )
    }

    #[tokio::test]
    async fn test_calculate_premium_uses_lookback_span() {
        let engine = engine(vec![years_ago(20, dec!(6.4)), years_ago(5, dec!(5.1))]);
        let b = engine
            .calculate_premium(&quake_policy(), &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(b.observation_count, 2);
        assert_eq!(b.fired_count, 1);
        assert_eq!(b.history_years, dec!(30));
        assert_eq!(b.expected_frequency, dec!(1) / dec!(30));
        assert_eq!(b.loading_factor, dec!(1.8));
        assert!(b.gross_premium_rate >= b.pure_risk_rate);
    }

    #[tokio::test]
    async fn test_live_status_latest_reading() {
        let engine = engine(vec![years_ago(0, dec!(6.2))]);
        let status = engine
            .live_status(&quake_policy(), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(status.observation.unwrap().value, dec!(6.2));
        assert_eq!(status.outcome, TriggerOutcome::FULL_PAYOUT);
    }

    #[tokio::test]
    async fn test_live_status_without_readings() {
        let engine = engine(vec![]);
        let status = engine
            .live_status(&quake_policy(), &FetchOptions::default())
            .await
            .unwrap();
        assert!(status.observation.is_none());
        assert_eq!(status.outcome, TriggerOutcome::NOT_FIRED);
    }

    fn catalogue(start: i32, observations: Vec<SignalObservation>) -> SignalSeries {
        let query = SignalQuery {
            peril: Peril::Earthquake,
            latitude: dec!(35.68),
            longitude: dec!(139.69),
            start: Utc.with_ymd_and_hms(start, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            min_value: None,
        };
        SignalSeries::new(query, observations)
    }

    fn quake(year: i32, magnitude: Decimal) -> SignalObservation {
        SignalObservation::new(
            Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap(),
            magnitude,
            format!("usgs:{}", year),
        )
    }

    #[test]
    fn test_backtest_series_spans_queried_history() {
        let engine = engine(vec![]);
        let series = catalogue(1900, vec![quake(2000, dec!(6.5)), quake(2020, dec!(4.9))]);
        let result = engine.backtest_series(&quake_policy(), &series);
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.total_fired, 1);
        assert!(result.history_years > dec!(123.9) && result.history_years < dec!(124.1));
        assert!(result.implied_loss_ratio.is_some());
    }

    #[test]
    fn test_sparse_catalogue_prices_over_whole_history() {
        let engine = engine(vec![]);
        let result = engine.backtest_series(&quake_policy(), &catalogue(1900, vec![quake(1950, dec!(7.2))]));

        assert_eq!(result.total_fired, 1);
        assert!(result.history_years > dec!(123.9));
        // 1/124 firings a year at 1.8x loading, nowhere near a full coverage
        assert!(result.premium_rate < dec!(0.02));
        assert!(result.premium_rate >= dec!(0.004));
        let ratio = result.implied_loss_ratio.unwrap();
        assert!(ratio > dec!(0) && ratio < dec!(1));
    }

    #[test]
    fn test_request_floors_higher_is_worse_perils_at_trigger() {
        let engine = engine(vec![]);
        let request = engine.request(&quake_policy(), FetchWindow::FullHistory);
        assert_eq!(request.min_value, Some(dec!(6.0)));
        assert_eq!(engine.request(&quake_policy(), FetchWindow::Latest).min_value, None);

        let drought = PolicyParameters::new(
            Peril::Drought,
            dec!(-1.29),
            dec!(36.82),
            dec!(20),
            "mm",
            dec!(10000),
        )
        .unwrap();
        assert_eq!(engine.request(&drought, FetchWindow::FullHistory).min_value, None);
    }

    #[tokio::test]
    async fn test_oversized_lookback_clamps_to_provider_history() {
        let engine = QuoteEngine::new(
            SignalFetcher::new(Static(vec![years_ago(20, dec!(6.4))])),
            LoadingTable::default(),
            EngineSettings {
                lookback_years: 300_000,
                ..EngineSettings::default()
            },
        );
        let b = engine
            .calculate_premium(&quake_policy(), &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(b.fired_count, 1);
        // Static's history starts at the epoch
        assert!(b.history_years > dec!(50));
    }
}
