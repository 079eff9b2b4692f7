//! USGS FDSN event service provider for earthquake signals
//!
//! Queries the event catalogue for quakes within a radius of the insured
//! location. Each catalogue event becomes one observation whose value is the
//! reported magnitude.

use super::http::{get_text, HttpConfig};
use super::{FetchError, SignalObservation, SignalProvider, SignalQuery};
use crate::policy::Peril;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// USGS FDSN event service base URL
pub const USGS_FDSN_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1";

/// GeoJSON feature collection returned by the FDSN query endpoint
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    /// Magnitude, absent for some preliminary events
    mag: Option<Decimal>,
    /// Origin time (milliseconds since epoch)
    time: i64,
}

/// Parse an FDSN GeoJSON body into observations, skipping events without a magnitude
fn parse_feature_collection(body: &str) -> Result<Vec<SignalObservation>, FetchError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

    Ok(collection
        .features
        .into_iter()
        .filter_map(|f| {
            let magnitude = f.properties.mag?;
            let timestamp = Utc.timestamp_millis_opt(f.properties.time).single()?;
            Some(SignalObservation::new(
                timestamp,
                magnitude,
                format!("usgs:{}", f.id),
            ))
        })
        .collect())
}

/// Earthquake catalogue provider
pub struct UsgsProvider {
    base_url: String,
    radius_km: Decimal,
    min_magnitude: Decimal,
    client: Client,
}

impl UsgsProvider {
    pub fn new(
        base_url: impl Into<String>,
        radius_km: Decimal,
        min_magnitude: Decimal,
        http: &HttpConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            radius_km,
            min_magnitude,
            client: http.build_client()?,
        })
    }

    /// Catalogue cutoff, lowered when the caller acts on smaller quakes
    fn min_magnitude(&self, query: &SignalQuery) -> Decimal {
        query
            .min_value
            .map_or(self.min_magnitude, |floor| floor.min(self.min_magnitude))
    }

    fn query_params(&self, query: &SignalQuery) -> Vec<(&'static str, String)> {
        vec![
            ("format", "geojson".to_string()),
            ("latitude", query.latitude.to_string()),
            ("longitude", query.longitude.to_string()),
            ("maxradiuskm", self.radius_km.to_string()),
            ("minmagnitude", self.min_magnitude(query).to_string()),
            ("starttime", query.start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("endtime", query.end.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("orderby", "time-asc".to_string()),
        ]
    }
}

#[async_trait]
impl SignalProvider for UsgsProvider {
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
        if query.peril != Peril::Earthquake {
            return Err(FetchError::UnsupportedPeril {
                peril: query.peril,
                reason: "USGS serves earthquake signals only".to_string(),
            });
        }

        let url = format!("{}/query", self.base_url);
        let body = get_text(&self.client, &url, &self.query_params(query), query.peril).await?;
        let observations = parse_feature_collection(&body)?;

        tracing::debug!(
            events = observations.len(),
            radius_km = %self.radius_km,
            "USGS catalogue query complete"
        );

        Ok(observations)
    }

    fn earliest_available(&self, _peril: Peril) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }
}

impl Default for UsgsProvider {
    fn default() -> Self {
        Self {
            base_url: USGS_FDSN_URL.to_string(),
            radius_km: dec!(100),
            min_magnitude: dec!(4.5),
            client: Client::new(),
        }
    }
}
