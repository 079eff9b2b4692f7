//! Shared HTTP plumbing and the generic oracle provider
//!
//! Every HTTP-backed provider funnels its requests through `get_text` so that
//! transient and permanent failures are classified the same way.

use super::{FetchError, SignalObservation, SignalProvider, SignalQuery};
use crate::policy::Peril;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// HTTP client configuration shared by providers
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: concat!("parametric-pricing/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub(crate) fn build_client(&self) -> anyhow::Result<Client> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;
        Ok(client)
    }
}

/// Map a non-success HTTP status to a fetch error
pub(crate) fn classify_status(status: StatusCode, body: &str, peril: Peril) -> FetchError {
    let snippet: String = body.chars().take(200).collect();
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        FetchError::Transient(format!("HTTP {}: {}", status, snippet))
    } else {
        FetchError::UnsupportedPeril {
            peril,
            reason: format!("HTTP {}: {}", status, snippet),
        }
    }
}

/// Map a transport-level reqwest error to a fetch error
pub(crate) fn classify_request_error(err: reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::InvalidResponse(err.to_string())
    } else {
        FetchError::Transient(err.to_string())
    }
}

/// GET a URL and return the body of a successful response
pub(crate) async fn get_text(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    peril: Peril,
) -> Result<String, FetchError> {
    tracing::debug!(url = %url, %peril, "Requesting signal data");

    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(classify_request_error)?;

    let status = response.status();
    let body = response.text().await.map_err(classify_request_error)?;

    if !status.is_success() {
        return Err(classify_status(status, &body, peril));
    }

    Ok(body)
}

/// Record shape served by the oracle endpoint
#[derive(Debug, Deserialize)]
struct OracleRecord {
    timestamp: DateTime<Utc>,
    value: Decimal,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    confidence: Option<Decimal>,
}

/// Parse an oracle response body
fn parse_oracle_response(body: &str) -> Result<Vec<SignalObservation>, FetchError> {
    let records: Vec<OracleRecord> =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

    Ok(records
        .into_iter()
        .map(|r| SignalObservation {
            timestamp: r.timestamp,
            value: r.value,
            source: r.source.unwrap_or_else(|| "oracle".to_string()),
            confidence: r.confidence,
        })
        .collect())
}

/// Generic oracle serving any peril as a JSON list of observations
///
/// `GET {base}/signals/{peril}?lat=..&lng=..&start=..&end=..`
pub struct OracleProvider {
    base_url: String,
    client: Client,
}

impl OracleProvider {
    pub fn new(base_url: impl Into<String>, http: &HttpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http.build_client()?,
        })
    }

    fn signals_url(&self, peril: Peril) -> String {
        format!("{}/signals/{}", self.base_url, peril)
    }
}

#[async_trait]
impl SignalProvider for OracleProvider {
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
        let params = [
            ("lat", query.latitude.to_string()),
            ("lng", query.longitude.to_string()),
            ("start", query.start.to_rfc3339()),
            ("end", query.end.to_rfc3339()),
        ];
        let body = get_text(&self.client, &self.signals_url(query.peril), &params, query.peril).await?;
        parse_oracle_response(&body)
    }
}
