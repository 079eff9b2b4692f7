//! Signal types

use crate::policy::Peril;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

/// Length of a 365.25-day year
pub const SECONDS_PER_YEAR: i64 = 31_557_600;

/// A single historical or live peril reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalObservation {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Peril-specific value (magnitude, rainfall mm, temperature, ...)
    pub value: Decimal,
    /// Provider and record identifier
    pub source: String,
    /// Provider confidence in [0, 1], when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Decimal>,
}

impl SignalObservation {
    pub fn new(timestamp: DateTime<Utc>, value: Decimal, source: impl Into<String>) -> Self {
        Self {
            timestamp,
            value,
            source: source.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Time span requested from the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchWindow {
    /// Most recent reading only
    Latest,
    /// The last `years` years up to now
    Trailing { years: u32 },
    /// Explicit bounds, inclusive
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Everything the provider has
    FullHistory,
}

impl FetchWindow {
    /// Whether the window has caller-defined bounds
    pub fn is_bounded(&self) -> bool {
        matches!(self, FetchWindow::Range { .. } | FetchWindow::Trailing { .. })
    }
}

/// What a caller asks the fetcher for; also the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalRequest {
    pub peril: Peril,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub window: FetchWindow,
    /// Smallest reading the caller can act on; providers that filter
    /// server-side must keep everything at or above it
    pub min_value: Option<Decimal>,
}

impl SignalRequest {
    pub fn new(peril: Peril, latitude: Decimal, longitude: Decimal, window: FetchWindow) -> Self {
        Self {
            peril,
            latitude,
            longitude,
            window,
            min_value: None,
        }
    }

    pub fn with_min_value(mut self, value: Decimal) -> Self {
        self.min_value = Some(value);
        self
    }
}

/// Concrete query handed to a provider after window resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalQuery {
    pub peril: Peril,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_value: Option<Decimal>,
}

/// Normalized series plus the bounds it was fetched over
///
/// Derefs to the observations so callers can treat it as a slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSeries {
    pub query: SignalQuery,
    pub observations: Arc<Vec<SignalObservation>>,
}

impl SignalSeries {
    pub fn new(query: SignalQuery, observations: Vec<SignalObservation>) -> Self {
        Self {
            query,
            observations: Arc::new(observations),
        }
    }
}

impl Deref for SignalSeries {
    type Target = [SignalObservation];

    fn deref(&self) -> &[SignalObservation] {
        &self.observations
    }
}

/// Machine-checkable error category for callers to branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidLocation,
    InvalidPolicy,
    UnsupportedPeril,
    TransientFetch,
    InvalidResponse,
    Cancelled,
}

impl ErrorKind {
    /// Stable snake_case tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidLocation => "invalid_location",
            ErrorKind::InvalidPolicy => "invalid_policy",
            ErrorKind::UnsupportedPeril => "unsupported_peril",
            ErrorKind::TransientFetch => "transient_fetch",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal fetch errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Latitude or longitude outside WGS84 bounds
    #[error("Invalid location: lat={lat}, lng={lng}")]
    InvalidLocation { lat: Decimal, lng: Decimal },
    /// Provider cannot serve this peril/location
    #[error("Unsupported peril {peril}: {reason}")]
    UnsupportedPeril { peril: Peril, reason: String },
    /// Network failure, timeout, 5xx or rate limit
    #[error("Transient fetch error: {0}")]
    Transient(String),
    /// Transient errors persisted through every attempt
    #[error("Signal fetch failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
    /// Provider answered with a body we could not decode
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
    /// Caller cancelled the request
    #[error("Signal fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidLocation { .. } => ErrorKind::InvalidLocation,
            FetchError::UnsupportedPeril { .. } => ErrorKind::UnsupportedPeril,
            FetchError::Transient(_) | FetchError::RetriesExhausted { .. } => {
                ErrorKind::TransientFetch
            }
            FetchError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            FetchError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}
