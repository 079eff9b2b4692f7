//! Signal module
//!
//! Fetches peril observations for a location from external providers

mod cache;
mod fetcher;
mod http;
mod open_meteo;
mod router;
mod types;
mod usgs;

pub use cache::SignalCache;
pub use fetcher::{FetchOptions, RetryConfig, SignalFetcher};
pub use http::{HttpConfig, OracleProvider};
pub use open_meteo::{OpenMeteoProvider, OPEN_METEO_ARCHIVE_URL};
pub use router::PerilRouter;
pub use types::{
    ErrorKind, FetchError, FetchWindow, SignalObservation, SignalQuery, SignalRequest, SignalSeries,
    SECONDS_PER_YEAR,
};
pub use usgs::{UsgsProvider, USGS_FDSN_URL};

use crate::policy::Peril;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// Trait for external peril-data services
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Fetch observations for a resolved query
    ///
    /// Transient failures must be reported as `FetchError::Transient` so the
    /// fetcher can retry them; everything else is surfaced as-is.
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError>;

    /// Earliest instant this provider has data for
    fn earliest_available(&self, _peril: Peril) -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).single().unwrap_or_default()
    }
}

#[async_trait]
impl<P: SignalProvider + ?Sized> SignalProvider for std::sync::Arc<P> {
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
        (**self).fetch(query).await
    }

    fn earliest_available(&self, peril: Peril) -> DateTime<Utc> {
        (**self).earliest_available(peril)
    }
}

#[async_trait]
impl<P: SignalProvider + ?Sized> SignalProvider for Box<P> {
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
        (**self).fetch(query).await
    }

    fn earliest_available(&self, peril: Peril) -> DateTime<Utc> {
        (**self).earliest_available(peril)
    }
}
