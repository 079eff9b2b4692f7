//! Routes each peril to the provider that serves it

use super::{FetchError, SignalObservation, SignalProvider, SignalQuery};
use crate::policy::Peril;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Dispatches queries by peril; unrouted perils are unsupported
#[derive(Default, Clone)]
pub struct PerilRouter {
    routes: HashMap<Peril, Arc<dyn SignalProvider>>,
}

impl PerilRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one peril to a provider, replacing any previous route
    pub fn route(mut self, peril: Peril, provider: Arc<dyn SignalProvider>) -> Self {
        self.routes.insert(peril, provider);
        self
    }

    /// Route several perils to the same provider
    pub fn route_all(
        mut self,
        perils: impl IntoIterator<Item = Peril>,
        provider: Arc<dyn SignalProvider>,
    ) -> Self {
        for peril in perils {
            self.routes.insert(peril, Arc::clone(&provider));
        }
        self
    }

    /// Route only the perils that do not have a provider yet
    pub fn fallback(
        mut self,
        perils: impl IntoIterator<Item = Peril>,
        provider: Arc<dyn SignalProvider>,
    ) -> Self {
        for peril in perils {
            self.routes
                .entry(peril)
                .or_insert_with(|| Arc::clone(&provider));
        }
        self
    }

    pub fn supports(&self, peril: Peril) -> bool {
        self.routes.contains_key(&peril)
    }

    /// Perils with a configured provider, in catalogue order
    pub fn supported_perils(&self) -> Vec<Peril> {
        Peril::ALL
            .into_iter()
            .filter(|p| self.supports(*p))
            .collect()
    }
}

#[async_trait]
impl SignalProvider for PerilRouter {
    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalObservation>, FetchError> {
        match self.routes.get(&query.peril) {
            Some(provider) => provider.fetch(query).await,
            None => Err(FetchError::UnsupportedPeril {
                peril: query.peril,
                reason: "no signal provider configured".to_string(),
            }),
        }
    }

    fn earliest_available(&self, peril: Peril) -> DateTime<Utc> {
        self.routes
            .get(&peril)
            .map(|p| p.earliest_available(peril))
            .unwrap_or_default()
    }
}
