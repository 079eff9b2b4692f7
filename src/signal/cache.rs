//! Caller-owned signal cache
//!
//! The fetcher never caches on its own. Callers that want to reuse a fetched
//! series across repeated quotes (a slider being dragged, say) create one of
//! these and pass it in explicitly. Entries never expire, so `Latest`
//! requests bypass the cache entirely.

use super::{SignalRequest, SignalSeries};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared map from request to the sorted, deduplicated series
#[derive(Debug, Default, Clone)]
pub struct SignalCache {
    entries: Arc<RwLock<HashMap<SignalRequest, SignalSeries>>>,
}

impl SignalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, request: &SignalRequest) -> Option<SignalSeries> {
        self.entries.read().await.get(request).cloned()
    }

    pub async fn insert(&self, request: SignalRequest, series: SignalSeries) {
        self.entries.write().await.insert(request, series);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
