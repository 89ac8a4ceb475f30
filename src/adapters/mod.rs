//! Source adapter abstractions for the five supported vendors.
//!
//! Defines the `SourceAdapter` trait (one implementation per vendor) and the
//! `SourceRegistry` the fan-out engine queries. Each vendor module owns its
//! raw payload shape and maps it into the canonical types in one place,
//! including a per-vendor `normalize_status`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::SourceError;
use crate::source_config::Source;
use crate::types::{MatchRecord, SearchCandidate};

pub mod api_football;
pub mod football_data;
pub mod footystats;
pub mod sportmonks;
pub mod thesportsdb;

#[cfg(test)]
pub(crate) mod mock;

pub use api_football::ApiFootballClient;
pub use football_data::FootballDataClient;
pub use footystats::FootyStatsClient;
pub use sportmonks::SportmonksClient;
pub use thesportsdb::TheSportsDbClient;

/// Capability set every vendor adapter provides.
///
/// Implementations classify their failures into `SourceError` at this
/// boundary; the fan-out engine records outcomes into the health governor
/// and nothing propagates further.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Free-text team search. `Ok(None)` means the vendor answered but had
    /// no plausible team.
    async fn search_team(&self, name: &str) -> Result<Option<SearchCandidate>, SourceError>;

    /// Most recent matches for a team, newest first.
    async fn recent_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError>;

    /// Upcoming fixtures for a team, soonest first.
    async fn upcoming_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError>;

    /// Historical meetings between two teams (both IDs in this vendor's
    /// namespace).
    async fn head_to_head(
        &self,
        home_external_id: &str,
        away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> bool;
}

/// Registry of adapters, keyed by source.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: HashMap<Source, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from environment configuration. Vendors whose API
    /// key is absent are simply not registered; TheSportsDB falls back to
    /// its shared free key.
    pub fn from_env() -> Self {
        let mut registry = Self::new();

        if let Ok(key) = std::env::var("API_FOOTBALL_KEY") {
            registry.register(Arc::new(ApiFootballClient::new(key)));
        }
        if let Ok(key) = std::env::var("SPORTMONKS_KEY") {
            registry.register(Arc::new(SportmonksClient::new(key)));
        }
        if let Ok(key) = std::env::var("FOOTBALL_DATA_KEY") {
            registry.register(Arc::new(FootballDataClient::new(key)));
        }
        let tsdb_key = std::env::var("THESPORTSDB_KEY").unwrap_or_else(|_| "3".to_string());
        registry.register(Arc::new(TheSportsDbClient::new(tsdb_key)));
        if let Ok(key) = std::env::var("FOOTYSTATS_KEY") {
            registry.register(Arc::new(FootyStatsClient::new(key)));
        }

        info!(
            "source registry initialized with {} adapters",
            registry.len()
        );
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.source(), adapter);
    }

    pub fn get(&self, source: Source) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&source).cloned()
    }

    /// Registered sources, in no particular order.
    pub fn sources(&self) -> Vec<Source> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources())
            .finish()
    }
}

/// Map an HTTP response into JSON, classifying vendor-side failures.
pub(crate) async fn read_json(resp: reqwest::Response) -> Result<Value, SourceError> {
    let status = resp.status();
    if status.as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(SourceError::RateLimited { retry_after });
    }
    if status.is_server_error() {
        return Err(SourceError::Upstream {
            status: status.as_u16(),
        });
    }
    if status.as_u16() == 404 {
        return Err(SourceError::NotFound);
    }
    if !status.is_success() {
        return Err(SourceError::Network(format!(
            "unexpected status {}",
            status.as_u16()
        )));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

/// Default per-request timeout shared by the vendor clients.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockAdapter;

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = SourceRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(MockAdapter::new(Source::TheSportsDb)));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(Source::TheSportsDb).is_some());
        assert!(registry.get(Source::ApiFootball).is_none());
        assert_eq!(registry.sources(), vec![Source::TheSportsDb]);
    }

    #[test]
    fn test_registering_same_source_replaces() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(MockAdapter::new(Source::ApiFootball)));
        registry.register(Arc::new(MockAdapter::new(Source::ApiFootball)));
        assert_eq!(registry.len(), 1);
    }
}
