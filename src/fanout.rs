//! Concurrent multi-source query engine.
//!
//! For each capability the engine fans out to every source the health
//! governor permits, collects every outcome without letting one slow or
//! failed source block the others, reports each attempt back to the
//! governor, and then selects the result of the highest-priority source
//! that succeeded (never merely the first to complete). Head-to-head is the
//! exception: all successful sources are merged and de-duplicated.

use futures_util::future::{join_all, BoxFuture};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::{SourceAdapter, SourceRegistry};
use crate::error::SourceError;
use crate::health::{IntelligentWaiter, SourceHealthGovernor};
use crate::source_config::{priority_order, Capability, Source};
use crate::types::{MatchRecord, SearchCandidate};

pub struct FanOutEngine {
    registry: Arc<SourceRegistry>,
    governor: Arc<SourceHealthGovernor>,
    waiter: Option<IntelligentWaiter>,
}

impl FanOutEngine {
    pub fn new(registry: Arc<SourceRegistry>, governor: Arc<SourceHealthGovernor>) -> Self {
        Self {
            registry,
            governor,
            waiter: None,
        }
    }

    /// Enable bounded waiting on the top-priority source when every source
    /// is currently gated.
    pub fn with_waiter(mut self, waiter: IntelligentWaiter) -> Self {
        self.waiter = Some(waiter);
        self
    }

    pub fn governor(&self) -> &Arc<SourceHealthGovernor> {
        &self.governor
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Sources eligible for a capability right now, in priority order.
    /// `restrict` limits to sources we hold the needed external IDs for.
    async fn permitted_sources(
        &self,
        capability: Capability,
        restrict: Option<&[Source]>,
    ) -> Vec<(Source, Arc<dyn SourceAdapter>)> {
        let order = priority_order(capability);
        let eligible: Vec<Source> = order
            .iter()
            .copied()
            .filter(|s| restrict.map(|r| r.contains(s)).unwrap_or(true))
            .filter(|s| self.registry.get(*s).is_some())
            .collect();

        let mut permitted: Vec<(Source, Arc<dyn SourceAdapter>)> = eligible
            .iter()
            .copied()
            .filter(|s| self.governor.can_request(*s))
            .filter_map(|s| self.registry.get(s).map(|a| (s, a)))
            .collect();

        // Everything gated: optionally wait a bounded time on the
        // highest-priority source rather than giving up outright.
        if permitted.is_empty() {
            if let (Some(waiter), Some(top)) = (&self.waiter, eligible.first().copied()) {
                if waiter.wait_for(&self.governor, top).await {
                    if let Some(adapter) = self.registry.get(top) {
                        permitted.push((top, adapter));
                    }
                }
            }
        }
        permitted
    }

    /// Fan a call out to every permitted source, recording every outcome.
    async fn run<T, F>(
        &self,
        capability: Capability,
        restrict: Option<&[Source]>,
        make_call: F,
    ) -> HashMap<Source, Result<T, SourceError>>
    where
        F: Fn(Source, Arc<dyn SourceAdapter>) -> BoxFuture<'static, Result<T, SourceError>>,
    {
        let targets = self.permitted_sources(capability, restrict).await;
        if targets.is_empty() {
            debug!("no sources available for {:?}", capability);
            return HashMap::new();
        }

        let calls = targets.into_iter().map(|(source, adapter)| {
            self.governor.mark_request(source);
            let fut = make_call(source, adapter);
            async move { (source, fut.await) }
        });

        let outcomes: Vec<(Source, Result<T, SourceError>)> = join_all(calls).await;
        for (source, result) in &outcomes {
            match result {
                Ok(_) => self.governor.record_success(*source),
                Err(e) => {
                    warn!("source {} failed {:?}: {}", source, capability, e);
                    self.governor.record_error(*source, e.status_code());
                }
            }
        }
        outcomes.into_iter().collect()
    }

    /// All candidates from sources that answered the search, used by
    /// identity discovery.
    pub async fn search_team_all(&self, name: &str) -> Vec<SearchCandidate> {
        let query = name.to_string();
        let outcomes = self
            .run(Capability::SearchTeam, None, move |_, adapter| {
                let query = query.clone();
                Box::pin(async move { adapter.search_team(&query).await })
            })
            .await;

        priority_order(Capability::SearchTeam)
            .iter()
            .filter_map(|s| match outcomes.get(s) {
                Some(Ok(Some(candidate))) => Some(candidate.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest-priority successful candidate.
    pub async fn search_team(&self, name: &str) -> Option<SearchCandidate> {
        self.search_team_all(name).await.into_iter().next()
    }

    /// Recent settled matches from the best source we hold an ID for.
    pub async fn recent_matches(
        &self,
        external_ids: &HashMap<Source, String>,
        count: u32,
    ) -> Option<Vec<MatchRecord>> {
        self.match_query(Capability::RecentMatches, external_ids, count, false)
            .await
    }

    /// Upcoming fixtures from the best source we hold an ID for.
    pub async fn upcoming_matches(
        &self,
        external_ids: &HashMap<Source, String>,
        count: u32,
    ) -> Option<Vec<MatchRecord>> {
        self.match_query(Capability::UpcomingMatches, external_ids, count, true)
            .await
    }

    async fn match_query(
        &self,
        capability: Capability,
        external_ids: &HashMap<Source, String>,
        count: u32,
        upcoming: bool,
    ) -> Option<Vec<MatchRecord>> {
        let restrict: Vec<Source> = external_ids.keys().copied().collect();
        let ids = external_ids.clone();
        let outcomes = self
            .run(capability, Some(&restrict), move |source, adapter| {
                let id = ids.get(&source).cloned().unwrap_or_default();
                Box::pin(async move {
                    if upcoming {
                        adapter.upcoming_matches(&id, count).await
                    } else {
                        adapter.recent_matches(&id, count).await
                    }
                })
            })
            .await;

        for source in priority_order(capability) {
            if let Some(Ok(matches)) = outcomes.get(source) {
                if !matches.is_empty() {
                    debug!("{:?} served by {}", capability, source);
                    return Some(matches.clone());
                }
            }
        }
        None
    }

    /// Merged head-to-head across every source holding both IDs,
    /// de-duplicated on (day, home name, away name), newest first.
    pub async fn head_to_head(
        &self,
        home_ids: &HashMap<Source, String>,
        away_ids: &HashMap<Source, String>,
    ) -> Vec<MatchRecord> {
        let restrict: Vec<Source> = home_ids
            .keys()
            .filter(|s| away_ids.contains_key(s))
            .copied()
            .collect();
        if restrict.is_empty() {
            return Vec::new();
        }

        let home_ids = home_ids.clone();
        let away_ids = away_ids.clone();
        let outcomes = self
            .run(Capability::HeadToHead, Some(&restrict), move |source, adapter| {
                let home = home_ids.get(&source).cloned().unwrap_or_default();
                let away = away_ids.get(&source).cloned().unwrap_or_default();
                Box::pin(async move { adapter.head_to_head(&home, &away).await })
            })
            .await;

        let mut merged: Vec<MatchRecord> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        // Merge in priority order so the better source wins dedup ties.
        for source in priority_order(Capability::HeadToHead) {
            if let Some(Ok(matches)) = outcomes.get(source) {
                for m in matches {
                    if seen.insert(m.dedup_key()) {
                        merged.push(m.clone());
                    }
                }
            }
        }
        merged.sort_by(|a, b| b.date.cmp(&a.date));
        merged
    }

    /// Probe every registered adapter.
    pub async fn health_check(&self) -> HashMap<Source, bool> {
        let checks = self.registry.sources().into_iter().filter_map(|source| {
            self.registry.get(source).map(|adapter| async move {
                (source, adapter.health_check().await)
            })
        });
        join_all(checks).await.into_iter().collect()
    }
}

impl std::fmt::Debug for FanOutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutEngine")
            .field("registry", &self.registry)
            .field("waiter", &self.waiter)
            .finish()
    }
}
