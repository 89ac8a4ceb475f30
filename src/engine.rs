//! Match intelligence orchestrator.
//!
//! This module provides:
//! - `research_team`, the cache -> resolve -> fan-out -> aggregate pipeline
//!   that always yields a complete `TeamResearch` (synthetic when upstream
//!   data is unreachable)
//! - `analyze_match`, which researches both sides concurrently, merges
//!   head-to-head history, and runs the probability model
//! - operational surface: per-source status, cache stats, health probes
//!
//! Nothing here returns an error to the caller; every failure path degrades
//! into fallback data and is visible only through the `degraded` flag and
//! `real_match_count`.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::SourceRegistry;
use crate::cache::{CacheStats, ResearchCache};
use crate::fallback::{self, RESEARCH_WINDOW};
use crate::fanout::FanOutEngine;
use crate::health::{IntelligentWaiter, SourceHealthGovernor, SourceStatus};
use crate::identity::{
    name_similarity, normalize_team_name, IdentityStore, MemoryIdentityStore, TeamResolver,
};
use crate::probability;
use crate::source_config::Source;
use crate::types::{HeadToHeadData, MatchAnalysis, MatchRecord, TeamIdentity, TeamResearch};

/// Recent matches requested per source; more than the 5-match window so
/// non-settled fixtures can be discarded without starving the aggregate.
const RESEARCH_FETCH: u32 = 15;

/// Snapshot of the engine's operational state.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub sources: Vec<SourceStatus>,
    pub cache: CacheStats,
}

/// Top-level entry point tying resolution, health-gated fan-out, caching,
/// fallback, and the probability model together.
pub struct MatchIntelEngine {
    cache: ResearchCache,
    resolver: TeamResolver,
    fanout: Arc<FanOutEngine>,
}

impl MatchIntelEngine {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self::with_store(registry, Arc::new(MemoryIdentityStore::new()))
    }

    /// Engine backed by a caller-supplied identity store.
    pub fn with_store(registry: Arc<SourceRegistry>, store: Arc<dyn IdentityStore>) -> Self {
        let governor = Arc::new(SourceHealthGovernor::new());
        let fanout = Arc::new(
            FanOutEngine::new(registry, governor).with_waiter(IntelligentWaiter::default()),
        );
        Self {
            cache: ResearchCache::new(),
            resolver: TeamResolver::new(store, fanout.clone()),
            fanout,
        }
    }

    /// Engine wired from `*_KEY` environment variables.
    pub fn from_env() -> Self {
        Self::new(Arc::new(SourceRegistry::from_env()))
    }

    pub fn cache(&self) -> &ResearchCache {
        &self.cache
    }

    pub fn governor(&self) -> &Arc<SourceHealthGovernor> {
        self.fanout.governor()
    }

    /// Research one team. Never fails: a resolution miss or an all-source
    /// outage yields tier-archetype fallback data instead.
    pub async fn research_team(&self, team_name: &str) -> TeamResearch {
        if let Some(hit) = self.cache.get(team_name, None) {
            debug!("research cache hit for '{}'", team_name);
            return hit;
        }

        let identity = self.resolver.resolve(team_name).await;
        let research = match &identity {
            Some(identity) => {
                let matches = self
                    .fanout
                    .recent_matches(&identity.external_ids, RESEARCH_FETCH)
                    .await;
                match matches {
                    Some(matches) if !matches.is_empty() => {
                        build_research(team_name, Some(identity), matches)
                    }
                    _ => {
                        warn!(
                            "no match data for resolved team '{}', using fallback",
                            team_name
                        );
                        let mut research = fallback::research_for(team_name);
                        research.team_id = Some(identity.universal_id.clone());
                        research
                    }
                }
            }
            None => {
                warn!("could not resolve '{}', using fallback", team_name);
                fallback::research_for(team_name)
            }
        };

        // Fallback results are cached like any other; the TTL bounds how
        // long a degraded answer can stick around.
        self.cache.set(team_name, research.clone(), None);
        research
    }

    /// Full match analysis. Never fails; internal errors degrade to
    /// fallback-backed output flagged via `degraded`.
    pub async fn analyze_match(
        &self,
        home_team: &str,
        away_team: &str,
        league: &str,
    ) -> MatchAnalysis {
        info!("analyzing {} vs {} ({})", home_team, away_team, league);
        let (home, away) = tokio::join!(
            self.research_team(home_team),
            self.research_team(away_team)
        );

        // Re-resolution is cheap here: both names were just resolved and
        // persisted (or curated) during research.
        let (home_identity, away_identity) = tokio::join!(
            self.resolver.resolve(home_team),
            self.resolver.resolve(away_team)
        );
        let head_to_head = match (&home_identity, &away_identity) {
            (Some(hi), Some(ai)) => {
                let meetings = self
                    .fanout
                    .head_to_head(&hi.external_ids, &ai.external_ids)
                    .await;
                if meetings.is_empty() {
                    None
                } else {
                    Some(h2h_from(meetings, home_team, hi))
                }
            }
            _ => None,
        };

        let probabilities = probability::calculate(&home, &away, head_to_head.as_ref());
        let degraded = home.is_fallback() || away.is_fallback();
        if degraded {
            debug!("analysis for {} vs {} is degraded", home_team, away_team);
        }

        MatchAnalysis {
            home,
            away,
            league: league.to_string(),
            head_to_head,
            probabilities,
            generated_at: Utc::now(),
            degraded,
        }
    }

    /// Upcoming fixtures for a team; empty on resolution failure.
    pub async fn upcoming_fixtures(&self, team_name: &str, count: u32) -> Vec<MatchRecord> {
        match self.resolver.resolve(team_name).await {
            Some(identity) => self
                .fanout
                .upcoming_matches(&identity.external_ids, count)
                .await
                .unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Probe every registered source.
    pub async fn health_check(&self) -> HashMap<Source, bool> {
        self.fanout.health_check().await
    }

    pub fn status(&self) -> EngineStatus {
        let sources = self
            .fanout
            .registry()
            .sources()
            .into_iter()
            .map(|s| self.fanout.governor().status(s))
            .collect();
        EngineStatus {
            sources,
            cache: self.cache.stats(),
        }
    }
}

impl std::fmt::Debug for MatchIntelEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchIntelEngine")
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}

/// Whether the researched team is the home side of `record`. External IDs
/// win when present; otherwise the closer name match decides.
fn plays_home(record: &MatchRecord, normalized: &str, identity: Option<&TeamIdentity>) -> bool {
    if let Some(identity) = identity {
        if let Some(home_id) = record.home_team_id.as_deref() {
            if identity.external_ids.values().any(|v| v == home_id) {
                return true;
            }
        }
        if let Some(away_id) = record.away_team_id.as_deref() {
            if identity.external_ids.values().any(|v| v == away_id) {
                return false;
            }
        }
    }
    name_similarity(normalized, &normalize_team_name(&record.home_team_name))
        >= name_similarity(normalized, &normalize_team_name(&record.away_team_name))
}

/// Aggregate fetched matches into a `TeamResearch` over a window of exactly
/// five settled matches, padding with synthetic ones when fewer exist.
fn build_research(
    team_name: &str,
    identity: Option<&TeamIdentity>,
    mut matches: Vec<MatchRecord>,
) -> TeamResearch {
    matches.retain(|m| m.status.is_settled());
    matches.sort_by(|a, b| b.date.cmp(&a.date));
    let real_match_count = matches.len().min(u8::MAX as usize) as u8;
    matches.truncate(RESEARCH_WINDOW);

    let real_in_window = matches.len();
    if real_in_window < RESEARCH_WINDOW {
        let external_id = identity.map(|i| i.universal_id.as_str());
        matches.extend(fallback::pad_matches(real_in_window, team_name, external_id));
    }

    let normalized = normalize_team_name(team_name);
    let mut wins: u8 = 0;
    let mut draws: u8 = 0;
    let mut losses: u8 = 0;
    let mut goals_for: u8 = 0;
    let mut goals_against: u8 = 0;
    let mut form = String::with_capacity(RESEARCH_WINDOW);
    let mut record = crate::types::HomeAwayRecord::default();

    for m in &matches {
        let at_home = plays_home(m, &normalized, identity);
        let (scored, conceded) = if at_home {
            (m.home_score, m.away_score)
        } else {
            (m.away_score, m.home_score)
        };
        goals_for = goals_for.saturating_add(scored);
        goals_against = goals_against.saturating_add(conceded);

        let outcome = if scored > conceded {
            wins += 1;
            'W'
        } else if scored == conceded {
            draws += 1;
            'D'
        } else {
            losses += 1;
            'L'
        };
        form.push(outcome);

        if at_home {
            record.home_played += 1;
            match outcome {
                'W' => record.home_wins += 1,
                'D' => record.home_draws += 1,
                _ => record.home_losses += 1,
            }
        } else {
            record.away_played += 1;
            match outcome {
                'W' => record.away_wins += 1,
                'D' => record.away_draws += 1,
                _ => record.away_losses += 1,
            }
        }
    }

    TeamResearch {
        team_name: identity.map(|i| i.name.clone()).unwrap_or_else(|| team_name.to_string()),
        team_id: identity.map(|i| i.universal_id.clone()),
        last_updated: Utc::now(),
        season_stats: crate::types::SeasonStats::from_counts(
            wins,
            draws,
            losses,
            goals_for,
            goals_against,
        ),
        recent_form: crate::types::RecentForm {
            last5_games: form,
            last5_performance: wins * 20 + draws * 10,
            recent_goals_scored: goals_for,
            recent_goals_conceded: goals_against,
        },
        home_away_record: record,
        head_to_head: None,
        player_availability: crate::types::PlayerAvailability::default(),
        real_match_count,
    }
}

/// Summarize merged meetings from the analysis home team's perspective.
fn h2h_from(
    meetings: Vec<MatchRecord>,
    home_team: &str,
    home_identity: &TeamIdentity,
) -> HeadToHeadData {
    let normalized = normalize_team_name(home_team);
    let mut home_wins = 0u32;
    let mut draws = 0u32;
    let mut away_wins = 0u32;

    for m in &meetings {
        let home_side = plays_home(m, &normalized, Some(home_identity));
        let (ours, theirs) = if home_side {
            (m.home_score, m.away_score)
        } else {
            (m.away_score, m.home_score)
        };
        if ours > theirs {
            home_wins += 1;
        } else if ours == theirs {
            draws += 1;
        } else {
            away_wins += 1;
        }
    }

    HeadToHeadData {
        total_meetings: meetings.len() as u32,
        home_wins,
        draws,
        away_wins,
        recent_meetings: meetings.into_iter().take(RESEARCH_WINDOW).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{finished_match, MockAdapter};
    use std::sync::atomic::Ordering;

    fn arsenal_matches() -> Vec<MatchRecord> {
        vec![
            finished_match("1", "Arsenal", "Chelsea", 2, 1, 3),
            finished_match("2", "Liverpool", "Arsenal", 1, 1, 10),
            finished_match("3", "Arsenal", "Everton", 3, 0, 17),
        ]
    }

    #[tokio::test]
    async fn test_second_research_served_from_cache() {
        let mut registry = SourceRegistry::new();
        let adapter = Arc::new(
            MockAdapter::new(Source::ApiFootball).with_matches(arsenal_matches()),
        );
        let counter = adapter.call_counter();
        registry.register(adapter);
        let engine = MatchIntelEngine::new(Arc::new(registry));

        let first = engine.research_team("Arsenal").await;
        assert!(!first.is_fallback());
        assert_eq!(first.real_match_count, 3);
        let calls_after_first = counter.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        let second = engine.research_team("Arsenal").await;
        assert_eq!(counter.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(second.team_id, first.team_id);
        assert!(engine.cache().stats().hits >= 1);
    }

    #[tokio::test]
    async fn test_unresolvable_team_falls_back_and_is_cached() {
        let engine = MatchIntelEngine::new(Arc::new(SourceRegistry::new()));
        let research = engine.research_team("Zzz Wanderers").await;
        assert!(research.is_fallback());
        assert_eq!(research.season_stats.played, 5);

        engine.research_team("Zzz Wanderers").await;
        assert!(engine.cache().stats().hits >= 1);
    }

    #[tokio::test]
    async fn test_analyze_never_fails_without_sources() {
        let engine = MatchIntelEngine::new(Arc::new(SourceRegistry::new()));
        let analysis = engine.analyze_match("Foo Town", "Bar City", "Friendly").await;
        assert!(analysis.degraded);
        assert!(analysis.head_to_head.is_none());
        let p = &analysis.probabilities;
        assert_eq!(p.home_win + p.draw + p.away_win, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_with_single_source() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockAdapter::new(Source::ApiFootball).with_matches(arsenal_matches()),
        ));
        let engine = MatchIntelEngine::new(Arc::new(registry));

        let analysis = engine.analyze_match("Arsenal", "Chelsea", "Premier League").await;
        // The home side is researched first and gets the real data; pacing
        // rules may degrade the rest, but the analysis is always complete.
        assert!(!analysis.home.is_fallback());
        let p = &analysis.probabilities;
        assert_eq!(p.home_win + p.draw + p.away_win, 100);
    }

    #[tokio::test]
    async fn test_status_reports_registered_sources() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(MockAdapter::new(Source::FootyStats)));
        let engine = MatchIntelEngine::new(Arc::new(registry));
        let status = engine.status();
        assert_eq!(status.sources.len(), 1);
        assert!(status.sources[0].available);
    }

    #[test]
    fn test_build_research_pads_to_window() {
        let research = build_research("Arsenal", None, arsenal_matches());
        assert_eq!(research.season_stats.played, 5);
        assert_eq!(research.real_match_count, 3);
        assert_eq!(research.recent_form.last5_games.len(), 5);
        // Real results lead the form string, newest first: W then D then W.
        assert!(research.recent_form.last5_games.starts_with("WDW"));
        let r = &research.home_away_record;
        assert_eq!(r.home_played + r.away_played, 5);
    }

    #[test]
    fn test_build_research_ignores_unsettled_matches() {
        let mut matches = arsenal_matches();
        let mut live = finished_match("4", "Arsenal", "Spurs", 1, 0, 0);
        live.status = crate::types::MatchStatus::Live;
        matches.push(live);
        let research = build_research("Arsenal", None, matches);
        assert_eq!(research.real_match_count, 3);
    }

    #[test]
    fn test_h2h_attribution_by_name() {
        let identity = TeamIdentity {
            universal_id: "curated-arsenal".to_string(),
            name: "Arsenal".to_string(),
            aliases: Default::default(),
            external_ids: Default::default(),
            confidence: 1.0,
            country: None,
            league: None,
            tier: None,
            usage_count: 0,
            last_used_at: Utc::now(),
            verified: true,
            discovered_at: Utc::now(),
        };
        let meetings = vec![
            finished_match("1", "Arsenal", "Chelsea", 2, 0, 30),
            finished_match("2", "Chelsea", "Arsenal", 3, 1, 200),
            finished_match("3", "Arsenal", "Chelsea", 1, 1, 400),
        ];
        let h2h = h2h_from(meetings, "Arsenal", &identity);
        assert_eq!(h2h.total_meetings, 3);
        assert_eq!(h2h.home_wins, 1);
        assert_eq!(h2h.away_wins, 1);
        assert_eq!(h2h.draws, 1);
        assert_eq!(h2h.recent_meetings.len(), 3);
    }
}
