//! Cross-source team identity resolution.
//!
//! This module provides:
//! - Team name normalization (shared with the adapters)
//! - Name-similarity scoring used during discovery
//! - A curated table of major clubs with hand-verified vendor IDs
//! - The `IdentityStore` capability and an in-memory implementation
//! - `TeamResolver`, the two-tier resolve path (curated table first, then
//!   persisted identities, then fan-out discovery)

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use strsim::jaro_winkler;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SourceError;
use crate::fanout::FanOutEngine;
use crate::source_config::{limits_for, Source, TrustTier};
use crate::types::{SearchCandidate, TeamIdentity, TeamTier};

/// Discovery only persists identities above this overall confidence.
const PERSIST_THRESHOLD: f64 = 0.7;

/// A candidate is accepted only above this similarity against the query.
const CANDIDATE_THRESHOLD: f64 = 0.6;

/// Jaro-Winkler floor for treating a name as a curated-table hit.
const CURATED_FUZZY_FLOOR: f64 = 0.93;

/// Legal/organizational suffix tokens stripped during normalization.
const LEGAL_SUFFIXES: &[&str] = &[
    "fc", "cf", "ac", "afc", "cfc", "sfc", "sc", "cd", "ssc", "club",
];

/// Normalize a free-text team name for matching: lowercase, punctuation to
/// spaces, legal suffixes dropped, whitespace collapsed.
pub fn normalize_team_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|token| !LEGAL_SUFFIXES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two normalized names: exact 1.0, substring containment
/// 0.8, otherwise token-overlap ratio.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(b) || b.contains(a) {
        return 0.8;
    }
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    let shared = tokens_a.intersection(&tokens_b).count();
    let max_len = tokens_a.len().max(tokens_b.len());
    if max_len == 0 {
        0.0
    } else {
        shared as f64 / max_len as f64
    }
}

/// Hand-verified entry for a major club.
struct CuratedTeam {
    slug: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
    country: &'static str,
    league: &'static str,
    ids: &'static [(Source, &'static str)],
}

/// Curated table of major clubs. Checked before any store or upstream
/// lookup; external IDs here are hand-verified.
static CURATED_TEAMS: &[CuratedTeam] = &[
    CuratedTeam {
        slug: "real-madrid",
        name: "Real Madrid",
        aliases: &["real madrid", "real"],
        country: "Spain",
        league: "La Liga",
        ids: &[
            (Source::ApiFootball, "541"),
            (Source::FootballData, "86"),
            (Source::TheSportsDb, "133738"),
            (Source::Sportmonks, "3468"),
        ],
    },
    CuratedTeam {
        slug: "barcelona",
        name: "FC Barcelona",
        aliases: &["barcelona", "barca"],
        country: "Spain",
        league: "La Liga",
        ids: &[
            (Source::ApiFootball, "529"),
            (Source::FootballData, "81"),
            (Source::TheSportsDb, "133739"),
            (Source::Sportmonks, "83"),
        ],
    },
    CuratedTeam {
        slug: "manchester-united",
        name: "Manchester United",
        aliases: &["manchester united", "man united", "man utd", "manchester utd"],
        country: "England",
        league: "Premier League",
        ids: &[
            (Source::ApiFootball, "33"),
            (Source::FootballData, "66"),
            (Source::TheSportsDb, "133612"),
            (Source::Sportmonks, "14"),
        ],
    },
    CuratedTeam {
        slug: "manchester-city",
        name: "Manchester City",
        aliases: &["manchester city", "man city"],
        country: "England",
        league: "Premier League",
        ids: &[
            (Source::ApiFootball, "50"),
            (Source::FootballData, "65"),
            (Source::TheSportsDb, "133613"),
            (Source::Sportmonks, "9"),
        ],
    },
    CuratedTeam {
        slug: "liverpool",
        name: "Liverpool",
        aliases: &["liverpool"],
        country: "England",
        league: "Premier League",
        ids: &[
            (Source::ApiFootball, "40"),
            (Source::FootballData, "64"),
            (Source::TheSportsDb, "133602"),
            (Source::Sportmonks, "8"),
        ],
    },
    CuratedTeam {
        slug: "arsenal",
        name: "Arsenal",
        aliases: &["arsenal", "gunners"],
        country: "England",
        league: "Premier League",
        ids: &[
            (Source::ApiFootball, "42"),
            (Source::FootballData, "57"),
            (Source::TheSportsDb, "133604"),
            (Source::Sportmonks, "19"),
        ],
    },
    CuratedTeam {
        slug: "chelsea",
        name: "Chelsea",
        aliases: &["chelsea"],
        country: "England",
        league: "Premier League",
        ids: &[
            (Source::ApiFootball, "49"),
            (Source::FootballData, "61"),
            (Source::TheSportsDb, "133610"),
            (Source::Sportmonks, "18"),
        ],
    },
    CuratedTeam {
        slug: "bayern-munich",
        name: "Bayern Munich",
        aliases: &["bayern munich", "bayern", "bayern munchen"],
        country: "Germany",
        league: "Bundesliga",
        ids: &[
            (Source::ApiFootball, "157"),
            (Source::FootballData, "5"),
            (Source::TheSportsDb, "133664"),
            (Source::Sportmonks, "503"),
        ],
    },
    CuratedTeam {
        slug: "paris-saint-germain",
        name: "Paris Saint-Germain",
        aliases: &["paris saint germain", "psg", "paris sg"],
        country: "France",
        league: "Ligue 1",
        ids: &[
            (Source::ApiFootball, "85"),
            (Source::FootballData, "524"),
            (Source::TheSportsDb, "133714"),
            (Source::Sportmonks, "591"),
        ],
    },
    CuratedTeam {
        slug: "juventus",
        name: "Juventus",
        aliases: &["juventus", "juve"],
        country: "Italy",
        league: "Serie A",
        ids: &[
            (Source::ApiFootball, "496"),
            (Source::FootballData, "109"),
            (Source::TheSportsDb, "133676"),
            (Source::Sportmonks, "625"),
        ],
    },
];

impl CuratedTeam {
    fn matches(&self, normalized: &str) -> bool {
        if self.aliases.contains(&normalized) {
            return true;
        }
        // Minor misspellings of the canonical name still count.
        jaro_winkler(normalized, self.aliases[0]) >= CURATED_FUZZY_FLOOR
    }

    fn to_identity(&self) -> TeamIdentity {
        let now = Utc::now();
        TeamIdentity {
            universal_id: format!("curated-{}", self.slug),
            name: self.name.to_string(),
            aliases: self.aliases.iter().map(|s| s.to_string()).collect(),
            external_ids: self.ids.iter().map(|(s, id)| (*s, id.to_string())).collect(),
            confidence: 1.0,
            country: Some(self.country.to_string()),
            league: Some(self.league.to_string()),
            tier: Some(TeamTier::Top),
            usage_count: 0,
            last_used_at: now,
            verified: true,
            discovered_at: now,
        }
    }
}

/// Read/write capability over the durable identity store. The store owns
/// the records; this crate never deletes them.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exact lookup by normalized name (canonical name or alias).
    async fn get(&self, normalized_name: &str) -> Result<Option<TeamIdentity>, SourceError>;

    /// Substring lookup, used when the exact path misses.
    async fn find_partial(&self, normalized_name: &str)
        -> Result<Option<TeamIdentity>, SourceError>;

    async fn upsert(&self, identity: TeamIdentity) -> Result<TeamIdentity, SourceError>;

    /// Bump usage statistics for a stored identity. Lost increments only
    /// degrade statistics, never correctness.
    async fn increment_usage(&self, universal_id: &str) -> Result<(), SourceError>;
}

/// In-memory `IdentityStore`, keyed by normalized canonical name.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    teams: RwLock<FxHashMap<String, TeamIdentity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.teams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.read().is_empty()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get(&self, normalized_name: &str) -> Result<Option<TeamIdentity>, SourceError> {
        let teams = self.teams.read();
        if let Some(identity) = teams.get(normalized_name) {
            return Ok(Some(identity.clone()));
        }
        Ok(teams
            .values()
            .find(|t| t.aliases.iter().any(|a| normalize_team_name(a) == normalized_name))
            .cloned())
    }

    async fn find_partial(
        &self,
        normalized_name: &str,
    ) -> Result<Option<TeamIdentity>, SourceError> {
        if normalized_name.len() < 4 {
            // Too short to trust a substring match.
            return Ok(None);
        }
        let teams = self.teams.read();
        // Several stored names can substring-match; pick the closest one,
        // with the key ordering as a deterministic tie-break.
        Ok(teams
            .iter()
            .filter(|(key, _)| key.contains(normalized_name) || normalized_name.contains(*key))
            .max_by(|(key_a, _), (key_b, _)| {
                name_similarity(normalized_name, key_a)
                    .total_cmp(&name_similarity(normalized_name, key_b))
                    .then_with(|| key_a.cmp(key_b))
            })
            .map(|(_, identity)| identity.clone()))
    }

    async fn upsert(&self, identity: TeamIdentity) -> Result<TeamIdentity, SourceError> {
        let key = normalize_team_name(&identity.name);
        let mut teams = self.teams.write();
        let merged = match teams.get(&key) {
            Some(existing) => {
                let mut merged = identity;
                merged.universal_id = existing.universal_id.clone();
                merged.usage_count = existing.usage_count.max(merged.usage_count);
                merged
                    .aliases
                    .extend(existing.aliases.iter().cloned());
                for (source, id) in &existing.external_ids {
                    merged.external_ids.entry(*source).or_insert_with(|| id.clone());
                }
                merged
            }
            None => identity,
        };
        teams.insert(key, merged.clone());
        Ok(merged)
    }

    async fn increment_usage(&self, universal_id: &str) -> Result<(), SourceError> {
        let mut teams = self.teams.write();
        if let Some(identity) = teams
            .values_mut()
            .find(|t| t.universal_id == universal_id)
        {
            identity.usage_count += 1;
            identity.last_used_at = Utc::now();
        }
        Ok(())
    }
}

/// Two-tier resolver: curated table, then store, then fan-out discovery.
pub struct TeamResolver {
    store: Arc<dyn IdentityStore>,
    fanout: Arc<FanOutEngine>,
}

impl TeamResolver {
    pub fn new(store: Arc<dyn IdentityStore>, fanout: Arc<FanOutEngine>) -> Self {
        Self { store, fanout }
    }

    /// Resolve a free-text name to an identity. `None` is a resolution miss
    /// (the caller proceeds to the fallback generator); low-confidence
    /// discoveries are never persisted.
    pub async fn resolve(&self, team_name: &str) -> Option<TeamIdentity> {
        let normalized = normalize_team_name(team_name);
        if normalized.is_empty() {
            return None;
        }

        // Tier 1: curated table.
        if let Some(curated) = CURATED_TEAMS.iter().find(|t| t.matches(&normalized)) {
            let identity = curated.to_identity();
            debug!("resolved '{}' via curated table", team_name);
            self.persist_quietly(identity.clone()).await;
            let _ = self.store.increment_usage(&identity.universal_id).await;
            return Some(identity);
        }

        // Previously persisted identities: exact, then partial.
        match self.store.get(&normalized).await {
            Ok(Some(identity)) => {
                let _ = self.store.increment_usage(&identity.universal_id).await;
                return Some(identity);
            }
            Ok(None) => {}
            Err(e) => warn!("identity store read failed for '{}': {}", team_name, e),
        }
        match self.store.find_partial(&normalized).await {
            Ok(Some(identity)) => {
                let _ = self.store.increment_usage(&identity.universal_id).await;
                return Some(identity);
            }
            Ok(None) => {}
            Err(e) => warn!("identity store partial read failed for '{}': {}", team_name, e),
        }

        // Tier 2: dynamic discovery across all sources.
        self.discover(team_name, &normalized).await
    }

    async fn discover(&self, team_name: &str, normalized: &str) -> Option<TeamIdentity> {
        let candidates = self.fanout.search_team_all(team_name).await;
        if candidates.is_empty() {
            return None;
        }

        let mut accepted: Vec<SearchCandidate> = Vec::new();
        for mut candidate in candidates {
            let similarity = name_similarity(normalized, &normalize_team_name(&candidate.name));
            candidate.confidence = similarity;
            if similarity > CANDIDATE_THRESHOLD {
                accepted.push(candidate);
            }
        }
        if accepted.is_empty() {
            return None;
        }

        let high_trust = accepted
            .iter()
            .filter(|c| limits_for(c.source).trust == TrustTier::High)
            .count();
        let confidence = ((accepted.len() as f64 / 4.0).min(1.0) + 0.1 * high_trust as f64)
            .min(1.0);
        if confidence <= PERSIST_THRESHOLD {
            debug!(
                "discovery for '{}' below threshold (confidence {:.2})",
                team_name, confidence
            );
            return None;
        }

        // Best candidate names the identity; every accepted source
        // contributes its external ID.
        let best = accepted
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))?
            .clone();

        let mut aliases: BTreeSet<String> = BTreeSet::new();
        aliases.insert(team_name.to_lowercase());
        let mut external_ids: HashMap<Source, String> = HashMap::new();
        for candidate in &accepted {
            aliases.insert(candidate.name.to_lowercase());
            external_ids.insert(candidate.source, candidate.external_id.clone());
        }

        let now = Utc::now();
        let identity = TeamIdentity {
            universal_id: Uuid::new_v4().to_string(),
            name: best.name.clone(),
            aliases,
            external_ids,
            confidence,
            country: best.country.clone(),
            league: best.league.clone(),
            tier: None,
            usage_count: 1,
            last_used_at: now,
            verified: false,
            discovered_at: now,
        };

        let identity = match self.store.upsert(identity.clone()).await {
            Ok(persisted) => persisted,
            Err(e) => {
                // Pure performance degradation: the discovery is still
                // usable for this call, just not cached for next time.
                warn!("failed to persist identity for '{}': {}", team_name, e);
                identity
            }
        };
        Some(identity)
    }

    async fn persist_quietly(&self, identity: TeamIdentity) {
        if let Err(e) = self.store.upsert(identity).await {
            warn!("failed to persist curated identity: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockAdapter;
    use crate::adapters::SourceRegistry;
    use crate::health::SourceHealthGovernor;

    fn resolver_with(registry: SourceRegistry) -> TeamResolver {
        let governor = Arc::new(SourceHealthGovernor::new());
        let fanout = Arc::new(FanOutEngine::new(Arc::new(registry), governor));
        TeamResolver::new(Arc::new(MemoryIdentityStore::new()), fanout)
    }

    #[test]
    fn test_normalize_strips_suffixes_and_punctuation() {
        assert_eq!(normalize_team_name("Real Madrid CF"), "real madrid");
        assert_eq!(normalize_team_name("FC Barcelona"), "barcelona");
        assert_eq!(normalize_team_name("A.C. Milan"), "a c milan");
        assert_eq!(normalize_team_name("Paris Saint-Germain"), "paris saint germain");
        assert_eq!(normalize_team_name("  Arsenal   FC "), "arsenal");
    }

    #[test]
    fn test_similarity_tiers() {
        assert_eq!(name_similarity("arsenal", "arsenal"), 1.0);
        assert_eq!(name_similarity("arsenal", "arsenal london"), 0.8);
        // Token overlap: 1 shared of max 2 tokens.
        assert_eq!(name_similarity("leeds united", "newcastle united"), 0.5);
        assert_eq!(name_similarity("arsenal", ""), 0.0);
    }

    #[tokio::test]
    async fn test_curated_resolution_ignores_legal_suffix() {
        let resolver = resolver_with(SourceRegistry::new());
        let a = resolver.resolve("Real Madrid CF").await.expect("resolved");
        let b = resolver.resolve("Real Madrid").await.expect("resolved");
        assert_eq!(a.universal_id, b.universal_id);
        assert!(a.verified);
        assert_eq!(a.external_ids.get(&Source::ApiFootball).unwrap(), "541");
    }

    #[tokio::test]
    async fn test_curated_alias_resolution() {
        let resolver = resolver_with(SourceRegistry::new());
        let psg = resolver.resolve("PSG").await.expect("resolved");
        assert_eq!(psg.name, "Paris Saint-Germain");
    }

    #[tokio::test]
    async fn test_store_roundtrip_bumps_usage() {
        let store = MemoryIdentityStore::new();
        let mut identity = CURATED_TEAMS[0].to_identity();
        identity.verified = false;
        let stored = store.upsert(identity).await.unwrap();
        store.increment_usage(&stored.universal_id).await.unwrap();
        store.increment_usage(&stored.universal_id).await.unwrap();
        let read = store.get("real madrid").await.unwrap().unwrap();
        assert_eq!(read.usage_count, 2);
    }

    #[tokio::test]
    async fn test_store_partial_match() {
        let store = MemoryIdentityStore::new();
        store.upsert(CURATED_TEAMS[2].to_identity()).await.unwrap();
        let found = store.find_partial("manchester").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_partial("utd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_match_prefers_closest_name() {
        let store = MemoryIdentityStore::new();
        for name in ["Red Star", "Red Star Belgrade", "Red Star Paris"] {
            let mut identity = CURATED_TEAMS[0].to_identity();
            identity.universal_id = format!("test-{}", normalize_team_name(name));
            identity.name = name.to_string();
            identity.aliases = BTreeSet::new();
            store.upsert(identity).await.unwrap();
        }
        // All three keys substring-match; the exact one must win, not
        // whichever the map yields first.
        let found = store.find_partial("red star belgrade").await.unwrap().unwrap();
        assert_eq!(found.name, "Red Star Belgrade");
        let found = store.find_partial("red star").await.unwrap().unwrap();
        assert_eq!(found.name, "Red Star");
    }

    #[tokio::test]
    async fn test_discovery_persists_multi_source_hit() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(
            MockAdapter::new(Source::ApiFootball).with_search("Borussia Dortmund", "165"),
        ));
        registry.register(Arc::new(
            MockAdapter::new(Source::Sportmonks).with_search("Borussia Dortmund", "68"),
        ));
        registry.register(Arc::new(
            MockAdapter::new(Source::TheSportsDb).with_search("Borussia Dortmund", "133699"),
        ));
        let resolver = resolver_with(registry);

        // 3 accepted sources of which 2 high trust:
        // min(3/4, 1) + 0.2 = 0.95 > 0.7
        let identity = resolver.resolve("Borussia Dortmund").await.expect("resolved");
        assert!(identity.confidence > 0.9);
        assert_eq!(identity.external_ids.len(), 3);
        assert!(!identity.verified);

        // Second resolve hits the store, not discovery.
        let again = resolver.resolve("Borussia Dortmund").await.expect("resolved");
        assert_eq!(again.universal_id, identity.universal_id);
    }

    #[tokio::test]
    async fn test_low_confidence_discovery_is_a_miss_and_not_persisted() {
        let mut registry = SourceRegistry::new();
        // Single standard-trust source: min(1/4, 1) + 0 = 0.25 <= 0.7
        registry.register(Arc::new(
            MockAdapter::new(Source::TheSportsDb).with_search("Wrexham", "134276"),
        ));
        let governor = Arc::new(SourceHealthGovernor::new());
        let fanout = Arc::new(FanOutEngine::new(Arc::new(registry), governor));
        let store = Arc::new(MemoryIdentityStore::new());
        let resolver = TeamResolver::new(store.clone(), fanout);

        assert!(resolver.resolve("Wrexham").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_dissimilar_candidates_rejected() {
        let mut registry = SourceRegistry::new();
        for source in [Source::ApiFootball, Source::Sportmonks, Source::FootballData] {
            registry.register(Arc::new(
                MockAdapter::new(source).with_search("Completely Different Club", "9"),
            ));
        }
        let resolver = resolver_with(registry);
        assert!(resolver.resolve("Grimsby Town").await.is_none());
    }
}
