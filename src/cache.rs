//! TTL cache for computed team research.
//!
//! Keyed by (team name, optional team id). Entries live for one hour from
//! `last_updated`; expired entries read as misses but are only removed by an
//! explicit sweep. Fallback results are cached like any other.

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::TeamResearch;

/// Research time-to-live: one hour from `last_updated`.
const TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    team_id: Option<String>,
}

impl CacheKey {
    fn new(name: &str, team_id: Option<&str>) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            team_id: team_id.map(|s| s.to_string()),
        }
    }
}

/// Cache counters, for observability.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// In-process TTL store of `TeamResearch` aggregates.
#[derive(Debug, Default)]
pub struct ResearchCache {
    entries: RwLock<FxHashMap<CacheKey, TeamResearch>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_fresh(research: &TeamResearch) -> bool {
        Utc::now() - research.last_updated < ChronoDuration::seconds(TTL_SECS)
    }

    /// Returns a fresh entry, or None on miss or expiry. Expired entries
    /// are left in place; `sweep_expired` removes them.
    pub fn get(&self, team_name: &str, team_id: Option<&str>) -> Option<TeamResearch> {
        let key = CacheKey::new(team_name, team_id);
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(research) if Self::is_fresh(research) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(research.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, team_name: &str, research: TeamResearch, team_id: Option<&str>) {
        let key = CacheKey::new(team_name, team_id);
        self.entries.write().insert(key, research);
    }

    pub fn delete(&self, team_name: &str, team_id: Option<&str>) -> bool {
        let key = CacheKey::new(team_name, team_id);
        self.entries.write().remove(&key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop all expired entries, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, research| Self::is_fresh(research));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        HomeAwayRecord, PlayerAvailability, RecentForm, SeasonStats,
    };
    use chrono::Duration as ChronoDuration;

    fn research(name: &str) -> TeamResearch {
        TeamResearch {
            team_name: name.to_string(),
            team_id: None,
            last_updated: Utc::now(),
            season_stats: SeasonStats::from_counts(2, 2, 1, 8, 7),
            recent_form: RecentForm {
                last5_games: "WDWDL".to_string(),
                last5_performance: 60,
                recent_goals_scored: 8,
                recent_goals_conceded: 7,
            },
            home_away_record: HomeAwayRecord::default(),
            head_to_head: None,
            player_availability: PlayerAvailability::default(),
            real_match_count: 5,
        }
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = ResearchCache::new();
        cache.set("Arsenal", research("Arsenal"), None);
        let hit = cache.get("Arsenal", None).expect("cached");
        assert_eq!(hit.team_name, "Arsenal");
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let cache = ResearchCache::new();
        cache.set("Arsenal", research("Arsenal"), None);
        assert!(cache.get("  ARSENAL ", None).is_some());
    }

    #[test]
    fn test_team_id_distinguishes_entries() {
        let cache = ResearchCache::new();
        cache.set("Arsenal", research("Arsenal"), Some("id-1"));
        assert!(cache.get("Arsenal", None).is_none());
        assert!(cache.get("Arsenal", Some("id-1")).is_some());
    }

    #[test]
    fn test_expired_entry_is_a_miss_but_not_deleted() {
        let cache = ResearchCache::new();
        let mut stale = research("Arsenal");
        stale.last_updated = Utc::now() - ChronoDuration::seconds(TTL_SECS + 1);
        cache.set("Arsenal", stale, None);

        assert!(cache.get("Arsenal", None).is_none());
        // Entry still present until swept.
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let cache = ResearchCache::new();
        cache.set("Arsenal", research("Arsenal"), None);
        cache.get("Arsenal", None);
        cache.get("Chelsea", None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = ResearchCache::new();
        cache.set("Arsenal", research("Arsenal"), None);
        cache.set("Chelsea", research("Chelsea"), None);
        assert!(cache.delete("Arsenal", None));
        assert!(!cache.delete("Arsenal", None));
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
