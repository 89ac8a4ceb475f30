//! Canonical data model shared across the crate.
//!
//! Every vendor payload is normalized into these types at the adapter
//! boundary; everything downstream (fan-out, stats, probabilities) only ever
//! sees this model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::source_config::Source;

/// Canonical match status.
///
/// Each vendor speaks its own status vocabulary ("FT", "NS", "1H",
/// "Match Finished", ...); every adapter maps into this enum via its own
/// `normalize_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
    Awarded,
    Walkover,
}

impl MatchStatus {
    /// Whether the match produced a final score usable for statistics.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            MatchStatus::Finished | MatchStatus::Awarded | MatchStatus::Walkover
        )
    }
}

/// A single match, source-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Identifier in the producing source's namespace (or synthetic).
    pub id: String,
    pub date: DateTime<Utc>,
    pub home_team_name: String,
    pub home_team_id: Option<String>,
    pub away_team_name: String,
    pub away_team_id: Option<String>,
    pub home_score: u8,
    pub away_score: u8,
    pub status: MatchStatus,
    pub league_name: String,
    pub kickoff_time: Option<DateTime<Utc>>,
}

impl MatchRecord {
    /// Dedup key used when merging head-to-head results from several
    /// sources: same day, same (lowercased) pairing.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.date.format("%Y-%m-%d").to_string(),
            self.home_team_name.to_lowercase(),
            self.away_team_name.to_lowercase(),
        )
    }
}

/// Coarse team-strength bucket used to select a fallback archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamTier {
    Top,
    Mid,
    Lower,
}

/// A resolved cross-source team record.
///
/// Owned by the identity store; the resolver holds a read/write capability
/// only. Never deleted here (retention is an external concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamIdentity {
    /// Our own stable identifier, independent of any vendor's ID.
    pub universal_id: String,
    /// Canonical display name.
    pub name: String,
    /// Alternate spellings seen for this team (includes the raw inputs
    /// that resolved to it).
    pub aliases: BTreeSet<String>,
    /// Vendor-specific team IDs, one per source that knows the team.
    pub external_ids: HashMap<Source, String>,
    /// Resolution confidence in [0, 1].
    pub confidence: f64,
    pub country: Option<String>,
    pub league: Option<String>,
    pub tier: Option<TeamTier>,
    /// Bumped on every successful lookup.
    pub usage_count: u64,
    pub last_used_at: DateTime<Utc>,
    /// True for hand-verified (curated) entries.
    pub verified: bool,
    pub discovered_at: DateTime<Utc>,
}

/// Normalized output of a vendor `search_team` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub source: Source,
    pub external_id: String,
    pub name: String,
    pub country: Option<String>,
    pub league: Option<String>,
    /// Name-similarity score against the query, in [0, 1].
    pub confidence: f64,
}

/// Aggregate season statistics over the research window.
///
/// `played` is always exactly 5: scarce real data is padded with synthetic
/// matches so cross-team statistics stay comparable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub played: u8,
    pub wins: u8,
    pub draws: u8,
    pub losses: u8,
    pub goals_for: u8,
    pub goals_against: u8,
    pub goal_difference: i16,
    pub points: u8,
}

impl SeasonStats {
    pub fn from_counts(wins: u8, draws: u8, losses: u8, goals_for: u8, goals_against: u8) -> Self {
        Self {
            played: wins + draws + losses,
            wins,
            draws,
            losses,
            goals_for,
            goals_against,
            goal_difference: goals_for as i16 - goals_against as i16,
            points: wins * 3 + draws,
        }
    }
}

/// Compact recent-form summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentForm {
    /// W/D/L sequence, most recent first, always length 5.
    pub last5_games: String,
    /// 0-100 score derived from the last 5 results.
    pub last5_performance: u8,
    pub recent_goals_scored: u8,
    pub recent_goals_conceded: u8,
}

/// Home/away split over the research window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeAwayRecord {
    pub home_played: u8,
    pub home_wins: u8,
    pub home_draws: u8,
    pub home_losses: u8,
    pub away_played: u8,
    pub away_wins: u8,
    pub away_draws: u8,
    pub away_losses: u8,
}

/// Historical results between exactly two teams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadToHeadData {
    pub total_meetings: u32,
    /// Wins for the team the orchestrator treats as "home".
    pub home_wins: u32,
    pub draws: u32,
    pub away_wins: u32,
    /// Most recent meetings, newest first (at most 5).
    pub recent_meetings: Vec<MatchRecord>,
}

/// Player availability stub.
///
/// Kept in the model so the shape matches the content layer's expectations;
/// always empty in this core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAvailability {
    pub injured: Vec<String>,
    pub suspended: Vec<String>,
    pub doubtful: Vec<String>,
}

/// Derived per-team aggregate; the unit cached by the result cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResearch {
    pub team_name: String,
    /// Universal ID when identity resolution succeeded.
    pub team_id: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub season_stats: SeasonStats,
    pub recent_form: RecentForm,
    pub home_away_record: HomeAwayRecord,
    /// Filled by the orchestrator for `analyze_match`; not cached per-team.
    pub head_to_head: Option<HeadToHeadData>,
    pub player_availability: PlayerAvailability,
    /// How many of the 5 research matches were real (not synthetic
    /// padding). 0 means a pure fallback result.
    pub real_match_count: u8,
}

impl TeamResearch {
    /// True when this research came entirely from the fallback generator.
    pub fn is_fallback(&self) -> bool {
        self.real_match_count == 0
    }
}

/// Outcome risk bucket derived from how peaked the distribution is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Three-outcome distribution plus secondary goal markets.
///
/// Invariants: `home_win + draw + away_win == 100`, `home_win`/`away_win`
/// in [10, 80], `draw` in [10, 50], `confidence` in [0, 95].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub home_win: u8,
    pub draw: u8,
    pub away_win: u8,
    pub both_teams_score: u8,
    pub over25_goals: u8,
    pub under25_goals: u8,
    pub confidence: u8,
    pub risk_level: RiskLevel,
}

impl ProbabilityResult {
    pub fn max_outcome(&self) -> u8 {
        self.home_win.max(self.draw).max(self.away_win)
    }
}

/// Full output of `analyze_match`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchAnalysis {
    pub home: TeamResearch,
    pub away: TeamResearch,
    pub league: String,
    pub head_to_head: Option<HeadToHeadData>,
    pub probabilities: ProbabilityResult,
    pub generated_at: DateTime<Utc>,
    /// True when either side's research is synthetic.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_status_settled() {
        assert!(MatchStatus::Finished.is_settled());
        assert!(MatchStatus::Awarded.is_settled());
        assert!(MatchStatus::Walkover.is_settled());
        assert!(!MatchStatus::Scheduled.is_settled());
        assert!(!MatchStatus::Live.is_settled());
        assert!(!MatchStatus::Postponed.is_settled());
    }

    #[test]
    fn test_season_stats_from_counts() {
        let stats = SeasonStats::from_counts(2, 2, 1, 8, 7);
        assert_eq!(stats.played, 5);
        assert_eq!(stats.points, 8);
        assert_eq!(stats.goal_difference, 1);
    }

    #[test]
    fn test_dedup_key_case_insensitive() {
        let a = MatchRecord {
            id: "1".to_string(),
            date: Utc::now(),
            home_team_name: "Arsenal".to_string(),
            home_team_id: None,
            away_team_name: "Chelsea".to_string(),
            away_team_id: None,
            home_score: 1,
            away_score: 1,
            status: MatchStatus::Finished,
            league_name: "Premier League".to_string(),
            kickoff_time: None,
        };
        let mut b = a.clone();
        b.id = "2".to_string();
        b.home_team_name = "ARSENAL".to_string();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_risk_level_serialization() {
        let json = serde_json::to_string(&RiskLevel::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
    }
}
