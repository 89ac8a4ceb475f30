//! Guaranteed-available synthetic research data.
//!
//! When resolution or every upstream source fails, the engine still has to
//! return a structurally complete `TeamResearch`. Teams are bucketed into
//! coarse tiers via curated name lists and given a fixed statistical
//! archetype per tier; match padding is seeded from the team name so
//! repeated calls produce identical output.

use chrono::{Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hash::{Hash, Hasher};

use crate::identity::normalize_team_name;
use crate::types::{
    HomeAwayRecord, MatchRecord, MatchStatus, PlayerAvailability, RecentForm, SeasonStats,
    TeamResearch, TeamTier,
};

/// Research window size; every research result covers exactly this many
/// matches.
pub const RESEARCH_WINDOW: usize = 5;

/// Clubs strong enough to get the top archetype when no real data exists.
static TOP_TIER_NAMES: &[&str] = &[
    "real madrid",
    "barcelona",
    "manchester city",
    "manchester united",
    "liverpool",
    "arsenal",
    "chelsea",
    "bayern munich",
    "paris saint germain",
    "juventus",
    "inter",
    "ac milan",
    "atletico madrid",
    "borussia dortmund",
];

/// Established clubs that get the mid archetype.
static MID_TIER_NAMES: &[&str] = &[
    "tottenham",
    "newcastle united",
    "aston villa",
    "west ham united",
    "everton",
    "roma",
    "lazio",
    "napoli",
    "sevilla",
    "valencia",
    "villarreal",
    "lyon",
    "marseille",
    "monaco",
    "bayer leverkusen",
    "rb leipzig",
    "benfica",
    "porto",
    "sporting",
    "ajax",
];

/// Per-tier season archetype.
struct Archetype {
    wins: u8,
    draws: u8,
    losses: u8,
    goals_for: u8,
    goals_against: u8,
    form: &'static str,
    performance: u8,
}

fn archetype(tier: TeamTier) -> Archetype {
    match tier {
        TeamTier::Top => Archetype {
            wins: 4,
            draws: 1,
            losses: 0,
            goals_for: 11,
            goals_against: 4,
            form: "WWWDW",
            performance: 80,
        },
        TeamTier::Mid => Archetype {
            wins: 2,
            draws: 2,
            losses: 1,
            goals_for: 8,
            goals_against: 7,
            form: "WDWDL",
            performance: 60,
        },
        TeamTier::Lower => Archetype {
            wins: 1,
            draws: 2,
            losses: 2,
            goals_for: 6,
            goals_against: 9,
            form: "LDWDL",
            performance: 40,
        },
    }
}

/// Synthetic opponents for padded matches.
static OPPONENTS: &[&str] = &[
    "Northfield FC",
    "Eastbrook United",
    "Harbour Town",
    "Westgate Rovers",
    "Southmoor City",
];

/// Scorelines consistent with each outcome, from the padded team's
/// perspective (for, against).
static WIN_SCORES: &[(u8, u8)] = &[(1, 0), (2, 0), (2, 1), (3, 1)];
static DRAW_SCORES: &[(u8, u8)] = &[(0, 0), (1, 1), (2, 2)];
static LOSS_SCORES: &[(u8, u8)] = &[(0, 1), (1, 2), (0, 2)];

/// Tier for a free-text team name; unknown names read as lower tier.
pub fn tier_for(team_name: &str) -> TeamTier {
    let normalized = normalize_team_name(team_name);
    if TOP_TIER_NAMES.iter().any(|t| normalized.contains(t)) {
        TeamTier::Top
    } else if MID_TIER_NAMES.iter().any(|t| normalized.contains(t)) {
        TeamTier::Mid
    } else {
        TeamTier::Lower
    }
}

fn seed_for(team_name: &str, salt: u64) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    normalize_team_name(team_name).hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish()
}

/// A structurally complete research record built purely from the tier
/// archetype. Never fails.
pub fn research_for(team_name: &str) -> TeamResearch {
    let tier = tier_for(team_name);
    let arch = archetype(tier);

    // Fixed home/away split per tier; sums match the archetype counts.
    let home_away = match tier {
        TeamTier::Top => HomeAwayRecord {
            home_played: 3,
            home_wins: 2,
            home_draws: 1,
            home_losses: 0,
            away_played: 2,
            away_wins: 2,
            away_draws: 0,
            away_losses: 0,
        },
        TeamTier::Mid => HomeAwayRecord {
            home_played: 3,
            home_wins: 1,
            home_draws: 1,
            home_losses: 1,
            away_played: 2,
            away_wins: 1,
            away_draws: 1,
            away_losses: 0,
        },
        TeamTier::Lower => HomeAwayRecord {
            home_played: 3,
            home_wins: 1,
            home_draws: 1,
            home_losses: 1,
            away_played: 2,
            away_wins: 0,
            away_draws: 1,
            away_losses: 1,
        },
    };

    TeamResearch {
        team_name: team_name.to_string(),
        team_id: None,
        last_updated: Utc::now(),
        season_stats: SeasonStats::from_counts(
            arch.wins,
            arch.draws,
            arch.losses,
            arch.goals_for,
            arch.goals_against,
        ),
        recent_form: RecentForm {
            last5_games: arch.form.to_string(),
            last5_performance: arch.performance,
            recent_goals_scored: arch.goals_for,
            recent_goals_conceded: arch.goals_against,
        },
        home_away_record: home_away,
        head_to_head: None,
        player_availability: PlayerAvailability::default(),
        real_match_count: 0,
    }
}

/// Synthetic matches topping an existing set up to the research window.
/// Outcomes are drawn 40/30/30 win/draw/loss with scorelines consistent
/// with the drawn outcome.
pub fn pad_matches(
    existing_count: usize,
    team_name: &str,
    team_id: Option<&str>,
) -> Vec<MatchRecord> {
    let needed = RESEARCH_WINDOW.saturating_sub(existing_count);
    let mut rng = StdRng::seed_from_u64(seed_for(team_name, existing_count as u64));
    let mut out = Vec::with_capacity(needed);

    for i in 0..needed {
        let roll: u8 = rng.gen_range(0..100);
        let (for_goals, against_goals) = if roll < 40 {
            WIN_SCORES[rng.gen_range(0..WIN_SCORES.len())]
        } else if roll < 70 {
            DRAW_SCORES[rng.gen_range(0..DRAW_SCORES.len())]
        } else {
            LOSS_SCORES[rng.gen_range(0..LOSS_SCORES.len())]
        };

        let opponent = OPPONENTS[(existing_count + i) % OPPONENTS.len()];
        let at_home = (existing_count + i) % 2 == 0;
        let date = Utc::now() - ChronoDuration::weeks((existing_count + i + 1) as i64);
        let (home_name, away_name, home_score, away_score) = if at_home {
            (team_name, opponent, for_goals, against_goals)
        } else {
            (opponent, team_name, against_goals, for_goals)
        };

        out.push(MatchRecord {
            id: format!("synthetic-{:x}-{}", seed_for(team_name, 0) & 0xffff_ffff, i),
            date,
            home_team_name: home_name.to_string(),
            home_team_id: if at_home { team_id.map(|s| s.to_string()) } else { None },
            away_team_name: away_name.to_string(),
            away_team_id: if at_home { None } else { team_id.map(|s| s.to_string()) },
            home_score,
            away_score,
            status: MatchStatus::Finished,
            league_name: "Friendly".to_string(),
            kickoff_time: None,
        });
    }
    out
}
