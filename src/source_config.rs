//! Static configuration for the supported data sources.
//!
//! This module provides:
//! - The `Source` enum (one variant per vendor)
//! - Documented vendor rate limits used by the health governor
//! - Fixed per-capability priority orderings for the fan-out engine

use serde::{Deserialize, Serialize};

/// The third-party football data vendors this crate knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// api-football (api-sports) - broadest league coverage.
    ApiFootball,
    /// Sportmonks - deep data, strong European coverage.
    Sportmonks,
    /// football-data.org - European competitions.
    FootballData,
    /// TheSportsDB - community-maintained, generous free tier.
    TheSportsDb,
    /// FootyStats - stats-focused aggregate API.
    FootyStats,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::ApiFootball,
        Source::Sportmonks,
        Source::FootballData,
        Source::TheSportsDb,
        Source::FootyStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::ApiFootball => "api_football",
            Source::Sportmonks => "sportmonks",
            Source::FootballData => "football_data",
            Source::TheSportsDb => "thesportsdb",
            Source::FootyStats => "footystats",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much weight a source's answers carry during identity discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    High,
    Standard,
}

/// Documented vendor limits for a single source.
///
/// The governor derives its actual gates from these: it stays at ~50% of the
/// per-minute limit, ~30% of the burst limit, and spaces requests by
/// max(10s, 2x the nominal interval).
#[derive(Debug, Clone, Copy)]
pub struct SourceLimits {
    pub source: Source,
    /// Vendor-documented requests per minute.
    pub requests_per_minute: u32,
    /// Vendor-documented burst allowance over a 30s window.
    pub burst_per_30s: u32,
    pub trust: TrustTier,
}

impl SourceLimits {
    /// Conservative sliding-window cap (60s).
    pub fn window_cap(&self) -> u32 {
        (self.requests_per_minute / 2).max(1)
    }

    /// Conservative rolling burst cap (30s).
    pub fn burst_cap(&self) -> u32 {
        ((self.burst_per_30s * 3) / 10).max(1)
    }

    /// Minimum spacing between requests, in seconds.
    pub fn min_spacing_secs(&self) -> u64 {
        let nominal = (60.0 / self.requests_per_minute as f64).ceil() as u64;
        (2 * nominal).max(10)
    }
}

/// Static limits table for all supported sources.
pub static SOURCE_LIMITS: &[SourceLimits] = &[
    SourceLimits {
        source: Source::ApiFootball,
        requests_per_minute: 30,
        burst_per_30s: 10,
        trust: TrustTier::High,
    },
    SourceLimits {
        source: Source::Sportmonks,
        requests_per_minute: 60,
        burst_per_30s: 20,
        trust: TrustTier::High,
    },
    SourceLimits {
        source: Source::FootballData,
        requests_per_minute: 10,
        burst_per_30s: 6,
        trust: TrustTier::Standard,
    },
    SourceLimits {
        source: Source::TheSportsDb,
        requests_per_minute: 30,
        burst_per_30s: 12,
        trust: TrustTier::Standard,
    },
    SourceLimits {
        source: Source::FootyStats,
        requests_per_minute: 20,
        burst_per_30s: 8,
        trust: TrustTier::Standard,
    },
];

/// Look up the limits for a source.
pub fn limits_for(source: Source) -> &'static SourceLimits {
    SOURCE_LIMITS
        .iter()
        .find(|l| l.source == source)
        .expect("every Source variant has a limits entry")
}

/// The logical query kinds the fan-out engine can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SearchTeam,
    RecentMatches,
    UpcomingMatches,
    HeadToHead,
}

/// Fixed priority order for a capability: the fan-out engine returns the
/// result of the highest-priority source that succeeded, not the first to
/// complete.
///
/// General match data goes primary comprehensive source first, then the
/// regional European source, then the community source, then the rest.
pub fn priority_order(capability: Capability) -> &'static [Source] {
    match capability {
        Capability::SearchTeam => &[
            Source::ApiFootball,
            Source::Sportmonks,
            Source::FootballData,
            Source::TheSportsDb,
            Source::FootyStats,
        ],
        Capability::RecentMatches | Capability::UpcomingMatches => &[
            Source::ApiFootball,
            Source::FootballData,
            Source::TheSportsDb,
            Source::Sportmonks,
            Source::FootyStats,
        ],
        Capability::HeadToHead => &[
            Source::ApiFootball,
            Source::Sportmonks,
            Source::FootballData,
            Source::TheSportsDb,
            Source::FootyStats,
        ],
    }
}
