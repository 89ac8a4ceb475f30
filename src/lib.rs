//! Pitchintel - multi-source football match intelligence.
//!
//! This crate provides:
//! - Cross-vendor team identity resolution (curated table, persistent
//!   store, fuzzy fan-out discovery)
//! - A source health governor with sliding-window rate limits, circuit
//!   breaking, and backoff per vendor
//! - Concurrent fan-out querying of five football data APIs with static
//!   priority selection
//! - TTL-cached team research aggregation over the last five matches
//! - A deterministic fallback generator so analysis never fails outright
//! - A pure probability model producing 1X2, goals markets, confidence,
//!   and risk level

pub mod adapters;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod fanout;
pub mod health;
pub mod identity;
pub mod logging;
pub mod probability;
pub mod source_config;
pub mod types;

pub use adapters::{SourceAdapter, SourceRegistry};
pub use cache::{CacheStats, ResearchCache};
pub use engine::{EngineStatus, MatchIntelEngine};
pub use error::SourceError;
pub use fanout::FanOutEngine;
pub use health::{CallOutcome, IntelligentWaiter, SourceHealthGovernor, SourceStatus};
pub use identity::{IdentityStore, MemoryIdentityStore, TeamResolver};
pub use probability::calculate as calculate_probabilities;
pub use source_config::{Capability, Source, TrustTier};
pub use types::{
    HeadToHeadData, MatchAnalysis, MatchRecord, MatchStatus, ProbabilityResult, RiskLevel,
    SearchCandidate, TeamIdentity, TeamResearch, TeamTier,
};
