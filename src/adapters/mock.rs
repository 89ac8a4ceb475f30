//! Call-counting mock adapter shared by the crate's tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::SourceAdapter;
use crate::error::SourceError;
use crate::source_config::Source;
use crate::types::{MatchRecord, MatchStatus, SearchCandidate};

/// How a mock call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    None,
    NotFound,
    Timeout,
    RateLimited,
    Upstream(u16),
}

impl FailMode {
    fn to_error(self) -> Option<SourceError> {
        match self {
            FailMode::None => None,
            FailMode::NotFound => Some(SourceError::NotFound),
            FailMode::Timeout => Some(SourceError::Timeout),
            FailMode::RateLimited => Some(SourceError::RateLimited { retry_after: None }),
            FailMode::Upstream(status) => Some(SourceError::Upstream { status }),
        }
    }
}

/// Configurable in-memory adapter that counts upstream calls.
pub struct MockAdapter {
    source: Source,
    calls: Arc<AtomicUsize>,
    fail: RwLock<FailMode>,
    search_result: RwLock<Option<SearchCandidate>>,
    matches: RwLock<Vec<MatchRecord>>,
    h2h: RwLock<Vec<MatchRecord>>,
}

impl MockAdapter {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            calls: Arc::new(AtomicUsize::new(0)),
            fail: RwLock::new(FailMode::None),
            search_result: RwLock::new(None),
            matches: RwLock::new(Vec::new()),
            h2h: RwLock::new(Vec::new()),
        }
    }

    pub fn with_search(self, name: &str, external_id: &str) -> Self {
        *self.search_result.write() = Some(SearchCandidate {
            source: self.source,
            external_id: external_id.to_string(),
            name: name.to_string(),
            country: None,
            league: None,
            confidence: 1.0,
        });
        self
    }

    pub fn with_matches(self, matches: Vec<MatchRecord>) -> Self {
        *self.matches.write() = matches;
        self
    }

    pub fn with_h2h(self, matches: Vec<MatchRecord>) -> Self {
        *self.h2h.write() = matches;
        self
    }

    pub fn failing(self, mode: FailMode) -> Self {
        *self.fail.write() = mode;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the call counter, for asserting after the adapter
    /// has been moved into a registry.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn check_fail(&self) -> Result<(), SourceError> {
        match self.fail.read().to_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn source(&self) -> Source {
        self.source
    }

    async fn search_team(&self, _name: &str) -> Result<Option<SearchCandidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(self.search_result.read().clone())
    }

    async fn recent_matches(
        &self,
        _team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        let matches = self.matches.read();
        Ok(matches.iter().take(count as usize).cloned().collect())
    }

    async fn upcoming_matches(
        &self,
        _team_external_id: &str,
        _count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(Vec::new())
    }

    async fn head_to_head(
        &self,
        _home_external_id: &str,
        _away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(self.h2h.read().clone())
    }

    async fn health_check(&self) -> bool {
        matches!(*self.fail.read(), FailMode::None)
    }
}

/// Build a finished match `days_ago`, for test fixtures.
pub fn finished_match(
    id: &str,
    home: &str,
    away: &str,
    home_score: u8,
    away_score: u8,
    days_ago: i64,
) -> MatchRecord {
    MatchRecord {
        id: id.to_string(),
        date: Utc::now() - ChronoDuration::days(days_ago),
        home_team_name: home.to_string(),
        home_team_id: None,
        away_team_name: away.to_string(),
        away_team_id: None,
        home_score,
        away_score,
        status: MatchStatus::Finished,
        league_name: "Premier League".to_string(),
        kickoff_time: None,
    }
}
