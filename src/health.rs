//! Per-source health tracking: rate limiting, circuit breaking, backoff.
//!
//! This module provides:
//! - A pure `HealthSnapshot` with an explicit `apply` transition, so policy
//!   can be tested with injected clocks instead of wall-clock sleeps
//! - The process-wide `SourceHealthGovernor` that gates every upstream call
//! - The `IntelligentWaiter`, a bounded poll on `can_request` for cases
//!   where a short wait beats falling through to a lower-priority source
//!
//! Policy per source (derived from the vendor limits in `source_config`):
//! sliding 60s window below ~50% of the vendor per-minute limit, rolling 30s
//! burst below ~30% of the vendor burst limit, minimum spacing of
//! max(10s, 2x nominal interval), circuit trip at 2 consecutive errors,
//! exponential backoff on 429, linear backoff on 5xx.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::source_config::{limits_for, Source, SourceLimits};

const WINDOW: Duration = Duration::from_secs(60);
const BURST_WINDOW: Duration = Duration::from_secs(30);

/// Number of consecutive errors that trips the circuit.
const TRIP_THRESHOLD: u32 = 2;

/// Outcome of one attempted upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    /// Failed call, with the HTTP status when one applies.
    Error(Option<u16>),
}

/// Immutable per-source health state.
///
/// All transitions take an explicit `now` so tests never need to sleep.
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    /// Timestamps of attempted requests within the sliding window.
    requests: Vec<Instant>,
    pub last_request_at: Option<Instant>,
    pub error_count: u32,
    pub backoff_until: Option<Instant>,
}

impl HealthSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests attempted within `window` of `now`.
    fn count_within(&self, window: Duration, now: Instant) -> u32 {
        self.requests
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < window)
            .count() as u32
    }

    pub fn requests_in_window(&self, now: Instant) -> u32 {
        self.count_within(WINDOW, now)
    }

    /// Whether a request to this source is currently permitted.
    pub fn can_request(&self, limits: &SourceLimits, now: Instant) -> bool {
        // Backoff window gates everything. Once it lapses, one probe is
        // allowed even with a tripped circuit so a success can reset it.
        match self.backoff_until {
            Some(until) if now < until => return false,
            Some(_) => {}
            None => {
                if self.error_count >= TRIP_THRESHOLD {
                    // Tripped with no pending backoff: stays gated until an
                    // explicit reset.
                    return false;
                }
            }
        }

        if self.count_within(WINDOW, now) >= limits.window_cap() {
            return false;
        }
        if self.count_within(BURST_WINDOW, now) >= limits.burst_cap() {
            return false;
        }
        if let Some(last) = self.last_request_at {
            if now.saturating_duration_since(last) < Duration::from_secs(limits.min_spacing_secs())
            {
                return false;
            }
        }
        true
    }

    /// Register an attempted call (counts against the sliding windows).
    pub fn with_attempt(&self, now: Instant) -> Self {
        let mut next = self.clone();
        next.requests.retain(|t| now.saturating_duration_since(*t) < WINDOW);
        next.requests.push(now);
        next.last_request_at = Some(now);
        next
    }

    /// Apply a call outcome, producing the next state.
    pub fn apply(&self, outcome: CallOutcome, now: Instant) -> Self {
        let mut next = self.clone();
        next.requests.retain(|t| now.saturating_duration_since(*t) < WINDOW);

        match outcome {
            CallOutcome::Success => {
                // Being allowed to call implies any backoff already lapsed.
                next.error_count = 0;
                next.backoff_until = None;
            }
            CallOutcome::Error(status) => {
                next.error_count += 1;
                match status {
                    Some(429) => {
                        let secs = 2u64
                            .saturating_pow(next.error_count.min(32))
                            .min(300);
                        next.backoff_until = Some(now + Duration::from_secs(secs));
                    }
                    Some(s) if s >= 500 => {
                        let secs = (10 * next.error_count as u64).min(60);
                        next.backoff_until = Some(now + Duration::from_secs(secs));
                    }
                    _ => {}
                }
            }
        }
        next
    }
}

/// Read-only view of a source's health, for observability.
#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub source: Source,
    pub available: bool,
    pub requests_in_window: u32,
    pub error_count: u32,
    /// Seconds of backoff remaining, if any.
    pub backoff_remaining_secs: Option<u64>,
}

/// Process-wide gate for every upstream call.
///
/// Explicitly constructed and injectable (no hidden globals) so tests can
/// run isolated instances.
#[derive(Debug, Default)]
pub struct SourceHealthGovernor {
    states: RwLock<FxHashMap<Source, HealthSnapshot>>,
}

impl SourceHealthGovernor {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, source: Source) -> HealthSnapshot {
        self.states.read().get(&source).cloned().unwrap_or_default()
    }

    pub fn can_request(&self, source: Source) -> bool {
        self.can_request_at(source, Instant::now())
    }

    pub fn can_request_at(&self, source: Source, now: Instant) -> bool {
        self.snapshot(source).can_request(limits_for(source), now)
    }

    /// Stamp an attempted call. Called by the fan-out engine once a source
    /// passes the gate, so waiter polling never consumes window budget.
    pub fn mark_request(&self, source: Source) {
        self.mark_request_at(source, Instant::now());
    }

    pub fn mark_request_at(&self, source: Source, now: Instant) {
        let mut states = self.states.write();
        let state = states.entry(source).or_default();
        *state = state.with_attempt(now);
    }

    pub fn record_success(&self, source: Source) {
        self.record_outcome_at(source, CallOutcome::Success, Instant::now());
    }

    pub fn record_error(&self, source: Source, status: Option<u16>) {
        self.record_outcome_at(source, CallOutcome::Error(status), Instant::now());
    }

    pub fn record_outcome_at(&self, source: Source, outcome: CallOutcome, now: Instant) {
        let mut states = self.states.write();
        let state = states.entry(source).or_default();
        let next = state.apply(outcome, now);

        if next.error_count >= TRIP_THRESHOLD && state.error_count < TRIP_THRESHOLD {
            warn!(
                "source {} circuit tripped ({} consecutive errors)",
                source, next.error_count
            );
        } else if let (Some(until), CallOutcome::Error(status)) = (next.backoff_until, outcome) {
            debug!(
                "source {} backing off {:?} (status {:?})",
                source,
                until.saturating_duration_since(now),
                status
            );
        }
        *state = next;
    }

    pub fn status(&self, source: Source) -> SourceStatus {
        self.status_at(source, Instant::now())
    }

    pub fn status_at(&self, source: Source, now: Instant) -> SourceStatus {
        let state = self.snapshot(source);
        SourceStatus {
            source,
            available: state.can_request(limits_for(source), now),
            requests_in_window: state.requests_in_window(now),
            error_count: state.error_count,
            backoff_remaining_secs: state
                .backoff_until
                .and_then(|u| u.checked_duration_since(now))
                .map(|d| d.as_secs()),
        }
    }

    /// Clear all state for one source.
    pub fn reset(&self, source: Source) {
        self.states.write().remove(&source);
    }

    pub fn reset_all(&self) {
        self.states.write().clear();
    }
}

/// Bounded poll on `can_request`, used when a short wait is cheaper than
/// querying a lower-priority source.
#[derive(Debug, Clone)]
pub struct IntelligentWaiter {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for IntelligentWaiter {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl IntelligentWaiter {
    /// Hard ceiling on `max_wait`.
    pub const MAX_WAIT_CEILING: Duration = Duration::from_secs(30);

    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait: max_wait.min(Self::MAX_WAIT_CEILING),
        }
    }

    /// Poll until the source is available or the wait budget is spent.
    /// Returns true when the source became available.
    pub async fn wait_for(&self, governor: &Arc<SourceHealthGovernor>, source: Source) -> bool {
        let deadline = tokio::time::Instant::now() + self.max_wait.min(Self::MAX_WAIT_CEILING);
        loop {
            if governor.can_request(source) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("gave up waiting on source {}", source);
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
