//! football-data.org (v4) adapter.
//!
//! Regional European source. Matches arrive as `{ matches: [...] }` with
//! verbose status strings ("SCHEDULED", "IN_PLAY", "FINISHED", ...) and
//! scores nested under `score.fullTime`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{http_client, read_json, SourceAdapter};
use crate::error::SourceError;
use crate::identity::{name_similarity, normalize_team_name};
use crate::source_config::Source;
use crate::types::{MatchRecord, MatchStatus, SearchCandidate};

const BASE_URL: &str = "https://api.football-data.org/v4";

#[derive(Clone)]
pub struct FootballDataClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for FootballDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FootballDataClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FootballDataClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, SourceError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Auth-Token", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;
        read_json(resp).await
    }

    fn parse_matches(&self, data: &Value) -> Vec<MatchRecord> {
        let mut out = Vec::new();
        let Some(items) = data["matches"].as_array() else {
            return out;
        };
        for item in items {
            let Some(date) = item["utcDate"]
                .as_str()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.with_timezone(&Utc))
            else {
                continue;
            };
            out.push(MatchRecord {
                id: item["id"].as_i64().map(|i| i.to_string()).unwrap_or_default(),
                date,
                home_team_name: item["homeTeam"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                home_team_id: item["homeTeam"]["id"].as_i64().map(|i| i.to_string()),
                away_team_name: item["awayTeam"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                away_team_id: item["awayTeam"]["id"].as_i64().map(|i| i.to_string()),
                home_score: item["score"]["fullTime"]["home"].as_u64().unwrap_or(0) as u8,
                away_score: item["score"]["fullTime"]["away"].as_u64().unwrap_or(0) as u8,
                status: normalize_status(item["status"].as_str().unwrap_or("")),
                league_name: item["competition"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                kickoff_time: Some(date),
            });
        }
        out
    }
}

/// Keep only the fixtures where the given opponent is on either side.
fn meetings_with(matches: Vec<MatchRecord>, opponent_external_id: &str) -> Vec<MatchRecord> {
    matches
        .into_iter()
        .filter(|m| {
            m.home_team_id.as_deref() == Some(opponent_external_id)
                || m.away_team_id.as_deref() == Some(opponent_external_id)
        })
        .collect()
}

/// Map football-data.org status strings into the canonical enum.
pub fn normalize_status(status: &str) -> MatchStatus {
    match status {
        "SCHEDULED" | "TIMED" => MatchStatus::Scheduled,
        "IN_PLAY" | "PAUSED" | "LIVE" => MatchStatus::Live,
        "FINISHED" => MatchStatus::Finished,
        "POSTPONED" | "SUSPENDED" => MatchStatus::Postponed,
        "CANCELLED" => MatchStatus::Cancelled,
        "AWARDED" => MatchStatus::Awarded,
        _ => MatchStatus::Scheduled,
    }
}

#[async_trait]
impl SourceAdapter for FootballDataClient {
    fn source(&self) -> Source {
        Source::FootballData
    }

    async fn search_team(&self, name: &str) -> Result<Option<SearchCandidate>, SourceError> {
        let data = self.fetch("/teams", &[("name", name)]).await?;
        let Some(items) = data["teams"].as_array() else {
            return Err(SourceError::Malformed("missing teams array".to_string()));
        };
        let query = normalize_team_name(name);
        let best = items
            .iter()
            .filter_map(|team| {
                let candidate_name = team["name"].as_str()?;
                let id = team["id"].as_i64()?;
                Some(SearchCandidate {
                    source: Source::FootballData,
                    external_id: id.to_string(),
                    name: candidate_name.to_string(),
                    country: team["area"]["name"].as_str().map(|s| s.to_string()),
                    league: team["runningCompetitions"][0]["name"]
                        .as_str()
                        .map(|s| s.to_string()),
                    confidence: name_similarity(&query, &normalize_team_name(candidate_name)),
                })
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
        Ok(best)
    }

    async fn recent_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let limit = count.to_string();
        let data = self
            .fetch(
                &format!("/teams/{}/matches", team_external_id),
                &[("status", "FINISHED"), ("limit", &limit)],
            )
            .await?;
        let mut matches = self.parse_matches(&data);
        matches.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matches)
    }

    async fn upcoming_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let limit = count.to_string();
        let data = self
            .fetch(
                &format!("/teams/{}/matches", team_external_id),
                &[("status", "SCHEDULED"), ("limit", &limit)],
            )
            .await?;
        let mut matches = self.parse_matches(&data);
        matches.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(matches)
    }

    async fn head_to_head(
        &self,
        home_external_id: &str,
        away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        // v4 exposes head-to-head relative to a match, not a team pair;
        // take the home side's finished matches and keep the meetings
        // against the away side.
        let data = self
            .fetch(
                &format!("/teams/{}/matches", home_external_id),
                &[("status", "FINISHED"), ("limit", "50")],
            )
            .await?;
        Ok(meetings_with(self.parse_matches(&data), away_external_id))
    }

    async fn health_check(&self) -> bool {
        self.fetch("/competitions", &[]).await.is_ok()
    }
}
