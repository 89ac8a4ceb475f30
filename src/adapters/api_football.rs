//! api-football (api-sports.io) adapter.
//!
//! Primary comprehensive source. Fixtures arrive as
//! `{ response: [ { fixture, league, teams, goals } ] }` with short status
//! codes ("NS", "1H", "FT", ...).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{http_client, read_json, SourceAdapter};
use crate::error::SourceError;
use crate::identity::{name_similarity, normalize_team_name};
use crate::source_config::Source;
use crate::types::{MatchRecord, MatchStatus, SearchCandidate};

const BASE_URL: &str = "https://v3.football.api-sports.io";

#[derive(Clone)]
pub struct ApiFootballClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for ApiFootballClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFootballClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiFootballClient {
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
            .header("x-apisports-key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;
        read_json(resp).await
    }

    fn parse_fixtures(&self, data: &Value) -> Vec<MatchRecord> {
        let mut matches = Vec::new();
        let Some(items) = data["response"].as_array() else {
            return matches;
        };
        for item in items {
            let fixture = &item["fixture"];
            let Some(date) = fixture["date"]
                .as_str()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.with_timezone(&Utc))
            else {
                continue;
            };
            let status = normalize_status(fixture["status"]["short"].as_str().unwrap_or(""));
            matches.push(MatchRecord {
                id: fixture["id"]
                    .as_i64()
                    .map(|i| i.to_string())
                    .unwrap_or_default(),
                date,
                home_team_name: item["teams"]["home"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                home_team_id: item["teams"]["home"]["id"].as_i64().map(|i| i.to_string()),
                away_team_name: item["teams"]["away"]["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                away_team_id: item["teams"]["away"]["id"].as_i64().map(|i| i.to_string()),
                home_score: item["goals"]["home"].as_u64().unwrap_or(0) as u8,
                away_score: item["goals"]["away"].as_u64().unwrap_or(0) as u8,
                status,
                league_name: item["league"]["name"].as_str().unwrap_or_default().to_string(),
                kickoff_time: Some(date),
            });
        }
        matches
    }
}

/// Map api-football short status codes into the canonical enum.
pub fn normalize_status(code: &str) -> MatchStatus {
    match code {
        "TBD" | "NS" => MatchStatus::Scheduled,
        "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "SUSP" | "INT" | "LIVE" => MatchStatus::Live,
        "FT" | "AET" | "PEN" => MatchStatus::Finished,
        "PST" => MatchStatus::Postponed,
        "CANC" | "ABD" => MatchStatus::Cancelled,
        "AWD" => MatchStatus::Awarded,
        "WO" => MatchStatus::Walkover,
        _ => MatchStatus::Scheduled,
    }
}

#[async_trait]
impl SourceAdapter for ApiFootballClient {
    fn source(&self) -> Source {
        Source::ApiFootball
    }

    async fn search_team(&self, name: &str) -> Result<Option<SearchCandidate>, SourceError> {
        let data = self.fetch("/teams", &[("search", name)]).await?;
        let Some(items) = data["response"].as_array() else {
            return Err(SourceError::Malformed("missing response array".to_string()));
        };
        let query = normalize_team_name(name);
        let best = items
            .iter()
            .filter_map(|item| {
                let team = &item["team"];
                let candidate_name = team["name"].as_str()?;
                let id = team["id"].as_i64()?;
                Some(SearchCandidate {
                    source: Source::ApiFootball,
                    external_id: id.to_string(),
                    name: candidate_name.to_string(),
                    country: team["country"].as_str().map(|s| s.to_string()),
                    league: None,
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
        let last = count.to_string();
        let data = self
            .fetch("/fixtures", &[("team", team_external_id), ("last", &last)])
            .await?;
        Ok(self.parse_fixtures(&data))
    }

    async fn upcoming_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let next = count.to_string();
        let data = self
            .fetch("/fixtures", &[("team", team_external_id), ("next", &next)])
            .await?;
        Ok(self.parse_fixtures(&data))
    }

    async fn head_to_head(
        &self,
        home_external_id: &str,
        away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let pair = format!("{}-{}", home_external_id, away_external_id);
        let data = self.fetch("/fixtures/headtohead", &[("h2h", &pair)]).await?;
        Ok(self.parse_fixtures(&data))
    }

    async fn health_check(&self) -> bool {
        self.fetch("/status", &[]).await.is_ok()
    }
}
