//! FootyStats adapter.
//!
//! Stats aggregator with flat snake_case payloads under `{ data: [...] }`,
//! unix-second timestamps, and a tiny status vocabulary
//! ("complete", "incomplete", "suspended", "canceled").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{http_client, read_json, SourceAdapter};
use crate::error::SourceError;
use crate::identity::{name_similarity, normalize_team_name};
use crate::source_config::Source;
use crate::types::{MatchRecord, MatchStatus, SearchCandidate};

const BASE_URL: &str = "https://api.football-data-api.com";

#[derive(Clone)]
pub struct FootyStatsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for FootyStatsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FootyStatsClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FootyStatsClient {
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
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;
        read_json(resp).await
    }

    fn parse_matches(&self, data: &Value) -> Vec<MatchRecord> {
        let mut out = Vec::new();
        let Some(items) = data["data"].as_array() else {
            return out;
        };
        for item in items {
            let Some(date) = item["date_unix"]
                .as_i64()
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            else {
                continue;
            };
            out.push(MatchRecord {
                id: item["id"].as_i64().map(|i| i.to_string()).unwrap_or_default(),
                date,
                home_team_name: item["home_name"].as_str().unwrap_or_default().to_string(),
                home_team_id: item["home_id"].as_i64().map(|i| i.to_string()),
                away_team_name: item["away_name"].as_str().unwrap_or_default().to_string(),
                away_team_id: item["away_id"].as_i64().map(|i| i.to_string()),
                home_score: item["home_goals"].as_u64().unwrap_or(0) as u8,
                away_score: item["away_goals"].as_u64().unwrap_or(0) as u8,
                status: normalize_status(item["status"].as_str().unwrap_or("")),
                league_name: item["league_name"].as_str().unwrap_or_default().to_string(),
                kickoff_time: Some(date),
            });
        }
        out
    }
}

/// Map FootyStats statuses into the canonical enum.
pub fn normalize_status(status: &str) -> MatchStatus {
    match status {
        "complete" => MatchStatus::Finished,
        "incomplete" => MatchStatus::Scheduled,
        "live" => MatchStatus::Live,
        "suspended" => MatchStatus::Postponed,
        "canceled" | "cancelled" => MatchStatus::Cancelled,
        _ => MatchStatus::Scheduled,
    }
}

#[async_trait]
impl SourceAdapter for FootyStatsClient {
    fn source(&self) -> Source {
        Source::FootyStats
    }

    async fn search_team(&self, name: &str) -> Result<Option<SearchCandidate>, SourceError> {
        let data = self.fetch("/team-search", &[("name", name)]).await?;
        let Some(teams) = data["data"].as_array() else {
            return Err(SourceError::Malformed("missing data array".to_string()));
        };
        let query = normalize_team_name(name);
        let best = teams
            .iter()
            .filter_map(|team| {
                let candidate_name = team["name"].as_str()?;
                let id = team["id"].as_i64()?;
                Some(SearchCandidate {
                    source: Source::FootyStats,
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
        let data = self
            .fetch("/lastx", &[("team_id", team_external_id)])
            .await?;
        let mut matches = self.parse_matches(&data);
        matches.retain(|m| m.status.is_settled());
        matches.sort_by(|a, b| b.date.cmp(&a.date));
        matches.truncate(count as usize);
        Ok(matches)
    }

    async fn upcoming_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let data = self
            .fetch("/team-fixtures", &[("team_id", team_external_id)])
            .await?;
        let mut matches = self.parse_matches(&data);
        matches.retain(|m| m.status == MatchStatus::Scheduled);
        matches.sort_by(|a, b| a.date.cmp(&b.date));
        matches.truncate(count as usize);
        Ok(matches)
    }

    async fn head_to_head(
        &self,
        home_external_id: &str,
        away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let data = self
            .fetch("/lastx", &[("team_id", home_external_id)])
            .await?;
        let matches = self
            .parse_matches(&data)
            .into_iter()
            .filter(|m| {
                m.home_team_id.as_deref() == Some(away_external_id)
                    || m.away_team_id.as_deref() == Some(away_external_id)
            })
            .collect();
        Ok(matches)
    }

    async fn health_check(&self) -> bool {
        self.fetch("/league-list", &[]).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("complete"), MatchStatus::Finished);
        assert_eq!(normalize_status("incomplete"), MatchStatus::Scheduled);
        assert_eq!(normalize_status("live"), MatchStatus::Live);
        assert_eq!(normalize_status("suspended"), MatchStatus::Postponed);
        assert_eq!(normalize_status("canceled"), MatchStatus::Cancelled);
    }

    #[test]
    fn test_parse_matches_from_unix_timestamps() {
        let client = FootyStatsClient::new("test".to_string());
        let payload = json!({
            "data": [{
                "id": 579101,
                "date_unix": 1715436000,
                "home_id": 59,
                "home_name": "West Ham United",
                "away_id": 145,
                "away_name": "Luton Town",
                "home_goals": 3,
                "away_goals": 1,
                "status": "complete",
                "league_name": "Premier League"
            }]
        });
        let matches = client.parse_matches(&payload);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].home_team_name, "West Ham United");
        assert_eq!(matches[0].home_score, 3);
        assert_eq!(matches[0].status, MatchStatus::Finished);
        assert_eq!(matches[0].date.format("%Y-%m-%d").to_string(), "2024-05-11");
    }

    #[test]
    fn test_parse_skips_entries_without_timestamp() {
        let client = FootyStatsClient::new("test".to_string());
        let payload = json!({ "data": [{ "id": 1, "status": "complete" }] });
        assert!(client.parse_matches(&payload).is_empty());
    }
}
