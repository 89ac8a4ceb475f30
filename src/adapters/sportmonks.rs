//! Sportmonks (v3 football) adapter.
//!
//! Fixtures arrive as `{ data: [...] }` with a `participants` array carrying
//! home/away via `meta.location` and per-side goals in a `scores` array of
//! `CURRENT` entries.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{http_client, read_json, SourceAdapter};
use crate::error::SourceError;
use crate::identity::{name_similarity, normalize_team_name};
use crate::source_config::Source;
use crate::types::{MatchRecord, MatchStatus, SearchCandidate};

const BASE_URL: &str = "https://api.sportmonks.com/v3/football";

#[derive(Clone)]
pub struct SportmonksClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for SportmonksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SportmonksClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SportmonksClient {
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
            .query(&[("api_token", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;
        read_json(resp).await
    }

    fn parse_fixtures(&self, data: &Value) -> Vec<MatchRecord> {
        let mut out = Vec::new();
        let Some(items) = data["data"].as_array() else {
            return out;
        };
        for item in items {
            let Some(date) = item["starting_at"]
                .as_str()
                .and_then(|d| NaiveDateTime::parse_from_str(d, "%Y-%m-%d %H:%M:%S").ok())
                .map(|d| d.and_utc())
            else {
                continue;
            };

            let (home_name, home_id) = participant(item, "home");
            let (away_name, away_id) = participant(item, "away");

            out.push(MatchRecord {
                id: item["id"].as_i64().map(|i| i.to_string()).unwrap_or_default(),
                date,
                home_team_name: home_name,
                home_team_id: home_id,
                away_team_name: away_name,
                away_team_id: away_id,
                home_score: current_score(item, "home"),
                away_score: current_score(item, "away"),
                status: normalize_status(item["state"]["short_name"].as_str().unwrap_or("")),
                league_name: item["league"]["name"].as_str().unwrap_or_default().to_string(),
                kickoff_time: Some(date),
            });
        }
        out
    }
}

fn participant(item: &Value, location: &str) -> (String, Option<String>) {
    let found = item["participants"]
        .as_array()
        .and_then(|parts| {
            parts
                .iter()
                .find(|p| p["meta"]["location"].as_str() == Some(location))
        });
    match found {
        Some(p) => (
            p["name"].as_str().unwrap_or_default().to_string(),
            p["id"].as_i64().map(|i| i.to_string()),
        ),
        None => (String::new(), None),
    }
}

fn current_score(item: &Value, participant: &str) -> u8 {
    item["scores"]
        .as_array()
        .and_then(|scores| {
            scores.iter().find(|s| {
                s["description"].as_str() == Some("CURRENT")
                    && s["score"]["participant"].as_str() == Some(participant)
            })
        })
        .and_then(|s| s["score"]["goals"].as_u64())
        .unwrap_or(0) as u8
}

/// Map Sportmonks state short names into the canonical enum.
pub fn normalize_status(state: &str) -> MatchStatus {
    match state {
        "NS" | "TBA" => MatchStatus::Scheduled,
        "INPLAY_1ST_HALF" | "INPLAY_2ND_HALF" | "HT" | "INPLAY_ET" | "INPLAY_PENALTIES"
        | "LIVE" => MatchStatus::Live,
        "FT" | "AET" | "FT_PEN" => MatchStatus::Finished,
        "POSTP" | "POSTPONED" => MatchStatus::Postponed,
        "CANC" | "CANCELLED" | "ABAN" => MatchStatus::Cancelled,
        "AWARDED" => MatchStatus::Awarded,
        "WO" | "WALKOVER" => MatchStatus::Walkover,
        _ => MatchStatus::Scheduled,
    }
}

#[async_trait]
impl SourceAdapter for SportmonksClient {
    fn source(&self) -> Source {
        Source::Sportmonks
    }

    async fn search_team(&self, name: &str) -> Result<Option<SearchCandidate>, SourceError> {
        let data = self
            .fetch(&format!("/teams/search/{}", name.trim()), &[])
            .await?;
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
                    source: Source::Sportmonks,
                    external_id: id.to_string(),
                    name: candidate_name.to_string(),
                    country: None,
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
        let per_page = count.to_string();
        let data = self
            .fetch(
                &format!("/fixtures/latest/{}", team_external_id),
                &[
                    ("include", "participants;scores;state;league"),
                    ("per_page", &per_page),
                ],
            )
            .await?;
        let mut matches = self.parse_fixtures(&data);
        matches.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matches)
    }

    async fn upcoming_matches(
        &self,
        team_external_id: &str,
        count: u32,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let per_page = count.to_string();
        let data = self
            .fetch(
                &format!("/fixtures/upcoming/{}", team_external_id),
                &[
                    ("include", "participants;scores;state;league"),
                    ("per_page", &per_page),
                ],
            )
            .await?;
        let mut matches = self.parse_fixtures(&data);
        matches.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(matches)
    }

    async fn head_to_head(
        &self,
        home_external_id: &str,
        away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        let data = self
            .fetch(
                &format!(
                    "/fixtures/head-to-head/{}/{}",
                    home_external_id, away_external_id
                ),
                &[("include", "participants;scores;state;league")],
            )
            .await?;
        Ok(self.parse_fixtures(&data))
    }

    async fn health_check(&self) -> bool {
        self.fetch("/leagues", &[("per_page", "1")]).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("NS"), MatchStatus::Scheduled);
        assert_eq!(normalize_status("INPLAY_2ND_HALF"), MatchStatus::Live);
        assert_eq!(normalize_status("FT"), MatchStatus::Finished);
        assert_eq!(normalize_status("FT_PEN"), MatchStatus::Finished);
        assert_eq!(normalize_status("POSTP"), MatchStatus::Postponed);
        assert_eq!(normalize_status("ABAN"), MatchStatus::Cancelled);
        assert_eq!(normalize_status("WO"), MatchStatus::Walkover);
    }

    #[test]
    fn test_parse_fixture_with_participants_and_scores() {
        let client = SportmonksClient::new("test".to_string());
        let payload = json!({
            "data": [{
                "id": 18535517,
                "starting_at": "2024-05-11 14:00:00",
                "state": { "short_name": "FT" },
                "league": { "name": "Premier League" },
                "participants": [
                    { "id": 8, "name": "Liverpool", "meta": { "location": "home" } },
                    { "id": 19, "name": "Arsenal", "meta": { "location": "away" } }
                ],
                "scores": [
                    { "description": "CURRENT", "score": { "goals": 2, "participant": "home" } },
                    { "description": "CURRENT", "score": { "goals": 2, "participant": "away" } },
                    { "description": "1ST_HALF", "score": { "goals": 1, "participant": "home" } }
                ]
            }]
        });
        let matches = client.parse_fixtures(&payload);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.home_team_name, "Liverpool");
        assert_eq!(m.away_team_name, "Arsenal");
        assert_eq!((m.home_score, m.away_score), (2, 2));
        assert_eq!(m.home_team_id.as_deref(), Some("8"));
    }

    #[test]
    fn test_parse_skips_fixture_without_start_time() {
        let client = SportmonksClient::new("test".to_string());
        let payload = json!({ "data": [{ "id": 1, "state": { "short_name": "NS" } }] });
        assert!(client.parse_fixtures(&payload).is_empty());
    }
}
