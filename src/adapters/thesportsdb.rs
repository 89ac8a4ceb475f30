//! TheSportsDB adapter.
//!
//! Community source. Everything is stringly typed: scores arrive as string
//! integers, dates as separate `dateEvent`/`strTime` fields, statuses as
//! prose ("Match Finished", "Not Started").

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{http_client, read_json, SourceAdapter};
use crate::error::SourceError;
use crate::identity::{name_similarity, normalize_team_name};
use crate::source_config::Source;
use crate::types::{MatchRecord, MatchStatus, SearchCandidate};

const BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json";

#[derive(Clone)]
pub struct TheSportsDbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for TheSportsDbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TheSportsDbClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TheSportsDbClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    async fn fetch(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value, SourceError> {
        let resp = self
            .client
            .get(format!("{}/{}/{}", self.base_url, self.api_key, endpoint))
            .query(query)
            .send()
            .await
            .map_err(SourceError::from_reqwest)?;
        read_json(resp).await
    }

    fn parse_events(&self, events: &Value) -> Vec<MatchRecord> {
        let mut out = Vec::new();
        let Some(items) = events.as_array() else {
            return out;
        };
        for item in items {
            let Some(date) = parse_event_date(item) else {
                continue;
            };
            out.push(MatchRecord {
                id: item["idEvent"].as_str().unwrap_or_default().to_string(),
                date,
                home_team_name: item["strHomeTeam"].as_str().unwrap_or_default().to_string(),
                home_team_id: item["idHomeTeam"].as_str().map(|s| s.to_string()),
                away_team_name: item["strAwayTeam"].as_str().unwrap_or_default().to_string(),
                away_team_id: item["idAwayTeam"].as_str().map(|s| s.to_string()),
                home_score: parse_score(&item["intHomeScore"]),
                away_score: parse_score(&item["intAwayScore"]),
                status: normalize_status(item["strStatus"].as_str().unwrap_or("")),
                league_name: item["strLeague"].as_str().unwrap_or_default().to_string(),
                kickoff_time: Some(date),
            });
        }
        out
    }
}

/// Scores come back as string integers ("3") or null for future events.
fn parse_score(value: &Value) -> u8 {
    value
        .as_str()
        .and_then(|s| s.parse::<u8>().ok())
        .or_else(|| value.as_u64().map(|v| v as u8))
        .unwrap_or(0)
}

fn parse_event_date(item: &Value) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(item["dateEvent"].as_str()?, "%Y-%m-%d").ok()?;
    let time = item["strTime"]
        .as_str()
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok())
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).expect("midnight is valid"));
    Some(date.and_time(time).and_utc())
}

/// Map TheSportsDB prose statuses into the canonical enum.
pub fn normalize_status(status: &str) -> MatchStatus {
    match status {
        "Match Finished" | "FT" | "AET" | "PEN" => MatchStatus::Finished,
        "Not Started" | "NS" | "" => MatchStatus::Scheduled,
        "1H" | "2H" | "HT" | "ET" | "Live" => MatchStatus::Live,
        "Match Postponed" | "POST" | "Postponed" => MatchStatus::Postponed,
        "Match Cancelled" | "Cancelled" => MatchStatus::Cancelled,
        "Match Awarded" => MatchStatus::Awarded,
        "Walkover" | "WO" => MatchStatus::Walkover,
        _ => MatchStatus::Scheduled,
    }
}

#[async_trait]
impl SourceAdapter for TheSportsDbClient {
    fn source(&self) -> Source {
        Source::TheSportsDb
    }

    async fn search_team(&self, name: &str) -> Result<Option<SearchCandidate>, SourceError> {
        let data = self.fetch("searchteams.php", &[("t", name)]).await?;
        let Some(teams) = data["teams"].as_array() else {
            // The API returns `"teams": null` for no hits.
            return Ok(None);
        };
        let query = normalize_team_name(name);
        let best = teams
            .iter()
            .filter(|t| t["strSport"].as_str() == Some("Soccer"))
            .filter_map(|team| {
                let candidate_name = team["strTeam"].as_str()?;
                let id = team["idTeam"].as_str()?;
                Some(SearchCandidate {
                    source: Source::TheSportsDb,
                    external_id: id.to_string(),
                    name: candidate_name.to_string(),
                    country: team["strCountry"].as_str().map(|s| s.to_string()),
                    league: team["strLeague"].as_str().map(|s| s.to_string()),
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
            .fetch("eventslast.php", &[("id", team_external_id)])
            .await?;
        let mut matches = self.parse_events(&data["results"]);
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
            .fetch("eventsnext.php", &[("id", team_external_id)])
            .await?;
        let mut matches = self.parse_events(&data["events"]);
        matches.sort_by(|a, b| a.date.cmp(&b.date));
        matches.truncate(count as usize);
        Ok(matches)
    }

    async fn head_to_head(
        &self,
        home_external_id: &str,
        away_external_id: &str,
    ) -> Result<Vec<MatchRecord>, SourceError> {
        // No direct pair endpoint; take the home side's recent events and
        // keep the meetings against the away side.
        let data = self
            .fetch("eventslast.php", &[("id", home_external_id)])
            .await?;
        let matches = self
            .parse_events(&data["results"])
            .into_iter()
            .filter(|m| {
                m.home_team_id.as_deref() == Some(away_external_id)
                    || m.away_team_id.as_deref() == Some(away_external_id)
            })
            .collect();
        Ok(matches)
    }

    async fn health_check(&self) -> bool {
        self.fetch("all_leagues.php", &[]).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("Match Finished"), MatchStatus::Finished);
        assert_eq!(normalize_status("Not Started"), MatchStatus::Scheduled);
        assert_eq!(normalize_status(""), MatchStatus::Scheduled);
        assert_eq!(normalize_status("1H"), MatchStatus::Live);
        assert_eq!(normalize_status("Match Postponed"), MatchStatus::Postponed);
        assert_eq!(normalize_status("Walkover"), MatchStatus::Walkover);
    }

    #[test]
    fn test_parse_events_with_string_scores() {
        let client = TheSportsDbClient::new("3".to_string());
        let payload = json!([{
            "idEvent": "1032723",
            "dateEvent": "2024-05-11",
            "strTime": "15:00:00",
            "strHomeTeam": "Fulham",
            "idHomeTeam": "133600",
            "strAwayTeam": "Man City",
            "idAwayTeam": "133613",
            "intHomeScore": "0",
            "intAwayScore": "4",
            "strStatus": "Match Finished",
            "strLeague": "English Premier League"
        }]);
        let matches = client.parse_events(&payload);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].away_score, 4);
        assert_eq!(matches[0].status, MatchStatus::Finished);
        assert_eq!(matches[0].date.format("%H:%M").to_string(), "15:00");
    }

    #[test]
    fn test_parse_events_tolerates_missing_time() {
        let client = TheSportsDbClient::new("3".to_string());
        let payload = json!([{
            "idEvent": "1",
            "dateEvent": "2024-05-11",
            "strHomeTeam": "A",
            "strAwayTeam": "B",
            "strStatus": "Not Started",
            "strLeague": "League"
        }]);
        let matches = client.parse_events(&payload);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].home_score, 0);
    }
}
