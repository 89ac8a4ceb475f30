//! Pure outcome-probability model.
//!
//! Combines two research records and optional head-to-head history into a
//! 1X2 distribution plus secondary markets. No I/O, no clocks, no shared
//! state; the same inputs always give the same output.

use tracing::debug;

use crate::types::{HeadToHeadData, ProbabilityResult, RiskLevel, TeamResearch};

const H2H_WEIGHT: f64 = 0.4;
const FORM_WEIGHT: f64 = 0.4;
const FACTOR_WEIGHT: f64 = 0.2;

/// Neutral rate used whenever a component has no data behind it.
const NEUTRAL_RATE: f64 = 1.0 / 3.0;

/// Win/loss bounds after validation, in percent.
const WIN_MIN: i64 = 10;
const WIN_MAX: i64 = 80;
const DRAW_MIN: i64 = 10;
const DRAW_MAX: i64 = 50;

/// Full model: 1X2 distribution, goals markets, confidence and risk.
pub fn calculate(
    home: &TeamResearch,
    away: &TeamResearch,
    h2h: Option<&HeadToHeadData>,
) -> ProbabilityResult {
    let home_raw = win_chance(
        h2h_win_rate(h2h, Side::Home),
        last5_win_rate(home),
        additional_factors(Side::Home, home.recent_form.last5_performance),
    );
    let away_raw = win_chance(
        h2h_win_rate(h2h, Side::Away),
        last5_win_rate(away),
        additional_factors(Side::Away, away.recent_form.last5_performance),
    );
    let draw_raw = (0.25 + (0.5 - (home_raw + away_raw) / 2.0)).clamp(0.15, 0.35);

    let (home_win, draw, away_win) = normalize(home_raw, draw_raw, away_raw);
    let (home_win, draw, away_win) = validate(home_win, draw, away_win);

    let (over25, under25) = goals_market(home, away);
    let btts = btts_market(home, away);
    let confidence = confidence_score(home, away, h2h);

    debug!(
        home_raw,
        away_raw, draw_raw, home_win, draw, away_win, confidence, "probability computed"
    );

    ProbabilityResult {
        home_win: home_win as u8,
        draw: draw as u8,
        away_win: away_win as u8,
        both_teams_score: btts as u8,
        over25_goals: over25 as u8,
        under25_goals: under25 as u8,
        confidence: confidence as u8,
        risk_level: risk_level(home_win, draw, away_win),
    }
}

#[derive(Clone, Copy)]
enum Side {
    Home,
    Away,
}

fn win_chance(h2h_rate: f64, form_rate: f64, factors: f64) -> f64 {
    H2H_WEIGHT * h2h_rate + FORM_WEIGHT * form_rate + FACTOR_WEIGHT * factors
}

fn h2h_win_rate(h2h: Option<&HeadToHeadData>, side: Side) -> f64 {
    match h2h {
        Some(data) if data.total_meetings > 0 => {
            let wins = match side {
                Side::Home => data.home_wins,
                Side::Away => data.away_wins,
            };
            wins as f64 / data.total_meetings as f64
        }
        _ => NEUTRAL_RATE,
    }
}

fn last5_win_rate(research: &TeamResearch) -> f64 {
    let played = research.season_stats.played.min(5);
    if played == 0 {
        return NEUTRAL_RATE;
    }
    research.season_stats.wins as f64 / played as f64
}

/// Situational adjustments outside pure win rates: home advantage, a flat
/// match-importance baseline, fatigue, and a recent-form bonus.
fn additional_factors(side: Side, last5_performance: u8) -> f64 {
    let base = match side {
        Side::Home => 0.08 + 0.05 - 0.03,
        Side::Away => -0.03 - 0.03,
    };
    base + form_bonus(last5_performance)
}

fn form_bonus(performance: u8) -> f64 {
    if performance >= 80 {
        0.05
    } else if performance >= 60 {
        0.02
    } else if performance >= 40 {
        0.0
    } else {
        -0.03
    }
}

/// Raw chances to integer percentages summing to exactly 100. Home and away
/// are rounded; the draw absorbs the remainder.
fn normalize(home_raw: f64, draw_raw: f64, away_raw: f64) -> (i64, i64, i64) {
    let total = home_raw + draw_raw + away_raw;
    if total <= 0.0 || !total.is_finite() {
        return (33, 34, 33);
    }
    let home = (home_raw / total * 100.0).round() as i64;
    let away = (away_raw / total * 100.0).round() as i64;
    (home, 100 - home - away, away)
}

/// Idempotent sanity pass over a 1X2 triple: NaN-born values become 33, win
/// chances land in [10,80], the draw in [10,50], and the triple is
/// re-balanced to exactly 100.
pub fn validate(home_win: i64, draw: i64, away_win: i64) -> (i64, i64, i64) {
    let home = home_win.clamp(WIN_MIN, WIN_MAX);
    let away = away_win.clamp(WIN_MIN, WIN_MAX);
    let draw = draw.clamp(DRAW_MIN, DRAW_MAX);

    let total = home + draw + away;
    if total == 100 {
        return (home, draw, away);
    }

    // Push the imbalance into the draw first; spill whatever the draw
    // cannot absorb into the larger win chance.
    let mut draw = (draw + (100 - total)).clamp(DRAW_MIN, DRAW_MAX);
    let mut home = home;
    let mut away = away;
    let leftover = 100 - home - draw - away;
    if leftover != 0 {
        if home >= away {
            home = (home + leftover).clamp(WIN_MIN, WIN_MAX);
        } else {
            away = (away + leftover).clamp(WIN_MIN, WIN_MAX);
        }
    }
    let leftover = 100 - home - draw - away;
    draw += leftover;
    (home, draw, away)
}

/// Per-game scoring rate; neutral-ish 1.2 when nothing was played.
fn attack_rate(research: &TeamResearch) -> f64 {
    per_game(research.season_stats.goals_for, research.season_stats.played)
}

fn defense_rate(research: &TeamResearch) -> f64 {
    per_game(
        research.season_stats.goals_against,
        research.season_stats.played,
    )
}

fn per_game(goals: u8, played: u8) -> f64 {
    if played == 0 {
        1.2
    } else {
        goals as f64 / played as f64
    }
}

/// Over/under 2.5: expected total goals against a 2.3 pivot, 20 points of
/// swing per expected goal.
fn goals_market(home: &TeamResearch, away: &TeamResearch) -> (i64, i64) {
    let home_expected = (attack_rate(home) + defense_rate(away)) / 2.0;
    let away_expected = (attack_rate(away) + defense_rate(home)) / 2.0;
    let expected_total = home_expected + away_expected;

    let over = (50.0 + (expected_total - 2.3) * 20.0).clamp(15.0, 85.0).round() as i64;
    (over, 100 - over)
}

/// Both-teams-score: mean attack rate against a 1.6 pivot.
fn btts_market(home: &TeamResearch, away: &TeamResearch) -> i64 {
    let combined_attack = (attack_rate(home) + attack_rate(away)) / 2.0;
    (50.0 + (combined_attack - 1.6) * 25.0).clamp(20.0, 80.0).round() as i64
}

fn confidence_score(
    home: &TeamResearch,
    away: &TeamResearch,
    h2h: Option<&HeadToHeadData>,
) -> i64 {
    let mut score: i64 = 50;
    if home.real_match_count > 10 && away.real_match_count > 10 {
        score += 10;
    }
    if home.team_id.is_some() && away.team_id.is_some() {
        score += 20;
    }
    if !home.is_fallback() && !away.is_fallback() {
        score += 10;
    }
    if h2h.map(|d| d.total_meetings > 3).unwrap_or(false) {
        score += 15;
    }
    score.min(95)
}

fn risk_level(home_win: i64, draw: i64, away_win: i64) -> RiskLevel {
    let strongest = home_win.max(draw).max(away_win);
    if strongest > 60 {
        RiskLevel::Low
    } else if strongest > 45 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback;
    use crate::types::{RecentForm, SeasonStats};

    fn research(
        wins: u8,
        draws: u8,
        losses: u8,
        goals_for: u8,
        goals_against: u8,
        performance: u8,
    ) -> TeamResearch {
        let mut r = fallback::research_for("Test Team");
        r.season_stats = SeasonStats::from_counts(wins, draws, losses, goals_for, goals_against);
        r.recent_form = RecentForm {
            last5_games: "WWWWW".to_string(),
            last5_performance: performance,
            recent_goals_scored: goals_for,
            recent_goals_conceded: goals_against,
        };
        r
    }

    #[test]
    fn test_reference_scenario() {
        // home: 4W of 5, perf 80; away: 2W of 5, perf 60; h2h 4 meetings
        // with 2 home wins and 1 away win.
        let home = research(4, 1, 0, 11, 4, 80);
        let away = research(2, 2, 1, 8, 7, 60);
        let h2h = HeadToHeadData {
            total_meetings: 4,
            home_wins: 2,
            draws: 1,
            away_wins: 1,
            recent_meetings: Vec::new(),
        };
        let result = calculate(&home, &away, Some(&h2h));
        assert_eq!(result.home_win, 48);
        assert_eq!(result.draw, 30);
        assert_eq!(result.away_win, 22);
    }

    #[test]
    fn test_sums_to_100() {
        let combos = [
            (research(5, 0, 0, 15, 1, 100), research(0, 0, 5, 1, 15, 0)),
            (research(2, 2, 1, 8, 7, 60), research(2, 2, 1, 8, 7, 60)),
            (research(0, 0, 0, 0, 0, 0), research(0, 0, 0, 0, 0, 0)),
        ];
        for (home, away) in &combos {
            let result = calculate(home, away, None);
            assert_eq!(result.home_win + result.draw + result.away_win, 100);
            assert!((10..=80).contains(&result.home_win));
            assert!((10..=80).contains(&result.away_win));
            assert!((10..=50).contains(&result.draw));
        }
    }

    #[test]
    fn test_no_h2h_uses_neutral_rate() {
        let even_home = research(2, 2, 1, 8, 7, 60);
        let even_away = research(2, 2, 1, 8, 7, 60);
        let result = calculate(&even_home, &even_away, None);
        // Identical form, neutral h2h: the only separation left is the
        // home-advantage factor.
        assert!(result.home_win > result.away_win);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let triples = [(48, 30, 22), (90, 5, 5), (0, 100, 0), (33, 34, 33)];
        for (h, d, a) in triples {
            let first = validate(h, d, a);
            let second = validate(first.0, first.1, first.2);
            assert_eq!(first, second);
            assert_eq!(first.0 + first.1 + first.2, 100);
            assert!((10..=80).contains(&first.0));
            assert!((10..=80).contains(&first.2));
            assert!((10..=50).contains(&first.1));
        }
    }

    #[test]
    fn test_strong_attacks_push_goals_markets_up() {
        let heavy_home = research(4, 1, 0, 15, 8, 80);
        let heavy_away = research(3, 1, 1, 13, 9, 80);
        let cagey_home = research(2, 3, 0, 4, 2, 60);
        let cagey_away = research(1, 3, 1, 3, 4, 40);

        let open = calculate(&heavy_home, &heavy_away, None);
        let tight = calculate(&cagey_home, &cagey_away, None);
        assert!(open.over25_goals > tight.over25_goals);
        assert!(open.both_teams_score > tight.both_teams_score);
        assert_eq!(open.over25_goals + open.under25_goals, 100);
    }

    #[test]
    fn test_confidence_components() {
        let mut home = research(4, 1, 0, 11, 4, 80);
        let mut away = research(2, 2, 1, 8, 7, 60);

        // Fallback-shaped input: no ids, no real matches, no h2h.
        let base = calculate(&home, &away, None);
        assert_eq!(base.confidence, 50);

        home.team_id = Some("1".to_string());
        away.team_id = Some("2".to_string());
        home.real_match_count = 12;
        away.real_match_count = 15;
        let h2h = HeadToHeadData {
            total_meetings: 6,
            home_wins: 3,
            draws: 2,
            away_wins: 1,
            recent_meetings: Vec::new(),
        };
        let full = calculate(&home, &away, Some(&h2h));
        assert_eq!(full.confidence, 95.min(50 + 10 + 20 + 10 + 15));
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(risk_level(65, 20, 15), RiskLevel::Low);
        assert_eq!(risk_level(50, 28, 22), RiskLevel::Medium);
        assert_eq!(risk_level(40, 30, 30), RiskLevel::High);
    }
}
