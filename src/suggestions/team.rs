use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{Category, Priority, Rule, Suggestion, evaluate, rank};
use crate::aggregate::{EventSpread, duel_win_rate, record_of};
use crate::model::{EventKind, Match};

pub const TEAM_LIMIT: usize = 10;
pub const NOT_ENOUGH_DATA_MESSAGE: &str = "Not enough match data to generate suggestions.";

pub const MIN_FORMATION_MATCHES: u32 = 2;
pub const LOW_GOALS_FOR: f64 = 1.0;
pub const HIGH_GOALS_AGAINST: f64 = 2.0;
pub const LOW_XG: f64 = 1.0;
pub const HIGH_XG_AGAINST: f64 = 1.5;
pub const LOW_KEY_PASSES: f64 = 3.0;
pub const POOR_DUELS_PCT: f64 = 45.0;
pub const LOW_DEFENSIVE_ACTIONS: f64 = 10.0;

/// Season aggregates over finished matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonContext {
    pub match_count: u32,
    pub avg_goals_for: f64,
    pub avg_goals_against: f64,
    pub avg_xg: f64,
    pub avg_xg_against: f64,
    pub events: BTreeMap<EventKind, EventSpread>,
}

impl SeasonContext {
    pub fn new(finished: &[Match], events: BTreeMap<EventKind, EventSpread>) -> Self {
        let count = u32::try_from(finished.len()).unwrap_or(u32::MAX);
        let avg = |total: f64| if count > 0 { total / f64::from(count) } else { 0.0 };
        SeasonContext {
            match_count: count,
            avg_goals_for: avg(finished.iter().map(|m| f64::from(m.goals_scored)).sum()),
            avg_goals_against: avg(finished.iter().map(|m| f64::from(m.goals_conceded)).sum()),
            avg_xg: avg(finished.iter().map(|m| m.xg).sum()),
            avg_xg_against: avg(finished.iter().map(|m| m.xg_against).sum()),
            events,
        }
    }

    fn spread(&self, kind: EventKind) -> EventSpread {
        self.events.get(&kind).copied().unwrap_or_default()
    }

    /// Per match in which the event was logged.
    pub fn avg_per_match(&self, kind: EventKind) -> f64 {
        self.spread(kind).average_per_match()
    }

    pub fn duels(&self) -> u32 {
        self.spread(EventKind::DuelsWon).total + self.spread(EventKind::DuelsLost).total
    }

    pub fn duel_win_rate(&self) -> f64 {
        duel_win_rate(
            self.spread(EventKind::DuelsWon).total,
            self.spread(EventKind::DuelsLost).total,
        )
    }

    pub fn avg_interceptions_and_tackles(&self) -> f64 {
        self.avg_per_match(EventKind::Interceptions) + self.avg_per_match(EventKind::Tackles)
    }
}

pub static SEASON_RULES: [Rule<SeasonContext>; 7] = [
    Rule {
        category: Category::Attacking,
        priority: Priority::High,
        title: "Improve Goal Scoring",
        when: |c| c.avg_goals_for < LOW_GOALS_FOR,
        message: |c| {
            format!(
                "Team averages only {:.1} goals per match. Focus on attacking play.",
                c.avg_goals_for
            )
        },
        action_items: &[
            "Train with drills focused on finishing and shooting",
            "Work on creating more goal-scoring opportunities",
            "Keep forward players higher up the pitch",
            "Practice set pieces and crosses",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Defending,
        priority: Priority::High,
        title: "Strengthen Defense",
        when: |c| c.avg_goals_against > HIGH_GOALS_AGAINST,
        message: |c| {
            format!(
                "Team concedes {:.1} goals per match on average. Defensive work needed.",
                c.avg_goals_against
            )
        },
        action_items: &[
            "Focus training on defensive positioning",
            "Work on team shape and compactness",
            "Practice defensive drills and clearances",
            "Improve communication between defenders",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::Medium,
        title: "Create Better Chances",
        when: |c| c.avg_xg < LOW_XG,
        message: |c| {
            format!(
                "Low xG ({:.2}) suggests team isn't creating high-quality chances.",
                c.avg_xg
            )
        },
        action_items: &[
            "Practice attacking patterns and combinations",
            "Work on getting into better shooting positions",
            "Focus on key passes and through balls",
            "Train players to take shots from better angles",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Defending,
        priority: Priority::Medium,
        title: "Reduce Opposition Chances",
        when: |c| c.avg_xg_against > HIGH_XG_AGAINST,
        message: |c| {
            format!(
                "Opposition xG of {:.2} indicates they're creating too many good chances.",
                c.avg_xg_against
            )
        },
        action_items: &[
            "Improve defensive organization",
            "Work on pressing and closing down space",
            "Practice blocking shots and intercepting passes",
            "Train defenders to force shots from wider angles",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::Medium,
        title: "Improve Creative Passing",
        when: |c| c.avg_per_match(EventKind::KeyPasses) < LOW_KEY_PASSES,
        message: |c| {
            format!(
                "Team averages only {:.1} key passes per match. Need more creativity.",
                c.avg_per_match(EventKind::KeyPasses)
            )
        },
        action_items: &[
            "Train with drills more focused on passing",
            "Practice through balls and final third passes",
            "Work on vision and decision-making in attack",
            "Encourage players to take risks in final third",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Physical,
        priority: Priority::Medium,
        title: "Improve Physical Battles",
        when: |c| c.duels() > 0 && c.duel_win_rate() < POOR_DUELS_PCT,
        message: |c| {
            format!(
                "Team wins only {:.1}% of duels. Physical work needed.",
                c.duel_win_rate()
            )
        },
        action_items: &[
            "Focus on strength and conditioning",
            "Practice 1v1 situations and duels",
            "Work on timing and positioning in challenges",
            "Improve body positioning in physical contests",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Defending,
        priority: Priority::Medium,
        title: "Increase Defensive Actions",
        when: |c| c.avg_interceptions_and_tackles() < LOW_DEFENSIVE_ACTIONS,
        message: |_| {
            "Low number of interceptions and tackles suggests passive defending.".to_string()
        },
        action_items: &[
            "Practice aggressive defending and pressing",
            "Work on reading the game and intercepting",
            "Train players to be more proactive in defense",
            "Improve anticipation and positioning",
        ],
        expected_improvement: None,
    },
];

#[derive(Debug, Clone, PartialEq)]
struct FormationRate {
    formation: String,
    win_rate: f64,
}

/// Best and worst win rate among formations used at least twice. First seen wins ties.
fn formation_extremes(finished: &[Match]) -> Option<(FormationRate, FormationRate)> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_formation: HashMap<&str, Vec<Match>> = HashMap::new();
    for m in finished {
        let Some(formation) = m.formation.as_deref().filter(|f| !f.is_empty()) else {
            continue;
        };
        if !by_formation.contains_key(formation) {
            order.push(formation);
        }
        by_formation.entry(formation).or_default().push(m.clone());
    }

    let mut best: Option<FormationRate> = None;
    let mut worst: Option<FormationRate> = None;
    for formation in order {
        let games = &by_formation[formation];
        let played = u32::try_from(games.len()).unwrap_or(u32::MAX);
        if played < MIN_FORMATION_MATCHES {
            continue;
        }
        let rate = FormationRate {
            formation: formation.to_string(),
            win_rate: f64::from(record_of(games).wins) / f64::from(played) * 100.0,
        };
        if best.as_ref().is_none_or(|b| rate.win_rate > b.win_rate) {
            best = Some(rate.clone());
        }
        if worst.as_ref().is_none_or(|w| rate.win_rate < w.win_rate) {
            worst = Some(rate);
        }
    }
    match (best, worst) {
        (Some(best), Some(worst)) if best.formation != worst.formation => Some((best, worst)),
        _ => None,
    }
}

fn formation_suggestion(best: &FormationRate, worst: &FormationRate) -> Suggestion {
    Suggestion {
        category: Category::Tactical,
        priority: Priority::High,
        title: "Consider Formation Change".to_string(),
        message: format!(
            "Your team performs better with {} (win rate: {:.1}%) compared to {} (win rate: {:.1}%).",
            best.formation, best.win_rate, worst.formation, worst.win_rate
        ),
        action_items: vec![
            format!("Use {} formation more frequently", best.formation),
            format!("Analyze why {} works better for your team", best.formation),
            format!(
                "Consider phasing out {} unless match-specific circumstances require it",
                worst.formation
            ),
        ],
        expected_improvement: None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonReport {
    pub season: Option<String>,
    pub match_count: u32,
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `finished` must hold only finished matches of the season.
pub fn season_report(
    season: Option<&str>,
    finished: &[Match],
    events: BTreeMap<EventKind, EventSpread>,
) -> SeasonReport {
    let season = season.map(str::to_string);
    if finished.is_empty() {
        return SeasonReport {
            season,
            match_count: 0,
            suggestions: Vec::new(),
            message: Some(NOT_ENOUGH_DATA_MESSAGE.to_string()),
        };
    }
    let ctx = SeasonContext::new(finished, events);
    let mut suggestions = Vec::new();
    if let Some((best, worst)) = formation_extremes(finished) {
        suggestions.push(formation_suggestion(&best, &worst));
    }
    suggestions.extend(evaluate(&SEASON_RULES, &ctx));
    SeasonReport {
        season,
        match_count: ctx.match_count,
        suggestions: rank(suggestions, TEAM_LIMIT),
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::MatchState;

    fn finished(id: i64, formation: Option<&str>, gf: u32, ga: u32) -> Match {
        let now = Utc::now();
        Match {
            id,
            team_id: 1,
            opponent: format!("Opp {id}"),
            kickoff_at: now,
            analyst_name: "A".to_string(),
            created_by: None,
            state: MatchState::Finished,
            elapsed_seconds: 5400,
            timer_started_at: None,
            formation: formation.map(str::to_string),
            opponent_formation: None,
            season: Some("2025/26".to_string()),
            is_home: true,
            goals_scored: gf,
            goals_conceded: ga,
            xg: 1.5,
            xg_against: 1.0,
            created_at: now,
        }
    }

    #[test]
    fn no_finished_matches_explains_itself() {
        let report = season_report(Some("2025/26"), &[], BTreeMap::new());
        assert!(report.suggestions.is_empty());
        assert_eq!(report.message.as_deref(), Some(NOT_ENOUGH_DATA_MESSAGE));
    }

    #[test]
    fn formation_comparison_needs_two_games_each() {
        let games = [
            finished(1, Some("4-3-3"), 2, 0),
            finished(2, Some("4-3-3"), 3, 1),
            finished(3, Some("4-4-2"), 0, 1),
            finished(4, Some("4-4-2"), 1, 1),
            finished(5, Some("3-5-2"), 0, 4),
        ];
        let (best, worst) = formation_extremes(&games).expect("two qualifying formations");
        assert_eq!(best.formation, "4-3-3");
        assert_eq!(best.win_rate, 100.0);
        assert_eq!(worst.formation, "4-4-2");
        assert_eq!(worst.win_rate, 0.0);

        assert!(formation_extremes(&games[..3]).is_none());
    }

    #[test]
    fn key_pass_average_uses_matches_with_the_event() {
        let games = [finished(1, None, 2, 0), finished(2, None, 2, 0)];
        let mut events = BTreeMap::new();
        events.insert(EventKind::KeyPasses, EventSpread { total: 8, matches: 1 });
        events.insert(EventKind::Interceptions, EventSpread { total: 12, matches: 2 });
        events.insert(EventKind::Tackles, EventSpread { total: 10, matches: 2 });
        let report = season_report(None, &games, events);
        let titles: Vec<&str> = report.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert!(titles.is_empty(), "unexpected {titles:?}");
    }

    #[test]
    fn weak_season_ranks_high_priority_first() {
        let games = [finished(1, Some("4-4-2"), 0, 3), finished(2, Some("4-4-2"), 1, 2)];
        let report = season_report(None, &games, BTreeMap::new());
        let titles: Vec<&str> = report.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Improve Goal Scoring",
                "Strengthen Defense",
                "Improve Creative Passing",
                "Increase Defensive Actions",
            ]
        );
    }
}
