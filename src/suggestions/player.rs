use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Category, Priority, Rule, Suggestion};
use crate::aggregate::{EventBreakdownRow, EventTotals, PlayerBreakdown, PlayerMetrics};
use crate::model::{EventKind, Player};

pub const MIN_DUELS: u32 = 5;
pub const POOR_DUELS_PCT: f64 = 50.0;
pub const LOW_KEY_PASSES: u32 = 2;
pub const MIN_SHOTS_FOR_ACCURACY: u32 = 5;
pub const POOR_ACCURACY_PCT: f64 = 40.0;
pub const LOW_DEFENSIVE_ACTIONS: u32 = 5;
pub const MAX_FOULS: u32 = 3;
pub const LOW_SHOTS: u32 = 2;

/// A player's counters plus how they were scoped.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerContext {
    pub totals: EventTotals,
    pub matches: u32,
    /// Set when the analysis covers a single match.
    pub single_match: bool,
}

/// Rule rows paired with the weight each adds to `priority_score`.
pub static PLAYER_RULES: [(Rule<PlayerContext>, u32); 6] = [
    (
        Rule {
            category: Category::PhysicalPerformance,
            priority: Priority::High,
            title: "Improve Duel Success Rate",
            when: |c| c.totals.duel_win_rate() < POOR_DUELS_PCT && c.totals.duels() > MIN_DUELS,
            message: |c| {
                format!(
                    "Current duel win rate is {:.1}%. Focus on positioning and timing in 1v1 situations.",
                    c.totals.duel_win_rate()
                )
            },
            action_items: &[
                "Practice defensive positioning drills",
                "Work on timing of challenges",
                "Improve body positioning in duels",
            ],
            expected_improvement: Some("+15% duel win rate"),
        },
        3,
    ),
    (
        Rule {
            category: Category::Attacking,
            priority: Priority::Medium,
            title: "Increase Creative Passing",
            when: |c| c.totals.get(EventKind::KeyPasses) < LOW_KEY_PASSES && c.matches > 0,
            message: |c| {
                format!(
                    "Only {} key passes recorded. Focus on creating goal-scoring opportunities.",
                    c.totals.get(EventKind::KeyPasses)
                )
            },
            action_items: &[
                "Practice through balls and final third passes",
                "Work on vision and decision-making in attack",
                "Improve positioning to create chances",
                "Train with drills more focused on passing",
            ],
            expected_improvement: Some("+2 key passes per match"),
        },
        2,
    ),
    (
        Rule {
            category: Category::Attacking,
            priority: Priority::Medium,
            title: "Improve Shot Accuracy",
            when: |c| {
                c.totals.shots() > MIN_SHOTS_FOR_ACCURACY
                    && c.totals.shot_accuracy() < POOR_ACCURACY_PCT
            },
            message: |c| {
                format!(
                    "Shot accuracy is {:.1}%. Focus on shot placement and technique.",
                    c.totals.shot_accuracy()
                )
            },
            action_items: &[
                "Practice shooting drills from various angles",
                "Work on composure in front of goal",
                "Improve shot selection and placement",
                "Train finishing under pressure",
            ],
            expected_improvement: Some("+15% shot accuracy"),
        },
        1,
    ),
    (
        Rule {
            category: Category::DefensiveAwareness,
            priority: Priority::Medium,
            title: "Increase Defensive Involvement",
            when: |c| c.single_match && c.totals.defensive_actions() < LOW_DEFENSIVE_ACTIONS,
            message: |_| {
                "Low defensive actions recorded. Increase awareness and positioning.".to_string()
            },
            action_items: &[
                "Improve defensive positioning",
                "Increase interceptions and blocks",
                "Better reading of opposition play",
            ],
            expected_improvement: Some("+3 defensive actions per match"),
        },
        1,
    ),
    (
        Rule {
            category: Category::Discipline,
            priority: Priority::High,
            title: "Reduce Fouls",
            when: |c| c.totals.get(EventKind::Fouls) > MAX_FOULS,
            message: |c| {
                format!(
                    "{} fouls recorded. Focus on cleaner challenges.",
                    c.totals.get(EventKind::Fouls)
                )
            },
            action_items: &[
                "Practice timing of tackles",
                "Improve body control",
                "Better positioning to avoid late challenges",
            ],
            expected_improvement: Some("-50% fouls"),
        },
        2,
    ),
    (
        Rule {
            category: Category::Attacking,
            priority: Priority::Medium,
            title: "Increase Shot Opportunities",
            when: |c| c.totals.shots() < LOW_SHOTS && c.matches > 0,
            message: |c| {
                format!(
                    "Only {} shot(s) recorded. Look for more attacking opportunities.",
                    c.totals.shots()
                )
            },
            action_items: &[
                "Improve positioning in final third",
                "Work on movement off the ball",
                "Increase confidence in shooting",
                "Practice getting into goal-scoring positions",
            ],
            expected_improvement: Some("+2 shots per match"),
        },
        1,
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecommendations {
    pub player_id: i64,
    pub player_name: String,
    pub performance_metrics: PlayerMetrics,
    pub performance_breakdown: BTreeMap<EventKind, EventBreakdownRow>,
    /// Table order, not ranked.
    pub recommendations: Vec<Suggestion>,
    pub priority_score: u32,
    pub analysis_date: DateTime<Utc>,
}

pub fn analyze_player(
    player: &Player,
    breakdown: &PlayerBreakdown,
    single_match: bool,
    now: DateTime<Utc>,
) -> PlayerRecommendations {
    let ctx = PlayerContext {
        totals: breakdown.totals(),
        matches: breakdown.matches,
        single_match,
    };
    let mut recommendations = Vec::new();
    let mut priority_score = 0;
    for (rule, weight) in &PLAYER_RULES {
        if (rule.when)(&ctx) {
            recommendations.push(rule.render(&ctx));
            priority_score += weight;
        }
    }
    PlayerRecommendations {
        player_id: player.id,
        player_name: player.name.clone(),
        performance_metrics: PlayerMetrics::from_totals(&ctx.totals),
        performance_breakdown: breakdown.rows(),
        recommendations,
        priority_score,
        analysis_date: now,
    }
}

/// Squad-wide analysis over prefetched breakdowns; players with nothing to improve are left out.
pub fn analyze_squad(
    squad: &[(Player, PlayerBreakdown)],
    single_match: bool,
    now: DateTime<Utc>,
) -> Vec<PlayerRecommendations> {
    squad
        .par_iter()
        .map(|(player, breakdown)| analyze_player(player, breakdown, single_match, now))
        .filter(|rec| !rec.recommendations.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EventSpread;

    fn player(id: i64, name: &str) -> Player {
        Player {
            id,
            team_id: 1,
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    fn breakdown(matches: u32, events: &[(EventKind, u32)]) -> PlayerBreakdown {
        PlayerBreakdown {
            per_event: events
                .iter()
                .map(|(kind, total)| (*kind, EventSpread { total: *total, matches }))
                .collect(),
            matches,
        }
    }

    #[test]
    fn weights_add_up_per_fired_rule() {
        let b = breakdown(
            2,
            &[
                (EventKind::DuelsWon, 2),
                (EventKind::DuelsLost, 5),
                (EventKind::Fouls, 4),
            ],
        );
        let rec = analyze_player(&player(1, "Ana"), &b, false, Utc::now());
        let titles: Vec<&str> = rec.recommendations.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Improve Duel Success Rate",
                "Increase Creative Passing",
                "Reduce Fouls",
                "Increase Shot Opportunities",
            ]
        );
        assert_eq!(rec.priority_score, 3 + 2 + 2 + 1);
        assert_eq!(
            rec.recommendations[0].expected_improvement.as_deref(),
            Some("+15% duel win rate")
        );
        assert_eq!(rec.performance_metrics.discipline_score, 60.0);
    }

    #[test]
    fn defensive_involvement_only_for_single_match() {
        let b = breakdown(1, &[(EventKind::KeyPasses, 4), (EventKind::ShotsOnTarget, 3)]);
        let season = analyze_player(&player(1, "Bo"), &b, false, Utc::now());
        assert!(season.recommendations.is_empty());
        let one = analyze_player(&player(1, "Bo"), &b, true, Utc::now());
        assert_eq!(one.recommendations.len(), 1);
        assert_eq!(one.recommendations[0].title, "Increase Defensive Involvement");
        assert_eq!(one.priority_score, 1);
    }

    #[test]
    fn players_without_stats_get_no_recommendations() {
        let squad = vec![
            (player(1, "Idle"), PlayerBreakdown::default()),
            (
                player(2, "Busy"),
                breakdown(1, &[(EventKind::Fouls, 5), (EventKind::KeyPasses, 3), (EventKind::ShotsOffTarget, 2)]),
            ),
        ];
        let recs = analyze_squad(&squad, false, Utc::now());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].player_name, "Busy");
    }
}
