use serde::{Deserialize, Serialize};

use super::{Category, Priority, Rule, Suggestion, evaluate, rank};
use crate::aggregate::EventTotals;
use crate::model::{EventKind, Match};

pub const POST_MATCH_LIMIT: usize = 10;

pub const LOW_XG: f64 = 1.0;
pub const HIGH_XG_AGAINST: f64 = 2.0;
pub const POOR_ACCURACY_PCT: f64 = 40.0;
pub const LOW_KEY_PASSES: u32 = 3;
pub const POOR_DUELS_PCT: f64 = 45.0;
pub const PASSIVE_DEFENSIVE_ACTIONS: u32 = 15;
pub const MAX_FOULS: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct PostMatchContext {
    pub goals_for: u32,
    pub goals_against: u32,
    pub xg: f64,
    pub xg_against: f64,
    pub totals: EventTotals,
}

impl PostMatchContext {
    pub fn new(m: &Match, totals: EventTotals) -> Self {
        PostMatchContext {
            goals_for: m.goals_scored,
            goals_against: m.goals_conceded,
            xg: m.xg,
            xg_against: m.xg_against,
            totals,
        }
    }
}

pub static POST_MATCH_RULES: [Rule<PostMatchContext>; 9] = [
    Rule {
        category: Category::Tactical,
        priority: Priority::High,
        title: "Match Result Analysis",
        when: |c| c.goals_for < c.goals_against,
        message: |c| {
            format!(
                "Lost {}-{}. Analyze what went wrong and adjust for next match.",
                c.goals_for, c.goals_against
            )
        },
        action_items: &[
            "Review defensive positioning and organization",
            "Analyze where goals were conceded",
            "Consider formation changes for similar opponents",
            "Work on maintaining possession better",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Tactical,
        priority: Priority::Medium,
        title: "Draw Analysis",
        when: |c| c.goals_for == c.goals_against,
        message: |c| {
            format!(
                "Drew {}-{}. Could have won with better finishing or defense.",
                c.goals_for, c.goals_against
            )
        },
        action_items: &[
            "Focus on converting chances in training",
            "Work on defensive concentration",
            "Practice set pieces (both attacking and defending)",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::High,
        title: "Low Chance Creation",
        when: |c| c.xg < LOW_XG,
        message: |c| format!("xG of {:.2} indicates few high-quality chances created.", c.xg),
        action_items: &[
            "Work on creating more goal-scoring opportunities",
            "Practice attacking patterns and combinations",
            "Keep forward players higher up the pitch",
            "Focus on key passes and through balls",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Defending,
        priority: Priority::High,
        title: "Too Many Chances Conceded",
        when: |c| c.xg_against > HIGH_XG_AGAINST,
        message: |c| {
            format!(
                "Opposition xG of {:.2} shows they created many good chances.",
                c.xg_against
            )
        },
        action_items: &[
            "Improve defensive organization and shape",
            "Work on pressing and closing down space",
            "Practice blocking shots and intercepting passes",
            "Better communication between defenders",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::Medium,
        title: "Poor Shot Accuracy",
        when: |c| c.totals.shots() > 0 && c.totals.shot_accuracy() < POOR_ACCURACY_PCT,
        message: |c| format!("Only {:.1}% of shots were on target.", c.totals.shot_accuracy()),
        action_items: &[
            "Practice shooting drills focusing on accuracy",
            "Work on composure in front of goal",
            "Improve shot selection and placement",
            "Train finishing under pressure",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::Medium,
        title: "Low Creative Passing",
        when: |c| c.totals.get(EventKind::KeyPasses) < LOW_KEY_PASSES,
        message: |c| {
            format!(
                "Only {} key passes recorded. Need more creativity in attack.",
                c.totals.get(EventKind::KeyPasses)
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
        title: "Poor Duel Performance",
        when: |c| c.totals.duels() > 0 && c.totals.duel_win_rate() < POOR_DUELS_PCT,
        message: |c| format!("Team won only {:.1}% of duels.", c.totals.duel_win_rate()),
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
        title: "Passive Defending",
        when: |c| c.totals.defensive_actions() < PASSIVE_DEFENSIVE_ACTIONS,
        message: |c| {
            format!(
                "Only {} defensive actions recorded. Team was too passive.",
                c.totals.defensive_actions()
            )
        },
        action_items: &[
            "Practice aggressive defending and pressing",
            "Work on reading the game and intercepting",
            "Train players to be more proactive in defense",
            "Improve anticipation and positioning",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Discipline,
        priority: Priority::Medium,
        title: "Too Many Fouls",
        when: |c| c.totals.get(EventKind::Fouls) > MAX_FOULS,
        message: |c| {
            format!(
                "{} fouls committed. Discipline needs improvement.",
                c.totals.get(EventKind::Fouls)
            )
        },
        action_items: &[
            "Practice timing of tackles",
            "Improve body control",
            "Better positioning to avoid late challenges",
            "Work on cleaner defensive techniques",
        ],
        expected_improvement: None,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMatchReport {
    pub match_id: i64,
    pub suggestions: Vec<Suggestion>,
}

/// Available for any match state; the rules read whatever has been logged so far.
pub fn post_match_report(m: &Match, totals: EventTotals) -> PostMatchReport {
    let ctx = PostMatchContext::new(m, totals);
    PostMatchReport {
        match_id: m.id,
        suggestions: rank(evaluate(&POST_MATCH_RULES, &ctx), POST_MATCH_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(goals_for: u32, goals_against: u32, xg: f64, xg_against: f64, totals: &[(EventKind, u32)]) -> PostMatchContext {
        PostMatchContext {
            goals_for,
            goals_against,
            xg,
            xg_against,
            totals: totals.iter().copied().collect(),
        }
    }

    fn titles(ctx: &PostMatchContext) -> Vec<String> {
        rank(evaluate(&POST_MATCH_RULES, ctx), POST_MATCH_LIMIT)
            .into_iter()
            .map(|s| s.title)
            .collect()
    }

    #[test]
    fn quiet_heavy_defeat_triggers_everything_but_draw() {
        let c = ctx(
            0,
            3,
            0.4,
            2.6,
            &[
                (EventKind::ShotsOnTarget, 1),
                (EventKind::ShotsOffTarget, 4),
                (EventKind::DuelsWon, 2),
                (EventKind::DuelsLost, 8),
                (EventKind::Fouls, 9),
            ],
        );
        assert_eq!(
            titles(&c),
            [
                "Match Result Analysis",
                "Low Chance Creation",
                "Too Many Chances Conceded",
                "Poor Shot Accuracy",
                "Low Creative Passing",
                "Poor Duel Performance",
                "Passive Defending",
                "Too Many Fouls",
            ]
        );
    }

    #[test]
    fn solid_win_triggers_nothing() {
        let c = ctx(
            2,
            0,
            1.8,
            0.6,
            &[
                (EventKind::ShotsOnTarget, 6),
                (EventKind::ShotsOffTarget, 3),
                (EventKind::KeyPasses, 7),
                (EventKind::DuelsWon, 12),
                (EventKind::DuelsLost, 8),
                (EventKind::Interceptions, 9),
                (EventKind::Tackles, 6),
                (EventKind::Fouls, 8),
            ],
        );
        assert!(titles(&c).is_empty());
    }

    #[test]
    fn draw_is_medium_and_zero_shots_skip_accuracy() {
        let c = ctx(1, 1, 1.2, 0.5, &[(EventKind::KeyPasses, 3), (EventKind::Clearances, 15)]);
        let ranked = rank(evaluate(&POST_MATCH_RULES, &c), POST_MATCH_LIMIT);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].title, "Draw Analysis");
        assert_eq!(ranked[0].priority, Priority::Medium);
        assert_eq!(ranked[0].message, "Drew 1-1. Could have won with better finishing or defense.");
    }
}
