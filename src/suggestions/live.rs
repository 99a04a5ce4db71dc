use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, Priority, Rule, Suggestion, evaluate, rank};
use crate::aggregate::EventTotals;
use crate::model::{EventKind, Match, MatchState};
use crate::timer::{self, TimerSnapshot};

pub const LIVE_LIMIT: usize = 8;
pub const NOT_LIVE_MESSAGE: &str = "Match is not live.";

pub const TRAILING_PLENTY_OF_TIME_SECS: i64 = 30 * 60;
pub const LEVEL_LATE_SECS: i64 = 15 * 60;
pub const LEADING_LATE_SECS: i64 = 20 * 60;
pub const MIN_SHOTS_FOR_ACCURACY: u32 = 5;
pub const POOR_ACCURACY_PCT: f64 = 35.0;
pub const LOW_KEY_PASSES: u32 = 3;
pub const CREATIVITY_CHECK_AFTER_SECS: u32 = 30 * 60;
pub const MIN_DUELS: u32 = 10;
pub const LOSING_DUELS_PCT: f64 = 40.0;
pub const DEFENDING_CHECK_AFTER_SECS: u32 = 20 * 60;
pub const PASSIVE_DEFENSIVE_ACTIONS: u32 = 10;

/// Snapshot of a running match the live rules read.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveContext {
    pub score_diff: i64,
    pub elapsed: u32,
    /// Regulation seconds left; negative in stoppage time.
    pub remaining: i64,
    pub totals: EventTotals,
    pub opponent_formation: Option<String>,
}

impl LiveContext {
    pub fn new(m: &Match, totals: EventTotals, elapsed: u32, match_seconds: u32) -> Self {
        LiveContext {
            score_diff: m.score_diff(),
            elapsed,
            remaining: i64::from(match_seconds) - i64::from(elapsed),
            totals,
            opponent_formation: m.opponent_formation.clone().filter(|f| !f.trim().is_empty()),
        }
    }
}

pub static LIVE_RULES: [Rule<LiveContext>; 9] = [
    Rule {
        category: Category::Tactical,
        priority: Priority::High,
        title: "Trailing - Increase Pressure",
        when: |c| c.score_diff < 0 && c.remaining > TRAILING_PLENTY_OF_TIME_SECS,
        message: |c| {
            format!(
                "Down {} goal(s). Push forward and increase attacking intensity.",
                c.score_diff.abs()
            )
        },
        action_items: &[
            "Push fullbacks higher to support attacks",
            "Increase pressing in opposition half",
            "Take more risks in final third",
            "Look for quick counter-attacks",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Tactical,
        priority: Priority::High,
        title: "Urgent - All Out Attack",
        when: |c| c.score_diff < 0 && c.remaining <= TRAILING_PLENTY_OF_TIME_SECS,
        message: |c| {
            format!(
                "Down {} goal(s) with limited time. Need immediate response.",
                c.score_diff.abs()
            )
        },
        action_items: &[
            "Commit more players forward",
            "Take long shots if space opens",
            "Use width to stretch defense",
            "Quick restarts and throw-ins",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Tactical,
        priority: Priority::Medium,
        title: "Level - Push for Winner",
        when: |c| c.score_diff == 0 && c.remaining < LEVEL_LATE_SECS,
        message: |_| "Score is level with time running out. Push for winning goal.".to_string(),
        action_items: &[
            "Maintain attacking threat",
            "Keep defensive discipline",
            "Look for set-piece opportunities",
            "Fresh legs in attacking positions",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Tactical,
        priority: Priority::Medium,
        title: "Leading - Manage Game",
        when: |c| c.score_diff > 0 && c.remaining < LEADING_LATE_SECS,
        message: |c| format!("Up {} goal(s). Control tempo and see out the match.", c.score_diff),
        action_items: &[
            "Keep possession and slow tempo",
            "Stay compact defensively",
            "Avoid unnecessary risks",
            "Waste time intelligently on restarts",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::Medium,
        title: "Poor Shot Accuracy",
        when: |c| {
            c.totals.shots() >= MIN_SHOTS_FOR_ACCURACY && c.totals.shot_accuracy() < POOR_ACCURACY_PCT
        },
        message: |c| {
            format!(
                "Only {:.0}% shots on target. Need better finishing.",
                c.totals.shot_accuracy()
            )
        },
        action_items: &[
            "Work ball into better positions",
            "Take time to compose before shooting",
            "Aim for corners of goal",
            "Practice composure in training",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Attacking,
        priority: Priority::Medium,
        title: "Low Creativity",
        when: |c| {
            c.totals.get(EventKind::KeyPasses) < LOW_KEY_PASSES
                && c.elapsed > CREATIVITY_CHECK_AFTER_SECS
        },
        message: |c| {
            format!(
                "Only {} key passes. Need more creative play.",
                c.totals.get(EventKind::KeyPasses)
            )
        },
        action_items: &[
            "Encourage through balls",
            "Use width to create space",
            "Quick combinations in final third",
            "Take risks with final passes",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Physical,
        priority: Priority::Medium,
        title: "Losing Physical Battles",
        when: |c| c.totals.duels() > MIN_DUELS && c.totals.duel_win_rate() < LOSING_DUELS_PCT,
        message: |c| {
            format!(
                "Only winning {:.0}% of duels. Need more intensity.",
                c.totals.duel_win_rate()
            )
        },
        action_items: &[
            "Increase physical commitment",
            "Better body positioning in challenges",
            "Win second balls",
            "Match opponent's intensity",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Defensive,
        priority: Priority::Medium,
        title: "Passive Defending",
        when: |c| {
            c.elapsed > DEFENDING_CHECK_AFTER_SECS
                && c.totals.interceptions_and_tackles() < PASSIVE_DEFENSIVE_ACTIONS
        },
        message: |c| {
            format!(
                "Only {} defensive actions. Need to be more proactive.",
                c.totals.interceptions_and_tackles()
            )
        },
        action_items: &[
            "Step up and intercept passes",
            "Close down space quicker",
            "Win the ball back higher up pitch",
            "Increase defensive intensity",
        ],
        expected_improvement: None,
    },
    Rule {
        category: Category::Tactical,
        priority: Priority::Low,
        title: "Opponent Formation",
        when: |c| c.opponent_formation.is_some(),
        message: |c| {
            format!(
                "Opponent playing {}. Adjust accordingly.",
                c.opponent_formation.as_deref().unwrap_or_default()
            )
        },
        action_items: &[
            "Exploit spaces in their formation",
            "Match their shape if needed",
            "Target weak areas",
            "Adjust our formation if struggling",
        ],
        expected_improvement: None,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReport {
    pub match_id: i64,
    pub match_state: MatchState,
    pub elapsed_seconds: u32,
    pub score: String,
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Ranked live suggestions; a match that is not ongoing gets none plus an explanation.
pub fn live_report(
    m: &Match,
    totals: EventTotals,
    match_seconds: u32,
    now: DateTime<Utc>,
) -> LiveReport {
    let elapsed = timer::live_elapsed(&TimerSnapshot::from(m), now);
    let (suggestions, message) = if m.state.is_ongoing() {
        let ctx = LiveContext::new(m, totals, elapsed, match_seconds);
        (rank(evaluate(&LIVE_RULES, &ctx), LIVE_LIMIT), None)
    } else {
        (Vec::new(), Some(NOT_LIVE_MESSAGE.to_string()))
    };
    LiveReport {
        match_id: m.id,
        match_state: m.state,
        elapsed_seconds: elapsed,
        score: m.score_line(),
        suggestions,
        message,
    }
}
