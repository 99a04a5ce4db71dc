//! Rule-table suggestion engine.
//!
//! Each table is a list of [`Rule`]s over a context type. Every rule is
//! checked on its own; the hits are then ranked by priority (stable, so
//! table order breaks ties) and cut to the table's limit.

pub mod insights;
pub mod live;
pub mod player;
pub mod post_match;
pub mod team;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Tactical,
    Attacking,
    Defending,
    Defensive,
    Physical,
    Discipline,
    #[serde(rename = "Physical Performance")]
    PhysicalPerformance,
    #[serde(rename = "Defensive Awareness")]
    DefensiveAwareness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub action_items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_improvement: Option<String>,
}

/// One row of a rule table. `message` is only rendered when `when` holds.
pub struct Rule<C> {
    pub category: Category,
    pub priority: Priority,
    pub title: &'static str,
    pub when: fn(&C) -> bool,
    pub message: fn(&C) -> String,
    pub action_items: &'static [&'static str],
    pub expected_improvement: Option<&'static str>,
}

impl<C> Rule<C> {
    fn render(&self, ctx: &C) -> Suggestion {
        Suggestion {
            category: self.category,
            priority: self.priority,
            title: self.title.to_string(),
            message: (self.message)(ctx),
            action_items: self.action_items.iter().map(|item| item.to_string()).collect(),
            expected_improvement: self.expected_improvement.map(str::to_string),
        }
    }
}

/// Every matching rule, in table order.
pub fn evaluate<C>(rules: &[Rule<C>], ctx: &C) -> Vec<Suggestion> {
    rules
        .iter()
        .filter(|rule| (rule.when)(ctx))
        .map(|rule| rule.render(ctx))
        .collect()
}

/// Highest priority first, ties kept in input order, then truncated.
pub fn rank(mut suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    suggestions.sort_by_key(|s| std::cmp::Reverse(s.priority.weight()));
    suggestions.truncate(limit);
    suggestions
}
