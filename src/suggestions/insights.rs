use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{EventTotals, PlayerBreakdown, discipline_index};
use crate::model::{EventKind, Player};

pub const BALANCED_MESSAGE: &str =
    "Balanced contribution – maintain current habits and look for marginal gains in weak areas.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInsight {
    pub player: String,
    pub total_events: u32,
    pub attacking_index: f64,
    pub defensive_index: f64,
    pub discipline_index: f64,
    pub raw_events: BTreeMap<EventKind, u32>,
    pub suggestions: Vec<String>,
}

pub fn attacking_index(totals: &EventTotals) -> f64 {
    f64::from(totals.shots()) * 2.0 + f64::from(totals.get(EventKind::KeyPasses)) * 0.5
}

pub fn defensive_index(totals: &EventTotals) -> f64 {
    f64::from(totals.get(EventKind::Interceptions)) * 1.5
        + f64::from(totals.get(EventKind::Blocks))
        + f64::from(totals.get(EventKind::DuelsWon)) * 0.8
}

fn coaching_notes(totals: &EventTotals) -> Vec<String> {
    let shots = totals.shots();
    let key_passes = totals.get(EventKind::KeyPasses);
    let won = totals.get(EventKind::DuelsWon);
    let lost = totals.get(EventKind::DuelsLost);
    let fouls = totals.get(EventKind::Fouls);
    let reads = totals.get(EventKind::Interceptions) + totals.get(EventKind::Blocks);

    let mut notes = Vec::new();
    if shots < 2 && key_passes >= 3 {
        notes.push("Good passing but low shot volume – consider encouraging more shooting opportunities.");
    }
    if key_passes < 3 && shots >= 5 {
        notes.push("Shots are being taken but key passes are low – work on creating clearer chances.");
    }
    if lost > won && won + lost >= 5 {
        notes.push("More duels are being lost than won – focus on 1v1 defending and body positioning.");
    }
    if reads < 3 && fouls >= 3 {
        notes.push("Low interceptions/blocks but many fouls – consider improving reading of the game to defend earlier.");
    }
    if fouls >= 4 {
        notes.push("Foul count is high – manage aggression and timing of challenges to avoid dangerous free kicks.");
    }
    if notes.is_empty() {
        notes.push(BALANCED_MESSAGE);
    }
    notes.into_iter().map(str::to_string).collect()
}

pub fn player_insight(player: &Player, totals: &EventTotals) -> PlayerInsight {
    PlayerInsight {
        player: player.name.clone(),
        total_events: totals.total(),
        attacking_index: attacking_index(totals),
        defensive_index: defensive_index(totals),
        discipline_index: discipline_index(totals.get(EventKind::Fouls)),
        raw_events: totals.iter().collect(),
        suggestions: coaching_notes(totals),
    }
}

/// One insight per player with any logged event, highest attacking index first.
pub fn squad_insights(squad: &[(Player, PlayerBreakdown)]) -> Vec<PlayerInsight> {
    let mut insights: Vec<PlayerInsight> = squad
        .par_iter()
        .filter(|(_, breakdown)| !breakdown.per_event.is_empty())
        .map(|(player, breakdown)| player_insight(player, &breakdown.totals()))
        .collect();
    insights.sort_by(|a, b| b.attacking_index.total_cmp(&a.attacking_index));
    insights
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn totals(events: &[(EventKind, u32)]) -> EventTotals {
        events.iter().copied().collect()
    }

    fn player(name: &str) -> Player {
        Player {
            id: 1,
            team_id: 1,
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn indices_follow_weights() {
        let t = totals(&[
            (EventKind::ShotsOnTarget, 2),
            (EventKind::ShotsOffTarget, 1),
            (EventKind::KeyPasses, 4),
            (EventKind::Interceptions, 2),
            (EventKind::Blocks, 1),
            (EventKind::DuelsWon, 5),
            (EventKind::Fouls, 3),
        ]);
        assert_eq!(attacking_index(&t), 8.0);
        assert!((defensive_index(&t) - 8.0).abs() < 1e-9);
        let insight = player_insight(&player("Ana"), &t);
        assert_eq!(insight.discipline_index, 85.0);
        assert_eq!(insight.total_events, 18);
    }

    #[test]
    fn quiet_player_gets_balanced_note() {
        let insight = player_insight(&player("Bo"), &totals(&[(EventKind::Tackles, 2)]));
        assert_eq!(insight.suggestions, vec![BALANCED_MESSAGE.to_string()]);
    }

    #[test]
    fn foul_heavy_player_gets_both_discipline_notes() {
        let insight = player_insight(&player("Cy"), &totals(&[(EventKind::Fouls, 4)]));
        assert_eq!(insight.suggestions.len(), 2);
        assert!(insight.suggestions[1].starts_with("Foul count is high"));
    }
}
