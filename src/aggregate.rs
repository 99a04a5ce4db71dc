use std::collections::{BTreeMap, HashMap};

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matches;
use crate::model::{EventKind, Match, Player};
use crate::teams;
use crate::xg::round2;

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / (part + rest) * 100`, or 0 when nothing happened.
fn percentage(part: u32, rest: u32) -> f64 {
    let total = f64::from(part) + f64::from(rest);
    if total > 0.0 {
        f64::from(part) / total * 100.0
    } else {
        0.0
    }
}

pub fn shot_accuracy(on_target: u32, off_target: u32) -> f64 {
    percentage(on_target, off_target)
}

pub fn duel_win_rate(won: u32, lost: u32) -> f64 {
    percentage(won, lost)
}

/// Squad-insight discipline: 5 points per foul, floored at 0.
pub fn discipline_index(fouls: u32) -> f64 {
    (100.0 - f64::from(fouls) * 5.0).max(0.0)
}

/// Player-recommendation discipline: 10 points per foul, 0 from ten fouls on.
pub fn discipline_score(fouls: u32) -> f64 {
    if fouls < 10 {
        100.0 - f64::from(fouls) * 10.0
    } else {
        0.0
    }
}

/// Summed counter values per event kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTotals {
    counts: BTreeMap<EventKind, u32>,
}

impl EventTotals {
    pub fn add(&mut self, kind: EventKind, count: u32) {
        *self.counts.entry(kind).or_default() += count;
    }

    pub fn get(&self, kind: EventKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn shots(&self) -> u32 {
        self.get(EventKind::ShotsOnTarget) + self.get(EventKind::ShotsOffTarget)
    }

    pub fn duels(&self) -> u32 {
        self.get(EventKind::DuelsWon) + self.get(EventKind::DuelsLost)
    }

    pub fn shot_accuracy(&self) -> f64 {
        shot_accuracy(
            self.get(EventKind::ShotsOnTarget),
            self.get(EventKind::ShotsOffTarget),
        )
    }

    pub fn duel_win_rate(&self) -> f64 {
        duel_win_rate(self.get(EventKind::DuelsWon), self.get(EventKind::DuelsLost))
    }

    pub fn interceptions_and_tackles(&self) -> u32 {
        self.get(EventKind::Interceptions) + self.get(EventKind::Tackles)
    }

    /// Interceptions, tackles, blocks and clearances.
    pub fn defensive_actions(&self) -> u32 {
        self.interceptions_and_tackles()
            + self.get(EventKind::Blocks)
            + self.get(EventKind::Clearances)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventKind, u32)> + '_ {
        self.counts.iter().map(|(kind, count)| (*kind, *count))
    }
}

impl FromIterator<(EventKind, u32)> for EventTotals {
    fn from_iter<I: IntoIterator<Item = (EventKind, u32)>>(iter: I) -> Self {
        let mut totals = EventTotals::default();
        for (kind, count) in iter {
            totals.add(kind, count);
        }
        totals
    }
}

/// Counter sums for one match.
pub fn match_totals(conn: &Connection, team_id: i64, match_id: i64) -> Result<EventTotals> {
    let mut stmt = conn.prepare(
        "SELECT event, SUM(count) FROM event_counters
         WHERE team_id = ?1 AND match_id = ?2 GROUP BY event",
    )?;
    let rows = stmt.query_map(params![team_id, match_id], |row| {
        Ok((row.get::<_, EventKind>(0)?, row.get::<_, u32>(1)?))
    })?;
    let mut totals = EventTotals::default();
    for row in rows {
        let (kind, count) = row?;
        totals.add(kind, count);
    }
    Ok(totals)
}

/// How often an event happened and across how many matches it was logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSpread {
    pub total: u32,
    pub matches: u32,
}

impl EventSpread {
    /// Averaged over the matches where the event was logged at all.
    pub fn average_per_match(&self) -> f64 {
        if self.matches > 0 {
            f64::from(self.total) / f64::from(self.matches)
        } else {
            0.0
        }
    }
}

/// Finished-match counters for a season, per event.
pub fn season_event_spread(
    conn: &Connection,
    team_id: i64,
    season: Option<&str>,
) -> Result<BTreeMap<EventKind, EventSpread>> {
    let season = season.map(str::trim).filter(|s| !s.is_empty());
    let mut stmt = conn.prepare(
        "SELECT c.event, SUM(c.count), COUNT(DISTINCT c.match_id)
         FROM event_counters c JOIN matches m ON m.id = c.match_id
         WHERE c.team_id = ?1 AND m.state = 'finished' AND (?2 IS NULL OR m.season = ?2)
         GROUP BY c.event",
    )?;
    let rows = stmt.query_map(params![team_id, season], |row| {
        Ok((
            row.get::<_, EventKind>(0)?,
            EventSpread {
                total: row.get(1)?,
                matches: row.get(2)?,
            },
        ))
    })?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (kind, spread) = row?;
        out.insert(kind, spread);
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBreakdownRow {
    pub total: u32,
    pub matches: u32,
    pub average_per_match: f64,
}

/// A player's counters folded per event, optionally limited to one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerBreakdown {
    pub per_event: BTreeMap<EventKind, EventSpread>,
    /// Distinct matches with at least one counter for the player.
    pub matches: u32,
}

impl PlayerBreakdown {
    pub fn totals(&self) -> EventTotals {
        self.per_event
            .iter()
            .map(|(kind, spread)| (*kind, spread.total))
            .collect()
    }

    pub fn rows(&self) -> BTreeMap<EventKind, EventBreakdownRow> {
        self.per_event
            .iter()
            .map(|(kind, spread)| {
                (
                    *kind,
                    EventBreakdownRow {
                        total: spread.total,
                        matches: spread.matches,
                        average_per_match: round2(spread.average_per_match()),
                    },
                )
            })
            .collect()
    }
}

/// Breakdowns for every squad player in two queries; players without counters get an empty one.
pub fn squad_breakdowns(
    conn: &Connection,
    team_id: i64,
    match_id: Option<i64>,
) -> Result<Vec<(Player, PlayerBreakdown)>> {
    let squad = teams::list_squad(conn, team_id)?;
    let mut by_player: HashMap<i64, PlayerBreakdown> = HashMap::new();

    let mut stmt = conn.prepare(
        "SELECT player_id, event, SUM(count), COUNT(DISTINCT match_id) FROM event_counters
         WHERE team_id = ?1 AND (?2 IS NULL OR match_id = ?2)
         GROUP BY player_id, event",
    )?;
    let rows = stmt.query_map(params![team_id, match_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, EventKind>(1)?,
            EventSpread {
                total: row.get(2)?,
                matches: row.get(3)?,
            },
        ))
    })?;
    for row in rows {
        let (player_id, kind, spread) = row?;
        by_player.entry(player_id).or_default().per_event.insert(kind, spread);
    }

    let mut stmt = conn.prepare(
        "SELECT player_id, COUNT(DISTINCT match_id) FROM event_counters
         WHERE team_id = ?1 AND (?2 IS NULL OR match_id = ?2)
         GROUP BY player_id",
    )?;
    let rows = stmt.query_map(params![team_id, match_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?))
    })?;
    for row in rows {
        let (player_id, matches) = row?;
        by_player.entry(player_id).or_default().matches = matches;
    }

    Ok(squad
        .into_iter()
        .map(|player| {
            let breakdown = by_player.remove(&player.id).unwrap_or_default();
            (player, breakdown)
        })
        .collect())
}

pub fn player_breakdown(
    conn: &Connection,
    team_id: i64,
    player_id: i64,
    match_id: Option<i64>,
) -> Result<(Player, PlayerBreakdown)> {
    let player = teams::get_player(conn, team_id, player_id)?;
    let mut breakdown = PlayerBreakdown::default();
    let mut stmt = conn.prepare(
        "SELECT event, SUM(count), COUNT(DISTINCT match_id) FROM event_counters
         WHERE team_id = ?1 AND player_id = ?2 AND (?3 IS NULL OR match_id = ?3)
         GROUP BY event",
    )?;
    let rows = stmt.query_map(params![team_id, player_id, match_id], |row| {
        Ok((
            row.get::<_, EventKind>(0)?,
            EventSpread {
                total: row.get(1)?,
                matches: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (kind, spread) = row?;
        breakdown.per_event.insert(kind, spread);
    }
    breakdown.matches = conn.query_row(
        "SELECT COUNT(DISTINCT match_id) FROM event_counters
         WHERE team_id = ?1 AND player_id = ?2 AND (?3 IS NULL OR match_id = ?3)",
        params![team_id, player_id, match_id],
        |row| row.get(0),
    )?;
    Ok((player, breakdown))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    pub overall_score: f64,
    pub duel_win_rate: f64,
    pub shot_accuracy: f64,
    pub defensive_actions: u32,
    pub key_passes: u32,
    pub discipline_score: f64,
    pub total_events: u32,
}

impl PlayerMetrics {
    pub fn from_totals(totals: &EventTotals) -> Self {
        let duel_win_rate = totals.duel_win_rate();
        let shot_accuracy = totals.shot_accuracy();
        let defensive_actions = totals.defensive_actions();
        let key_passes = totals.get(EventKind::KeyPasses);
        let discipline = discipline_score(totals.get(EventKind::Fouls));
        let overall = duel_win_rate * 0.3
            + shot_accuracy * 0.2
            + (f64::from(defensive_actions) * 2.0).min(30.0)
            + (f64::from(key_passes) * 5.0).min(20.0)
            + discipline * 0.1;
        PlayerMetrics {
            overall_score: round1(overall.min(100.0)),
            duel_win_rate: round1(duel_win_rate),
            shot_accuracy: round1(shot_accuracy),
            defensive_actions,
            key_passes,
            discipline_score: round1(discipline),
            total_events: totals.total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStats {
    pub scored: u32,
    pub conceded: u32,
    pub difference: i64,
    pub avg_scored: f64,
    pub avg_conceded: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XgStats {
    #[serde(rename = "for")]
    pub xg_for: f64,
    pub against: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamPerformance {
    pub season: Option<String>,
    pub match_count: u32,
    pub most_used_formation: Option<String>,
    pub goals: GoalStats,
    pub xg: XgStats,
    pub record: Record,
}

/// Most frequent formation; ties go to the alphabetically first.
pub fn most_used_formation<'a>(formations: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for formation in formations {
        *counts.entry(formation).or_default() += 1;
    }
    let mut best: Option<(&str, u32)> = None;
    for (formation, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((formation, count));
        }
    }
    best.map(|(formation, _)| formation.to_string())
}

pub fn record_of(matches: &[Match]) -> Record {
    let mut record = Record::default();
    for m in matches {
        match m.goals_scored.cmp(&m.goals_conceded) {
            std::cmp::Ordering::Greater => record.wins += 1,
            std::cmp::Ordering::Equal => record.draws += 1,
            std::cmp::Ordering::Less => record.losses += 1,
        }
    }
    record.points = record.wins * 3 + record.draws;
    record
}

/// Summary over every match of the season, whatever its state.
pub fn summarize_matches(season: Option<&str>, matches: &[Match]) -> TeamPerformance {
    let count = u32::try_from(matches.len()).unwrap_or(u32::MAX);
    let scored: u32 = matches.iter().map(|m| m.goals_scored).sum();
    let conceded: u32 = matches.iter().map(|m| m.goals_conceded).sum();
    let xg_for: f64 = matches.iter().map(|m| m.xg).sum();
    let xg_against: f64 = matches.iter().map(|m| m.xg_against).sum();
    let per_match = |total: f64| if count > 0 { round2(total / f64::from(count)) } else { 0.0 };

    TeamPerformance {
        season: season.map(str::to_string),
        match_count: count,
        most_used_formation: most_used_formation(
            matches.iter().filter_map(|m| m.formation.as_deref()),
        ),
        goals: GoalStats {
            scored,
            conceded,
            difference: i64::from(scored) - i64::from(conceded),
            avg_scored: per_match(f64::from(scored)),
            avg_conceded: per_match(f64::from(conceded)),
        },
        xg: XgStats {
            xg_for: round2(xg_for),
            against: round2(xg_against),
            difference: round2(xg_for - xg_against),
        },
        record: record_of(matches),
    }
}

pub fn team_performance(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<TeamPerformance> {
    let season = season.map(str::trim).filter(|s| !s.is_empty());
    let all = matches::list_matches(conn, team_id, season)?;
    Ok(summarize_matches(season, &all))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_are_zero_without_attempts() {
        assert_eq!(shot_accuracy(0, 0), 0.0);
        assert_eq!(duel_win_rate(0, 0), 0.0);
        assert_eq!(shot_accuracy(3, 1), 75.0);
        assert!((duel_win_rate(1, 2) - 33.333).abs() < 0.01);
    }

    #[test]
    fn discipline_metrics_differ() {
        assert_eq!(discipline_index(0), 100.0);
        assert_eq!(discipline_index(4), 80.0);
        assert_eq!(discipline_index(30), 0.0);
        assert_eq!(discipline_score(4), 60.0);
        assert_eq!(discipline_score(9), 10.0);
        assert_eq!(discipline_score(10), 0.0);
    }

    #[test]
    fn totals_group_defensive_actions() {
        let totals: EventTotals = [
            (EventKind::Interceptions, 2),
            (EventKind::Tackles, 3),
            (EventKind::Blocks, 1),
            (EventKind::Clearances, 4),
            (EventKind::Tackles, 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(totals.interceptions_and_tackles(), 6);
        assert_eq!(totals.defensive_actions(), 11);
        assert_eq!(totals.total(), 11);
        assert_eq!(totals.shots(), 0);
    }

    #[test]
    fn overall_score_caps_components() {
        let totals: EventTotals = [
            (EventKind::DuelsWon, 8),
            (EventKind::DuelsLost, 2),
            (EventKind::ShotsOnTarget, 1),
            (EventKind::ShotsOffTarget, 1),
            (EventKind::Interceptions, 20),
            (EventKind::KeyPasses, 10),
            (EventKind::Fouls, 2),
        ]
        .into_iter()
        .collect();
        let metrics = PlayerMetrics::from_totals(&totals);
        // 80*0.3 + 50*0.2 + 30 + 20 + 80*0.1
        assert!((metrics.overall_score - 92.0).abs() < 1e-9);
        assert_eq!(metrics.discipline_score, 80.0);
        assert_eq!(metrics.total_events, 44);
    }

    #[test]
    fn formation_ties_break_alphabetically() {
        assert_eq!(
            most_used_formation(["4-4-2", "4-3-3", "4-4-2", "4-3-3"]).as_deref(),
            Some("4-3-3")
        );
        assert_eq!(most_used_formation(["3-5-2"]).as_deref(), Some("3-5-2"));
        assert_eq!(most_used_formation(std::iter::empty()), None);
    }
}
