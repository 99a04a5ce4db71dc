use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::StatoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ShotsOnTarget,
    ShotsOffTarget,
    KeyPasses,
    DuelsWon,
    DuelsLost,
    Fouls,
    Interceptions,
    Blocks,
    Tackles,
    Clearances,
}

static EVENT_KINDS_BY_NAME: Lazy<HashMap<&'static str, EventKind>> =
    Lazy::new(|| EventKind::ALL.iter().map(|kind| (kind.as_str(), *kind)).collect());

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ShotsOnTarget,
        EventKind::ShotsOffTarget,
        EventKind::KeyPasses,
        EventKind::DuelsWon,
        EventKind::DuelsLost,
        EventKind::Fouls,
        EventKind::Interceptions,
        EventKind::Blocks,
        EventKind::Tackles,
        EventKind::Clearances,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ShotsOnTarget => "shots_on_target",
            EventKind::ShotsOffTarget => "shots_off_target",
            EventKind::KeyPasses => "key_passes",
            EventKind::DuelsWon => "duels_won",
            EventKind::DuelsLost => "duels_lost",
            EventKind::Fouls => "fouls",
            EventKind::Interceptions => "interceptions",
            EventKind::Blocks => "blocks",
            EventKind::Tackles => "tackles",
            EventKind::Clearances => "clearances",
        }
    }

    /// Events counted as a won action when classifying pitch zones.
    pub fn is_zone_success(self) -> bool {
        matches!(
            self,
            EventKind::DuelsWon
                | EventKind::Interceptions
                | EventKind::Blocks
                | EventKind::Tackles
                | EventKind::Clearances
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = StatoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        EVENT_KINDS_BY_NAME
            .get(raw)
            .copied()
            .ok_or_else(|| StatoError::validation("Invalid event."))
    }
}

/// One of the six coarse pitch buckets. Zones 1-3 are the attacking third side of the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zone(u8);

impl Zone {
    /// Recognises the exact tokens "1".."6"; anything else is an unzoned event.
    pub fn parse(raw: &str) -> Option<Zone> {
        match raw {
            "1" => Some(Zone(1)),
            "2" => Some(Zone(2)),
            "3" => Some(Zone(3)),
            "4" => Some(Zone(4)),
            "5" => Some(Zone(5)),
            "6" => Some(Zone(6)),
            _ => None,
        }
    }

    pub fn is_attacking(self) -> bool {
        self.0 <= 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    NotStarted,
    InProgress,
    Paused,
    Finished,
}

impl MatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchState::NotStarted => "not_started",
            MatchState::InProgress => "in_progress",
            MatchState::Paused => "paused",
            MatchState::Finished => "finished",
        }
    }

    /// Kicked off and not yet finished (running or paused).
    pub fn is_ongoing(self) -> bool {
        matches!(self, MatchState::InProgress | MatchState::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MatchState::Finished)
    }
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchState {
    type Err = StatoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "not_started" => Ok(MatchState::NotStarted),
            // Half-based rows from older databases collapse into the single live state.
            "in_progress" | "first_half" | "second_half" => Ok(MatchState::InProgress),
            "paused" => Ok(MatchState::Paused),
            "finished" => Ok(MatchState::Finished),
            other => Err(StatoError::validation(format!("Unknown match state: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
    Finish,
}

impl TimerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Resume => "resume",
            TimerAction::Finish => "finish",
        }
    }
}

impl FromStr for TimerAction {
    type Err = StatoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "start" => Ok(TimerAction::Start),
            "pause" => Ok(TimerAction::Pause),
            "resume" => Ok(TimerAction::Resume),
            "finish" => Ok(TimerAction::Finish),
            _ => Err(StatoError::validation(
                "Invalid action. Use start, pause, resume, or finish.",
            )),
        }
    }
}

pub const FORMATIONS: [&str; 8] = [
    "4-4-2", "4-3-3", "3-5-2", "4-2-3-1", "3-4-3", "5-3-2", "4-1-4-1", "other",
];

/// Blank means "not set"; anything else must be a known formation.
pub fn normalize_formation(raw: Option<&str>) -> Result<Option<String>, StatoError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if FORMATIONS.contains(&value) {
        Ok(Some(value.to_string()))
    } else {
        Err(StatoError::validation(format!(
            "Unknown formation: {value}. Use one of {}.",
            FORMATIONS.join(", ")
        )))
    }
}

/// Seasons are written `YYYY/YY`, e.g. `2024/25`. Blank means "not set".
pub fn normalize_season(raw: Option<&str>) -> Result<Option<String>, StatoError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[4] == b'/'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit);
    if well_formed {
        Ok(Some(value.to_string()))
    } else {
        Err(StatoError::validation("season must use the format YYYY/YY (e.g. 2024/25)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    Player,
    Unassigned,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Player => "player",
            Role::Unassigned => "unassigned",
        }
    }

    /// Stored tokens outside the known set never grant permissions.
    pub fn from_stored(raw: &str) -> Role {
        match raw {
            // Analysts were merged into managers.
            "manager" | "analyst" => Role::Manager,
            "player" => Role::Player,
            _ => Role::Unassigned,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub club_name: String,
    pub team_name: String,
    pub team_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub team_id: i64,
    pub opponent: String,
    pub kickoff_at: DateTime<Utc>,
    pub analyst_name: String,
    pub created_by: Option<i64>,
    pub state: MatchState,
    pub elapsed_seconds: u32,
    // Set only while the clock runs; elapsed_seconds holds the time banked before it.
    pub timer_started_at: Option<DateTime<Utc>>,
    pub formation: Option<String>,
    pub opponent_formation: Option<String>,
    pub season: Option<String>,
    pub is_home: bool,
    pub goals_scored: u32,
    pub goals_conceded: u32,
    pub xg: f64,
    pub xg_against: f64,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn score_diff(&self) -> i64 {
        i64::from(self.goals_scored) - i64::from(self.goals_conceded)
    }

    pub fn score_line(&self) -> String {
        format!("{}-{}", self.goals_scored, self.goals_conceded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCounter {
    pub id: i64,
    pub team_id: i64,
    pub match_id: i64,
    pub player_id: i64,
    pub player: String,
    pub event: EventKind,
    pub count: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInstance {
    pub id: i64,
    pub team_id: i64,
    pub match_id: i64,
    pub player_id: i64,
    pub player: String,
    pub event: EventKind,
    pub second: Option<u32>,
    pub zone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub team_id: i64,
    pub match_id: Option<i64>,
    pub sender_id: i64,
    pub sender: String,
    pub sender_role: Role,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Strength,
    Weakness,
}

impl ZoneType {
    pub fn as_str(self) -> &'static str {
        match self {
            ZoneType::Strength => "strength",
            ZoneType::Weakness => "weakness",
        }
    }
}

impl FromStr for ZoneType {
    type Err = StatoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "strength" => Ok(ZoneType::Strength),
            "weakness" => Ok(ZoneType::Weakness),
            _ => Err(StatoError::validation(
                "zone and zone_type (strength/weakness) are required.",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneAnalysis {
    pub id: i64,
    pub team_id: i64,
    pub season: Option<String>,
    pub zone: String,
    pub zone_type: ZoneType,
    pub events_in_zone: u32,
    pub successful_events: u32,
    pub failed_events: u32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub match_id: i64,
    pub blob_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<u32>,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_round_trips_wire_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("goals".parse::<EventKind>().is_err());
        assert!("Shots_On_Target".parse::<EventKind>().is_err());
    }

    #[test]
    fn zone_parse_is_exact() {
        assert_eq!(Zone::parse("1"), Some(Zone(1)));
        assert!(Zone::parse("3").unwrap().is_attacking());
        assert!(!Zone::parse("4").unwrap().is_attacking());
        assert!(Zone::parse("9").is_none());
        assert!(Zone::parse(" 1").is_none());
        assert!(Zone::parse("").is_none());
    }

    #[test]
    fn legacy_half_states_are_live() {
        assert_eq!("first_half".parse::<MatchState>().unwrap(), MatchState::InProgress);
        assert_eq!("second_half".parse::<MatchState>().unwrap(), MatchState::InProgress);
        assert!("halftime".parse::<MatchState>().is_err());
    }

    #[test]
    fn unknown_roles_are_unassigned() {
        assert_eq!(Role::from_stored("analyst"), Role::Manager);
        assert_eq!(Role::from_stored("Manager"), Role::Unassigned);
        assert_eq!(Role::from_stored("admin"), Role::Unassigned);
    }

    #[test]
    fn season_and_formation_validation() {
        assert_eq!(normalize_season(Some(" 2024/25 ")).unwrap().as_deref(), Some("2024/25"));
        assert_eq!(normalize_season(Some("")).unwrap(), None);
        assert!(normalize_season(Some("2024-25")).is_err());
        assert_eq!(normalize_formation(Some("4-3-3")).unwrap().as_deref(), Some("4-3-3"));
        assert_eq!(normalize_formation(None).unwrap(), None);
        assert!(normalize_formation(Some("2-3-5")).is_err());
    }
}
