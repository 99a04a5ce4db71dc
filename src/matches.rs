use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatoError};
use crate::model::{Match, MatchState, normalize_formation, normalize_season};

/// Input for a new fixture. Blank optional fields mean "not set".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMatch {
    pub opponent: String,
    pub kickoff_at: Option<String>,
    pub analyst_name: String,
    pub formation: Option<String>,
    pub opponent_formation: Option<String>,
    pub season: Option<String>,
    pub is_home: Option<bool>,
    pub goals_scored: Option<i64>,
    pub goals_conceded: Option<i64>,
}

const MATCH_COLUMNS: &str = "id, team_id, opponent, kickoff_at, analyst_name, created_by, state, \
     elapsed_seconds, timer_started_at, formation, opponent_formation, season, is_home, \
     goals_scored, goals_conceded, xg, xg_against, created_at";

// Legacy half-based tokens still count as ongoing.
const ONGOING_STATES: &str = "('in_progress', 'paused', 'first_half', 'second_half')";

pub(crate) fn match_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Match> {
    Ok(Match {
        id: row.get(0)?,
        team_id: row.get(1)?,
        opponent: row.get(2)?,
        kickoff_at: row.get(3)?,
        analyst_name: row.get(4)?,
        created_by: row.get(5)?,
        state: row.get(6)?,
        elapsed_seconds: row.get(7)?,
        timer_started_at: row.get(8)?,
        formation: row.get(9)?,
        opponent_formation: row.get(10)?,
        season: row.get(11)?,
        is_home: row.get(12)?,
        goals_scored: row.get(13)?,
        goals_conceded: row.get(14)?,
        xg: row.get(15)?,
        xg_against: row.get(16)?,
        created_at: row.get(17)?,
    })
}

/// ISO 8601 with or without an offset; naive times are read as UTC. Blank means `now`.
pub fn parse_kickoff(raw: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(now);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| StatoError::validation("kickoff_at must be ISO datetime"))
}

pub(crate) fn non_negative(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StatoError::validation(format!("{field} must be a non-negative integer.")))
}

pub fn create_match(
    conn: &Connection,
    team_id: i64,
    created_by: Option<i64>,
    input: &NewMatch,
    now: DateTime<Utc>,
) -> Result<Match> {
    let opponent = input.opponent.trim();
    let analyst_name = input.analyst_name.trim();
    if opponent.is_empty() || analyst_name.is_empty() {
        return Err(StatoError::validation("opponent and analyst_name are required"));
    }
    let kickoff_at = parse_kickoff(input.kickoff_at.as_deref(), now)?;
    let formation = normalize_formation(input.formation.as_deref())?;
    let opponent_formation = normalize_formation(input.opponent_formation.as_deref())?;
    let season = normalize_season(input.season.as_deref())?;
    let goals_scored = non_negative(input.goals_scored.unwrap_or(0), "goals_scored")?;
    let goals_conceded = non_negative(input.goals_conceded.unwrap_or(0), "goals_conceded")?;

    conn.execute(
        "INSERT INTO matches (team_id, opponent, kickoff_at, analyst_name, created_by, state,
             elapsed_seconds, formation, opponent_formation, season, is_home,
             goals_scored, goals_conceded, xg, xg_against, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11, ?12, 0, 0, ?13)",
        params![
            team_id,
            opponent,
            kickoff_at,
            analyst_name,
            created_by,
            MatchState::NotStarted,
            formation,
            opponent_formation,
            season,
            input.is_home.unwrap_or(true),
            goals_scored,
            goals_conceded,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(team_id, match_id = id, opponent, "created match");
    get_match(conn, team_id, id)
}

/// Scoped lookup: a match owned by another team is reported as missing.
pub fn get_match(conn: &Connection, team_id: i64, match_id: i64) -> Result<Match> {
    conn.query_row(
        &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1 AND team_id = ?2"),
        params![match_id, team_id],
        match_from_row,
    )
    .optional()?
    .ok_or(StatoError::NotFound("Match"))
}

fn collect(stmt: &mut rusqlite::Statement<'_>, args: impl rusqlite::Params) -> Result<Vec<Match>> {
    let rows = stmt.query_map(args, match_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Newest kickoff first.
pub fn list_matches(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<Vec<Match>> {
    match season.map(str::trim).filter(|s| !s.is_empty()) {
        Some(season) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE team_id = ?1 AND season = ?2
                 ORDER BY kickoff_at DESC, id DESC"
            ))?;
            collect(&mut stmt, params![team_id, season])
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE team_id = ?1
                 ORDER BY kickoff_at DESC, id DESC"
            ))?;
            collect(&mut stmt, params![team_id])
        }
    }
}

pub fn finished_matches(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<Vec<Match>> {
    Ok(list_matches(conn, team_id, season)?
        .into_iter()
        .filter(|m| m.state.is_terminal())
        .collect())
}

/// The most recently created match that has kicked off and not finished.
pub fn current_live(conn: &Connection, team_id: i64) -> Result<Option<Match>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE team_id = ?1 AND state IN {ONGOING_STATES}
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ),
            params![team_id],
            match_from_row,
        )
        .optional()?)
}

/// Only the supplied sides change.
pub fn update_goals(
    conn: &Connection,
    team_id: i64,
    match_id: i64,
    goals_scored: Option<i64>,
    goals_conceded: Option<i64>,
) -> Result<Match> {
    let current = get_match(conn, team_id, match_id)?;
    let scored = match goals_scored {
        Some(v) => non_negative(v, "goals_scored")?,
        None => current.goals_scored,
    };
    let conceded = match goals_conceded {
        Some(v) => non_negative(v, "goals_conceded")?,
        None => current.goals_conceded,
    };
    conn.execute(
        "UPDATE matches SET goals_scored = ?2, goals_conceded = ?3 WHERE id = ?1",
        params![match_id, scored, conceded],
    )?;
    get_match(conn, team_id, match_id)
}

pub fn save_timer(
    conn: &Connection,
    match_id: i64,
    state: MatchState,
    elapsed_seconds: u32,
    timer_started_at: Option<DateTime<Utc>>,
) -> Result<()> {
    conn.execute(
        "UPDATE matches SET state = ?2, elapsed_seconds = ?3, timer_started_at = ?4 WHERE id = ?1",
        params![match_id, state, elapsed_seconds, timer_started_at],
    )?;
    Ok(())
}

pub fn set_xg(conn: &Connection, match_id: i64, xg: f64) -> Result<()> {
    conn.execute(
        "UPDATE matches SET xg = ?2 WHERE id = ?1",
        params![match_id, xg],
    )?;
    Ok(())
}

pub fn set_xg_against(conn: &Connection, team_id: i64, match_id: i64, xg_against: f64) -> Result<Match> {
    if !xg_against.is_finite() || xg_against < 0.0 {
        return Err(StatoError::validation("xg_against must be a non-negative number."));
    }
    get_match(conn, team_id, match_id)?;
    conn.execute(
        "UPDATE matches SET xg_against = ?2 WHERE id = ?1",
        params![match_id, (xg_against * 100.0).round() / 100.0],
    )?;
    get_match(conn, team_id, match_id)
}
