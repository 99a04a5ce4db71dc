use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::auth::{self, Caller, Profile};
use crate::error::{Result, StatoError};
use crate::model::{Player, Role, Team};

pub const TEAM_CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub team: Team,
    pub manager: Profile,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub team: Team,
    pub player: Option<Player>,
    pub already_member: bool,
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..TEAM_CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect()
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == TEAM_CODE_LEN
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn code_taken(conn: &Connection, code: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM teams WHERE team_code = ?1",
            params![code],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Draws codes until one is free.
pub fn unique_code(conn: &Connection) -> Result<String> {
    let mut rng = rand::thread_rng();
    loop {
        let code = generate_code(&mut rng);
        if !code_taken(conn, &code)? {
            return Ok(code);
        }
        tracing::debug!(code = %code, "team code collision, redrawing");
    }
}

const TEAM_COLUMNS: &str = "id, club_name, team_name, team_code, created_at";

fn team_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        club_name: row.get(1)?,
        team_name: row.get(2)?,
        team_code: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn player_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        team_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// A requested code is kept only when well formed and free; otherwise one is generated.
pub fn create_team(
    conn: &Connection,
    club_name: &str,
    team_name: &str,
    requested_code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Team> {
    let club_name = club_name.trim();
    let team_name = team_name.trim();
    if club_name.is_empty() || team_name.is_empty() {
        return Err(StatoError::validation("club_name and team_name are required."));
    }
    let requested = requested_code
        .map(|c| c.trim().to_uppercase())
        .filter(|c| is_valid_code(c));
    let code = match requested {
        Some(code) if !code_taken(conn, &code)? => code,
        _ => unique_code(conn)?,
    };
    conn.execute(
        "INSERT INTO teams (club_name, team_name, team_code, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![club_name, team_name, code, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(team_id = id, team_code = %code, "created team");
    get_team(conn, id)
}

pub fn get_team(conn: &Connection, team_id: i64) -> Result<Team> {
    conn.query_row(
        &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1"),
        params![team_id],
        team_from_row,
    )
    .optional()?
    .ok_or(StatoError::NotFound("Team"))
}

pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<Team>> {
    let code = code.trim().to_uppercase();
    Ok(conn
        .query_row(
            &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE team_code = ?1"),
            params![code],
            team_from_row,
        )
        .optional()?)
}

pub fn teams_missing_code(conn: &Connection) -> Result<Vec<Team>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEAM_COLUMNS} FROM teams WHERE team_code IS NULL OR team_code = '' ORDER BY id"
    ))?;
    let rows = stmt.query_map([], team_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn assign_code(conn: &Connection, team_id: i64) -> Result<String> {
    let code = unique_code(conn)?;
    let updated = conn.execute(
        "UPDATE teams SET team_code = ?2 WHERE id = ?1",
        params![team_id, code],
    )?;
    if updated == 0 {
        return Err(StatoError::NotFound("Team"));
    }
    Ok(code)
}

/// Trims, drops blanks and case-insensitive repeats; the first spelling wins.
pub fn clean_squad_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for raw in names {
        let name = raw.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            cleaned.push(name.to_string());
        }
    }
    cleaned
}

/// First column of each record; an optional `name` header row is skipped.
pub fn parse_squad_csv(text: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut names = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| StatoError::validation(format!("Invalid CSV file: {err}")))?;
        let first = record.get(0).unwrap_or_default();
        if idx == 0 && first.eq_ignore_ascii_case("name") {
            continue;
        }
        names.push(first.to_string());
    }
    Ok(clean_squad_names(names))
}

pub fn list_squad(conn: &Connection, team_id: i64) -> Result<Vec<Player>> {
    let mut stmt = conn.prepare(
        "SELECT id, team_id, name, created_at FROM players WHERE team_id = ?1 ORDER BY name, id",
    )?;
    let rows = stmt.query_map(params![team_id], player_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn get_player(conn: &Connection, team_id: i64, player_id: i64) -> Result<Player> {
    conn.query_row(
        "SELECT id, team_id, name, created_at FROM players WHERE id = ?1 AND team_id = ?2",
        params![player_id, team_id],
        player_from_row,
    )
    .optional()?
    .ok_or(StatoError::NotFound("Player"))
}

fn insert_players(conn: &Connection, team_id: i64, names: &[String], now: DateTime<Utc>) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO players (team_id, name, created_at) VALUES (?1, ?2, ?3)")?;
    for name in names {
        stmt.execute(params![team_id, name, now])?;
    }
    Ok(())
}

/// Drops the current squad (and with it every stat row) before inserting the new names.
pub fn replace_squad<S: AsRef<str>>(
    conn: &mut Connection,
    team_id: i64,
    names: &[S],
    now: DateTime<Utc>,
) -> Result<Vec<Player>> {
    let cleaned = clean_squad_names(names);
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE profiles SET player_id = NULL WHERE player_id IN (SELECT id FROM players WHERE team_id = ?1)",
        params![team_id],
    )?;
    tx.execute("DELETE FROM players WHERE team_id = ?1", params![team_id])?;
    insert_players(&tx, team_id, &cleaned, now)?;
    tx.commit()?;
    tracing::info!(team_id, count = cleaned.len(), "replaced squad");
    list_squad(conn, team_id)
}

/// Removes a player and its stats; an account linked to it is detached from the team.
pub fn delete_player(conn: &mut Connection, team_id: i64, player_id: i64) -> Result<()> {
    let tx = conn.transaction()?;
    get_player(&tx, team_id, player_id)?;
    tx.execute(
        "UPDATE profiles SET team_id = NULL, player_id = NULL WHERE player_id = ?1",
        params![player_id],
    )?;
    tx.execute("DELETE FROM players WHERE id = ?1", params![player_id])?;
    tx.commit()?;
    tracing::info!(team_id, player_id, "deleted player");
    Ok(())
}

/// Exact match on the trimmed name; the ledger path never merges differently cased names.
pub fn get_or_create_player(
    conn: &Connection,
    team_id: i64,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Player> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StatoError::validation("Invalid player."));
    }
    conn.execute(
        "INSERT INTO players (team_id, name, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(team_id, name) DO NOTHING",
        params![team_id, name, now],
    )?;
    Ok(conn.query_row(
        "SELECT id, team_id, name, created_at FROM players WHERE team_id = ?1 AND name = ?2",
        params![team_id, name],
        player_from_row,
    )?)
}

pub fn find_player_ci(conn: &Connection, team_id: i64, name: &str) -> Result<Option<Player>> {
    Ok(conn
        .query_row(
            "SELECT id, team_id, name, created_at FROM players
             WHERE team_id = ?1 AND name = ?2 COLLATE NOCASE ORDER BY id LIMIT 1",
            params![team_id, name.trim()],
            player_from_row,
        )
        .optional()?)
}

/// Creates the team, its manager account and the initial squad in one transaction.
pub fn signup<S: AsRef<str>>(
    conn: &mut Connection,
    club_name: &str,
    team_name: &str,
    manager_username: &str,
    squad: &[S],
    now: DateTime<Utc>,
) -> Result<Signup> {
    let tx = conn.transaction()?;
    let team = create_team(&tx, club_name, team_name, None, now)?;
    let manager = auth::create_profile(&tx, manager_username, Role::Manager, Some(team.id), now)?;
    insert_players(&tx, team.id, &clean_squad_names(squad), now)?;
    let players = list_squad(&tx, team.id)?;
    tx.commit()?;
    Ok(Signup {
        team,
        manager,
        players,
    })
}

pub fn join_team(
    conn: &mut Connection,
    caller: &Caller,
    team_code: &str,
    player_name: &str,
    now: DateTime<Utc>,
) -> Result<JoinOutcome> {
    caller
        .require_player()
        .map_err(|_| StatoError::forbidden("Only players can join teams."))?;
    let code = team_code.trim().to_uppercase();
    if code.is_empty() {
        return Err(StatoError::validation("team_code is required."));
    }
    let team = find_by_code(conn, &code)?.ok_or(StatoError::NotFound("Team"))?;

    match caller.team_id {
        Some(current) if current == team.id => {
            let player = match caller.player_id {
                Some(player_id) => get_player(conn, team.id, player_id).ok(),
                None => None,
            };
            return Ok(JoinOutcome {
                team,
                player,
                already_member: true,
            });
        }
        Some(_) => {
            return Err(StatoError::conflict(
                "You are already on a team. Please leave your current team first.",
            ));
        }
        None => {}
    }

    let player_name = player_name.trim();
    if player_name.is_empty() {
        return Err(StatoError::validation("player_name is required."));
    }

    let tx = conn.transaction()?;
    let player = match find_player_ci(&tx, team.id, player_name)? {
        Some(player) => player,
        None => get_or_create_player(&tx, team.id, player_name, now)?,
    };
    if let Some(owner) = auth::profile_for_player(&tx, player.id)? {
        if owner.id != caller.user_id {
            return Err(StatoError::conflict(
                "This player name is already linked to another account.",
            ));
        }
    }
    auth::link_team(&tx, caller.user_id, Some(team.id), Some(player.id))?;
    tx.commit()?;
    tracing::info!(team_id = team.id, player_id = player.id, "player joined team");
    Ok(JoinOutcome {
        team,
        player: Some(player),
        already_member: false,
    })
}

pub fn leave_team(conn: &Connection, caller: &Caller) -> Result<()> {
    caller
        .require_player()
        .map_err(|_| StatoError::forbidden("Only players can leave teams."))?;
    if caller.team_id.is_none() {
        return Err(StatoError::validation("You are not on any team."));
    }
    auth::link_team(conn, caller.user_id, None, None)
}
