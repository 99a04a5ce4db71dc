use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matches;
use crate::model::{EventCounter, EventInstance, EventKind};
use crate::teams;

/// What one increment did. `instance_id` is `None` when the instance row could not be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Increment {
    pub team_id: i64,
    pub match_id: i64,
    pub player_id: i64,
    pub player: String,
    pub event: EventKind,
    pub count: u32,
    pub second: Option<u32>,
    pub zone: Option<String>,
    pub instance_id: Option<i64>,
}

/// A logged event as the ledger receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInput<'a> {
    pub player_name: &'a str,
    pub event: EventKind,
    pub second: Option<i64>,
    pub zone: Option<&'a str>,
}

/// Bumps the (team, match, player, event) counter, then appends the instance row.
///
/// The counter bump commits on its own; the instance write afterwards is
/// best effort, so counters can run ahead of instances.
pub fn record_event(
    conn: &mut Connection,
    team_id: i64,
    match_id: i64,
    input: &EventInput<'_>,
    now: DateTime<Utc>,
) -> Result<Increment> {
    matches::get_match(conn, team_id, match_id)?;
    // Seconds that cannot be a match offset are dropped rather than rejected.
    let second = input.second.and_then(|s| u32::try_from(s).ok());
    let zone = input.zone.map(str::to_string);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let player = teams::get_or_create_player(&tx, team_id, input.player_name, now)?;
    let count: u32 = tx.query_row(
        "INSERT INTO event_counters (team_id, match_id, player_id, event, count, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)
         ON CONFLICT(team_id, match_id, player_id, event)
         DO UPDATE SET count = event_counters.count + 1, updated_at = excluded.updated_at
         RETURNING count",
        params![team_id, match_id, player.id, input.event, now],
        |row| row.get(0),
    )?;
    tx.commit()?;

    let instance_id = match conn.execute(
        "INSERT INTO event_instances (team_id, match_id, player_id, event, second, zone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![team_id, match_id, player.id, input.event, second, zone, now],
    ) {
        Ok(_) => Some(conn.last_insert_rowid()),
        Err(err) => {
            tracing::warn!(
                team_id,
                match_id,
                event = input.event.as_str(),
                error = %err,
                "event instance not stored; counter kept"
            );
            None
        }
    };

    tracing::debug!(team_id, match_id, event = input.event.as_str(), count, "event recorded");
    Ok(Increment {
        team_id,
        match_id,
        player_id: player.id,
        player: player.name,
        event: input.event,
        count,
        second,
        zone,
        instance_id,
    })
}

const COUNTER_SELECT: &str = "SELECT c.id, c.team_id, c.match_id, c.player_id, p.name, c.event, c.count, c.updated_at
     FROM event_counters c JOIN players p ON p.id = c.player_id";

fn counter_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventCounter> {
    Ok(EventCounter {
        id: row.get(0)?,
        team_id: row.get(1)?,
        match_id: row.get(2)?,
        player_id: row.get(3)?,
        player: row.get(4)?,
        event: row.get(5)?,
        count: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn query_counters(conn: &Connection, filter: &str, args: impl rusqlite::Params) -> Result<Vec<EventCounter>> {
    let mut stmt = conn.prepare(&format!(
        "{COUNTER_SELECT} WHERE {filter} ORDER BY c.updated_at DESC, c.id DESC"
    ))?;
    let rows = stmt.query_map(args, counter_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Counters for one match, most recently touched first.
pub fn match_counters(conn: &Connection, team_id: i64, match_id: i64) -> Result<Vec<EventCounter>> {
    query_counters(conn, "c.team_id = ?1 AND c.match_id = ?2", params![team_id, match_id])
}

pub fn team_counters(conn: &Connection, team_id: i64) -> Result<Vec<EventCounter>> {
    query_counters(conn, "c.team_id = ?1", params![team_id])
}

pub fn player_counters(conn: &Connection, player_id: i64) -> Result<Vec<EventCounter>> {
    query_counters(conn, "c.player_id = ?1", params![player_id])
}

/// Instances of a match in seek order: by second (untimed last), then by log time.
pub fn match_instances(conn: &Connection, team_id: i64, match_id: i64) -> Result<Vec<EventInstance>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.team_id, i.match_id, i.player_id, p.name, i.event, i.second, i.zone, i.created_at
         FROM event_instances i JOIN players p ON p.id = i.player_id
         WHERE i.team_id = ?1 AND i.match_id = ?2
         ORDER BY i.second IS NULL, i.second, i.created_at, i.id",
    )?;
    let rows = stmt.query_map(params![team_id, match_id], |row| {
        Ok(EventInstance {
            id: row.get(0)?,
            team_id: row.get(1)?,
            match_id: row.get(2)?,
            player_id: row.get(3)?,
            player: row.get(4)?,
            event: row.get(5)?,
            second: row.get(6)?,
            zone: row.get(7)?,
            created_at: row.get(8)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
