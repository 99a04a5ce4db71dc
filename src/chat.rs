use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Value, json};

use crate::auth::Caller;
use crate::error::{Result, StatoError};
use crate::model::ChatMessage;

/// Keeps a match reference only when it belongs to the team.
fn scoped_match(conn: &Connection, team_id: i64, match_id: Option<i64>) -> Result<Option<i64>> {
    let Some(match_id) = match_id else {
        return Ok(None);
    };
    let found = conn
        .query_row(
            "SELECT id FROM matches WHERE id = ?1 AND team_id = ?2",
            params![match_id, team_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if found.is_none() {
        tracing::debug!(team_id, match_id, "ignoring chat match outside team");
    }
    Ok(found)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get(0)?,
        team_id: row.get(1)?,
        match_id: row.get(2)?,
        sender_id: row.get(3)?,
        sender: row.get(4)?,
        sender_role: row.get(5)?,
        message: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn post_message(
    conn: &Connection,
    caller: &Caller,
    text: &str,
    match_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ChatMessage> {
    let team_id = caller.team_id()?;
    let text = text.trim();
    if text.is_empty() {
        return Err(StatoError::validation("Message cannot be empty."));
    }
    let match_id = scoped_match(conn, team_id, match_id)?;
    conn.execute(
        "INSERT INTO chat_messages (team_id, match_id, sender_id, sender_role, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![team_id, match_id, caller.user_id, caller.role, text, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(team_id, id, "chat message posted");
    Ok(ChatMessage {
        id,
        team_id,
        match_id,
        sender_id: caller.user_id,
        sender: caller.username.clone(),
        sender_role: caller.role,
        message: text.to_string(),
        created_at: now,
    })
}

/// The newest `limit` messages, oldest first.
pub fn list_messages(
    conn: &Connection,
    team_id: i64,
    match_id: Option<i64>,
    limit: usize,
) -> Result<Vec<ChatMessage>> {
    let match_id = scoped_match(conn, team_id, match_id)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT c.id, c.team_id, c.match_id, c.sender_id, p.username, c.sender_role,
                c.message, c.created_at
         FROM chat_messages c JOIN profiles p ON p.id = c.sender_id
         WHERE c.team_id = ?1 AND (?2 IS NULL OR c.match_id = ?2)
         ORDER BY c.created_at DESC, c.id DESC
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(params![team_id, match_id, limit], message_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    out.reverse();
    Ok(out)
}

/// Payload published on the `chat` channel.
pub fn chat_payload(message: &ChatMessage) -> Value {
    json!({
        "id": message.id,
        "sender": message.sender,
        "sender_role": message.sender_role.as_str(),
        "message": message.message,
        "timestamp": message.created_at.to_rfc3339(),
        "team_id": message.team_id,
        "match_id": message.match_id,
    })
}
