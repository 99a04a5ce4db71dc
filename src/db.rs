use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;

use crate::error::Result;
use crate::model::{EventKind, MatchState, Role, ZoneType};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "opened stato database");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_name TEXT NOT NULL,
            team_name TEXT NOT NULL,
            team_code TEXT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(team_id, name)
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            team_id INTEGER NULL REFERENCES teams(id) ON DELETE SET NULL,
            player_id INTEGER NULL UNIQUE REFERENCES players(id) ON DELETE SET NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            opponent TEXT NOT NULL,
            kickoff_at TEXT NOT NULL,
            analyst_name TEXT NOT NULL,
            created_by INTEGER NULL REFERENCES profiles(id) ON DELETE SET NULL,
            state TEXT NOT NULL DEFAULT 'not_started',
            elapsed_seconds INTEGER NOT NULL DEFAULT 0 CHECK (elapsed_seconds >= 0),
            timer_started_at TEXT NULL,
            formation TEXT NULL,
            opponent_formation TEXT NULL,
            season TEXT NULL,
            is_home INTEGER NOT NULL DEFAULT 1,
            goals_scored INTEGER NOT NULL DEFAULT 0 CHECK (goals_scored >= 0),
            goals_conceded INTEGER NOT NULL DEFAULT 0 CHECK (goals_conceded >= 0),
            xg REAL NOT NULL DEFAULT 0,
            xg_against REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_team ON matches(team_id);
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(team_id, season);

        CREATE TABLE IF NOT EXISTS event_counters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
            player_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            event TEXT NOT NULL,
            count INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0),
            updated_at TEXT NOT NULL,
            UNIQUE(team_id, match_id, player_id, event)
        );
        CREATE INDEX IF NOT EXISTS idx_counters_match ON event_counters(match_id);
        CREATE INDEX IF NOT EXISTS idx_counters_player ON event_counters(player_id);

        CREATE TABLE IF NOT EXISTS event_instances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            match_id INTEGER NOT NULL REFERENCES matches(id) ON DELETE CASCADE,
            player_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
            event TEXT NOT NULL,
            second INTEGER NULL CHECK (second >= 0),
            zone TEXT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_instances_match ON event_instances(match_id, event);
        CREATE INDEX IF NOT EXISTS idx_instances_team_zone ON event_instances(team_id, zone);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            match_id INTEGER NULL REFERENCES matches(id) ON DELETE SET NULL,
            sender_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            sender_role TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chat_team ON chat_messages(team_id, created_at);

        CREATE TABLE IF NOT EXISTS zone_analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            season TEXT NOT NULL DEFAULT '',
            zone TEXT NOT NULL,
            zone_type TEXT NOT NULL,
            events_in_zone INTEGER NOT NULL DEFAULT 0,
            successful_events INTEGER NOT NULL DEFAULT 0,
            failed_events INTEGER NOT NULL DEFAULT 0,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(team_id, season, zone, zone_type)
        );

        CREATE TABLE IF NOT EXISTS recordings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL UNIQUE REFERENCES matches(id) ON DELETE CASCADE,
            blob_key TEXT NOT NULL,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            duration_seconds INTEGER NULL,
            uploaded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_recordings_blob ON recordings(blob_key);
        "#,
    )?;
    Ok(())
}

fn text_column<T>(value: ValueRef<'_>, parse: impl FnOnce(&str) -> Option<T>) -> FromSqlResult<T> {
    let raw = value.as_str()?;
    parse(raw).ok_or_else(|| FromSqlError::Other(format!("unexpected value {raw:?}").into()))
}

impl ToSql for EventKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EventKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value, |raw| raw.parse().ok())
    }
}

impl ToSql for MatchState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MatchState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value, |raw| raw.parse().ok())
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value, |raw| Some(Role::from_stored(raw)))
    }
}

impl ToSql for ZoneType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ZoneType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_column(value, |raw| raw.parse().ok())
    }
}
