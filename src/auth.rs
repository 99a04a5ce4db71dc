use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatoError};
use crate::model::Role;

/// Account record standing in for the identity provider. Credentials live elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
}

impl Caller {
    pub fn team_id(&self) -> Result<i64> {
        self.team_id.ok_or(StatoError::NoTeam)
    }

    pub fn is_manager(&self) -> bool {
        match self.role {
            Role::Manager => true,
            Role::Player | Role::Unassigned => false,
        }
    }

    pub fn require_manager(&self) -> Result<()> {
        match self.role {
            Role::Manager => Ok(()),
            Role::Player | Role::Unassigned => {
                Err(StatoError::forbidden("Only managers can do this."))
            }
        }
    }

    pub fn require_player(&self) -> Result<()> {
        match self.role {
            Role::Player => Ok(()),
            Role::Manager | Role::Unassigned => Err(StatoError::forbidden("Not a player account.")),
        }
    }
}

impl From<&Profile> for Caller {
    fn from(profile: &Profile) -> Self {
        Caller {
            user_id: profile.id,
            username: profile.username.clone(),
            role: profile.role,
            team_id: profile.team_id,
            player_id: profile.player_id,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, username, role, team_id, player_id, is_active, created_at";

fn profile_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
        team_id: row.get(3)?,
        player_id: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Usernames are emails in practice: trimmed and lower-cased before storage.
pub fn normalize_username(raw: &str) -> Result<String> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(StatoError::validation("username is required."));
    }
    Ok(username)
}

pub fn create_profile(
    conn: &Connection,
    username: &str,
    role: Role,
    team_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Profile> {
    let username = normalize_username(username)?;
    let taken = conn
        .query_row(
            "SELECT 1 FROM profiles WHERE username = ?1",
            params![username],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if taken {
        return Err(StatoError::conflict("User with this email already exists."));
    }
    conn.execute(
        "INSERT INTO profiles (username, role, team_id, player_id, is_active, created_at)
         VALUES (?1, ?2, ?3, NULL, 1, ?4)",
        params![username, role, team_id, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(profile_id = id, role = role.as_str(), "created profile");
    get_profile(conn, id)
}

/// Player accounts start without a team; they join one later by code.
pub fn create_player_account(conn: &Connection, username: &str, now: DateTime<Utc>) -> Result<Profile> {
    create_profile(conn, username, Role::Player, None, now)
}

pub fn get_profile(conn: &Connection, profile_id: i64) -> Result<Profile> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        params![profile_id],
        profile_from_row,
    )
    .optional()?
    .ok_or(StatoError::NotFound("Profile"))
}

pub fn resolve_caller(conn: &Connection, user_id: i64) -> Result<Caller> {
    let profile = get_profile(conn, user_id)?;
    if !profile.is_active {
        return Err(StatoError::forbidden("Account is disabled."));
    }
    Ok(Caller::from(&profile))
}

pub fn set_active(conn: &Connection, profile_id: i64, active: bool) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET is_active = ?2 WHERE id = ?1",
        params![profile_id, active],
    )?;
    if updated == 0 {
        return Err(StatoError::NotFound("Profile"));
    }
    Ok(())
}

pub fn link_team(
    conn: &Connection,
    profile_id: i64,
    team_id: Option<i64>,
    player_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET team_id = ?2, player_id = ?3 WHERE id = ?1",
        params![profile_id, team_id, player_id],
    )?;
    Ok(())
}

/// The profile (if any) claiming a squad player.
pub fn profile_for_player(conn: &Connection, player_id: i64) -> Result<Option<Profile>> {
    Ok(conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE player_id = ?1"),
            params![player_id],
            profile_from_row,
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn duplicate_usernames_conflict_case_insensitively() {
        let conn = db::open_in_memory().expect("db");
        let now = Utc::now();
        create_profile(&conn, "Coach@Club.test ", Role::Manager, None, now).expect("first");
        let err = create_profile(&conn, "coach@club.test", Role::Player, None, now).unwrap_err();
        assert!(matches!(err, StatoError::Conflict(_)));
    }

    #[test]
    fn disabled_profiles_cannot_act() {
        let conn = db::open_in_memory().expect("db");
        let profile = create_player_account(&conn, "p@club.test", Utc::now()).expect("profile");
        set_active(&conn, profile.id, false).expect("disable");
        assert!(matches!(
            resolve_caller(&conn, profile.id),
            Err(StatoError::Forbidden(_))
        ));
        assert!(matches!(resolve_caller(&conn, 999), Err(StatoError::NotFound("Profile"))));
    }

    #[test]
    fn role_checks_are_exhaustive() {
        let caller = Caller {
            user_id: 1,
            username: "x".into(),
            role: Role::Unassigned,
            team_id: None,
            player_id: None,
        };
        assert!(caller.require_manager().is_err());
        assert!(caller.require_player().is_err());
        assert!(matches!(caller.team_id(), Err(StatoError::NoTeam)));
    }
}
