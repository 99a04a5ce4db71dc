use std::collections::HashMap;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matches;
use crate::model::{EventKind, Zone};

pub const XG_ATTACKING_ZONE: f64 = 0.3;
pub const XG_DEEP_ZONE: f64 = 0.1;
pub const XG_UNZONED: f64 = 0.2;
pub const XG_OFF_TARGET: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerXg {
    pub player_id: i64,
    pub player: String,
    pub xg: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Value of one shot on target given its raw zone tag.
pub fn on_target_value(zone: Option<&str>) -> f64 {
    match zone.and_then(Zone::parse) {
        Some(zone) if zone.is_attacking() => XG_ATTACKING_ZONE,
        Some(_) => XG_DEEP_ZONE,
        None => XG_UNZONED,
    }
}

pub fn xg_from_shots<'a, I>(on_target_zones: I, off_target: u32) -> f64
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let on_target: f64 = on_target_zones.into_iter().map(on_target_value).sum();
    on_target + f64::from(off_target) * XG_OFF_TARGET
}

/// Full recompute over the logged shot instances of a match. Unrounded.
pub fn compute_xg(conn: &Connection, match_id: i64) -> Result<f64> {
    let mut stmt = conn.prepare(
        "SELECT event, zone FROM event_instances
         WHERE match_id = ?1 AND event IN (?2, ?3)",
    )?;
    let rows = stmt.query_map(
        params![match_id, EventKind::ShotsOnTarget, EventKind::ShotsOffTarget],
        |row| Ok((row.get::<_, EventKind>(0)?, row.get::<_, Option<String>>(1)?)),
    )?;
    let mut zones = Vec::new();
    let mut off_target = 0u32;
    for row in rows {
        match row? {
            (EventKind::ShotsOnTarget, zone) => zones.push(zone),
            _ => off_target += 1,
        }
    }
    Ok(xg_from_shots(zones.iter().map(Option::as_deref), off_target))
}

/// Recomputes and stores the match xG (two decimals); returns the stored value.
pub fn recompute_xg(conn: &Connection, match_id: i64) -> Result<f64> {
    let xg = round2(compute_xg(conn, match_id)?);
    matches::set_xg(conn, match_id, xg)?;
    tracing::debug!(match_id, xg, "recomputed xg");
    Ok(xg)
}

/// Season xG per shooter, highest first. Only players with a logged shot appear.
pub fn player_xg(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<Vec<PlayerXg>> {
    let season = season.map(str::trim).filter(|s| !s.is_empty());
    let mut stmt = conn.prepare(
        "SELECT i.player_id, p.name, i.event, i.zone
         FROM event_instances i
         JOIN players p ON p.id = i.player_id
         JOIN matches m ON m.id = i.match_id
         WHERE i.team_id = ?1 AND i.event IN (?2, ?3) AND (?4 IS NULL OR m.season = ?4)
         ORDER BY i.id",
    )?;
    let rows = stmt.query_map(
        params![team_id, EventKind::ShotsOnTarget, EventKind::ShotsOffTarget, season],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, EventKind>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        },
    )?;

    let mut totals: HashMap<i64, PlayerXg> = HashMap::new();
    for row in rows {
        let (player_id, player, event, zone) = row?;
        let value = match event {
            EventKind::ShotsOnTarget => on_target_value(zone.as_deref()),
            _ => XG_OFF_TARGET,
        };
        totals
            .entry(player_id)
            .or_insert_with(|| PlayerXg {
                player_id,
                player,
                xg: 0.0,
            })
            .xg += value;
    }

    let mut out: Vec<PlayerXg> = totals
        .into_values()
        .map(|mut row| {
            row.xg = round2(row.xg);
            row
        })
        .collect();
    out.sort_by(|a, b| b.xg.total_cmp(&a.xg).then_with(|| a.player.cmp(&b.player)));
    Ok(out)
}
