use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::aggregate::round1;
use crate::error::{Result, StatoError};
use crate::model::{EventKind, Zone, ZoneAnalysis, ZoneType, normalize_season};

pub const STRENGTH_RATE: f64 = 60.0;
pub const WEAKNESS_RATE: f64 = 40.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub zone: String,
    pub zone_type: Option<ZoneType>,
    pub events_in_zone: Option<i64>,
    pub successful_events: Option<i64>,
    pub failed_events: Option<i64>,
    pub notes: Option<String>,
    pub season: Option<String>,
}

/// A zone's share of won actions, derived from logged instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedZone {
    pub zone: String,
    pub events: u32,
    #[serde(skip)]
    pub successful: u32,
    /// Rounded for display; classification uses [`ComputedZone::exact_rate`].
    pub success_rate: f64,
}

impl ComputedZone {
    pub fn new(zone: String, events: u32, successful: u32) -> Self {
        let mut computed = ComputedZone {
            zone,
            events,
            successful,
            success_rate: 0.0,
        };
        computed.success_rate = round1(computed.exact_rate());
        computed
    }

    pub fn exact_rate(&self) -> f64 {
        if self.events == 0 {
            return 0.0;
        }
        f64::from(self.successful) * 100.0 / f64::from(self.events)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    Manual,
    Calculated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneItems {
    Manual(Vec<ZoneAnalysis>),
    Calculated(Vec<ComputedZone>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneReport {
    pub season: Option<String>,
    pub strengths: ZoneItems,
    pub weaknesses: ZoneItems,
    pub source: ZoneSource,
}

fn count_field(value: Option<i64>, field: &str) -> Result<u32> {
    u32::try_from(value.unwrap_or(0))
        .map_err(|_| StatoError::validation(format!("{field} must be a non-negative integer.")))
}

/// Insert or overwrite the entry keyed by (team, season, zone, zone_type).
pub fn upsert_zone(conn: &Connection, team_id: i64, entry: &ZoneEntry, now: DateTime<Utc>) -> Result<ZoneAnalysis> {
    let zone = entry.zone.trim();
    let (Some(zone_type), false) = (entry.zone_type, zone.is_empty()) else {
        return Err(StatoError::validation(
            "zone and zone_type (strength/weakness) are required.",
        ));
    };
    if Zone::parse(zone).is_none() {
        return Err(StatoError::validation("zone must be one of 1-6."));
    }
    let season = normalize_season(entry.season.as_deref())?;
    let events_in_zone = count_field(entry.events_in_zone, "events_in_zone")?;
    let successful = count_field(entry.successful_events, "successful_events")?;
    let failed = count_field(entry.failed_events, "failed_events")?;
    let notes = entry.notes.as_deref().unwrap_or("").trim();

    let row = conn.query_row(
        "INSERT INTO zone_analyses (team_id, season, zone, zone_type, events_in_zone,
             successful_events, failed_events, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(team_id, season, zone, zone_type) DO UPDATE SET
             events_in_zone = excluded.events_in_zone,
             successful_events = excluded.successful_events,
             failed_events = excluded.failed_events,
             notes = excluded.notes,
             updated_at = excluded.updated_at
         RETURNING id, team_id, season, zone, zone_type, events_in_zone, successful_events,
             failed_events, notes, created_at, updated_at",
        params![
            team_id,
            season.as_deref().unwrap_or(""),
            zone,
            zone_type,
            events_in_zone,
            successful,
            failed,
            notes,
            now,
        ],
        zone_from_row,
    )?;
    tracing::info!(team_id, zone, zone_type = zone_type.as_str(), "zone analysis saved");
    Ok(row)
}

fn zone_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ZoneAnalysis> {
    let season: String = row.get(2)?;
    Ok(ZoneAnalysis {
        id: row.get(0)?,
        team_id: row.get(1)?,
        season: Some(season).filter(|s| !s.is_empty()),
        zone: row.get(3)?,
        zone_type: row.get(4)?,
        events_in_zone: row.get(5)?,
        successful_events: row.get(6)?,
        failed_events: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn manual_zones(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<Vec<ZoneAnalysis>> {
    let mut stmt = conn.prepare(
        "SELECT id, team_id, season, zone, zone_type, events_in_zone, successful_events,
             failed_events, notes, created_at, updated_at
         FROM zone_analyses
         WHERE team_id = ?1 AND (?2 IS NULL OR season = ?2)
         ORDER BY zone, zone_type, id",
    )?;
    let rows = stmt.query_map(params![team_id, season], zone_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Success rate per non-empty zone tag across logged instances.
pub fn computed_zones(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<Vec<ComputedZone>> {
    let mut stmt = conn.prepare(
        "SELECT i.zone, i.event, COUNT(*)
         FROM event_instances i JOIN matches m ON m.id = i.match_id
         WHERE i.team_id = ?1 AND i.zone IS NOT NULL AND i.zone <> ''
           AND (?2 IS NULL OR m.season = ?2)
         GROUP BY i.zone, i.event",
    )?;
    let rows = stmt.query_map(params![team_id, season], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, EventKind>(1)?,
            row.get::<_, u32>(2)?,
        ))
    })?;
    let mut per_zone: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for row in rows {
        let (zone, event, count) = row?;
        let entry = per_zone.entry(zone).or_default();
        entry.0 += count;
        if event.is_zone_success() {
            entry.1 += count;
        }
    }
    Ok(per_zone
        .into_iter()
        .map(|(zone, (events, successful))| ComputedZone::new(zone, events, successful))
        .collect())
}

/// Manual entries win outright; the computed split is only used when none exist.
pub fn zone_report(conn: &Connection, team_id: i64, season: Option<&str>) -> Result<ZoneReport> {
    let season = season.map(str::trim).filter(|s| !s.is_empty());
    let manual = manual_zones(conn, team_id, season)?;
    if !manual.is_empty() {
        let (strengths, weaknesses): (Vec<_>, Vec<_>) = manual
            .into_iter()
            .partition(|z| z.zone_type == ZoneType::Strength);
        return Ok(ZoneReport {
            season: season.map(str::to_string),
            strengths: ZoneItems::Manual(strengths),
            weaknesses: ZoneItems::Manual(weaknesses),
            source: ZoneSource::Manual,
        });
    }

    let (strengths, weaknesses) = split_computed(computed_zones(conn, team_id, season)?);
    Ok(ZoneReport {
        season: season.map(str::to_string),
        strengths: ZoneItems::Calculated(strengths),
        weaknesses: ZoneItems::Calculated(weaknesses),
        source: ZoneSource::Calculated,
    })
}

/// Zones between the two thresholds are neither.
pub fn split_computed(zones: Vec<ComputedZone>) -> (Vec<ComputedZone>, Vec<ComputedZone>) {
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for zone in zones {
        let rate = zone.exact_rate();
        if rate >= STRENGTH_RATE {
            strengths.push(zone);
        } else if rate < WEAKNESS_RATE {
            weaknesses.push(zone);
        }
    }
    (strengths, weaknesses)
}
