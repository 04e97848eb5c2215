//! Incident report cache.
//!
//! # Invariants
//! - All list reads are ordered `timestamp DESC, id DESC`.
//! - Range bounds are inclusive on both ends.

use super::{RepoError, RepoResult};
use crate::model::incident::{Incident, IncidentSeverity, IncidentStatus};
use rusqlite::{params, Connection, Params, Row};
use std::collections::BTreeMap;

const INCIDENT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    description,
    timestamp,
    latitude,
    longitude,
    location,
    photo_path,
    severity,
    status
FROM incidents";

const INCIDENT_ORDER_SQL: &str = "ORDER BY timestamp DESC, id DESC";

/// Repository interface for cached incidents.
pub trait IncidentRepository {
    fn upsert_incident(&self, incident: &Incident) -> RepoResult<()>;
    fn get_incident(&self, id: &str) -> RepoResult<Option<Incident>>;
    fn list_all(&self) -> RepoResult<Vec<Incident>>;
    fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<Incident>>;
    fn list_by_status(&self, status: IncidentStatus) -> RepoResult<Vec<Incident>>;
    fn list_in_range(&self, start: i64, end: i64) -> RepoResult<Vec<Incident>>;
    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Incident>>;
    fn count_for_user_in_range(&self, user_id: &str, start: i64, end: i64) -> RepoResult<u32>;
    fn count_all(&self) -> RepoResult<u32>;
    fn count_in_range(&self, start: i64, end: i64) -> RepoResult<u32>;
    /// Per-severity counts; severities without incidents map to zero.
    fn severity_counts_in_range(
        &self,
        start: i64,
        end: i64,
    ) -> RepoResult<BTreeMap<IncidentSeverity, u32>>;
}

/// SQLite-backed incident repository.
pub struct SqliteIncidentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteIncidentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_incidents(&self, sql: &str, params: impl Params) -> RepoResult<Vec<Incident>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut incidents = Vec::new();
        while let Some(row) = rows.next()? {
            incidents.push(parse_incident_row(row)?);
        }
        Ok(incidents)
    }

    fn count(&self, sql: &str, params: impl Params) -> RepoResult<u32> {
        let count = self.conn.query_row(sql, params, |row| row.get::<_, u32>(0))?;
        Ok(count)
    }
}

impl IncidentRepository for SqliteIncidentRepository<'_> {
    fn upsert_incident(&self, incident: &Incident) -> RepoResult<()> {
        incident.validate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO incidents (
                id,
                user_id,
                description,
                timestamp,
                latitude,
                longitude,
                location,
                photo_path,
                severity,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                incident.id.as_str(),
                incident.user_id.as_str(),
                incident.description.as_str(),
                incident.timestamp,
                incident.latitude,
                incident.longitude,
                incident.location.as_deref(),
                incident.photo_path.as_deref(),
                incident.severity.as_str(),
                incident.status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_incident(&self, id: &str) -> RepoResult<Option<Incident>> {
        let incidents =
            self.query_incidents(&format!("{INCIDENT_SELECT_SQL} WHERE id = ?1;"), params![id])?;
        Ok(incidents.into_iter().next())
    }

    fn list_all(&self) -> RepoResult<Vec<Incident>> {
        self.query_incidents(&format!("{INCIDENT_SELECT_SQL} {INCIDENT_ORDER_SQL};"), [])
    }

    fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<Incident>> {
        self.query_incidents(
            &format!("{INCIDENT_SELECT_SQL} WHERE user_id = ?1 {INCIDENT_ORDER_SQL};"),
            params![user_id],
        )
    }

    fn list_by_status(&self, status: IncidentStatus) -> RepoResult<Vec<Incident>> {
        self.query_incidents(
            &format!("{INCIDENT_SELECT_SQL} WHERE status = ?1 {INCIDENT_ORDER_SQL};"),
            params![status.as_str()],
        )
    }

    fn list_in_range(&self, start: i64, end: i64) -> RepoResult<Vec<Incident>> {
        self.query_incidents(
            &format!(
                "{INCIDENT_SELECT_SQL}
                 WHERE timestamp >= ?1 AND timestamp <= ?2
                 {INCIDENT_ORDER_SQL};"
            ),
            params![start, end],
        )
    }

    fn list_recent(&self, limit: u32) -> RepoResult<Vec<Incident>> {
        self.query_incidents(
            &format!("{INCIDENT_SELECT_SQL} {INCIDENT_ORDER_SQL} LIMIT ?1;"),
            params![i64::from(limit)],
        )
    }

    fn count_for_user_in_range(&self, user_id: &str, start: i64, end: i64) -> RepoResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM incidents
             WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3;",
            params![user_id, start, end],
        )
    }

    fn count_all(&self) -> RepoResult<u32> {
        self.count("SELECT COUNT(*) FROM incidents;", [])
    }

    fn count_in_range(&self, start: i64, end: i64) -> RepoResult<u32> {
        self.count(
            "SELECT COUNT(*) FROM incidents WHERE timestamp >= ?1 AND timestamp <= ?2;",
            params![start, end],
        )
    }

    fn severity_counts_in_range(
        &self,
        start: i64,
        end: i64,
    ) -> RepoResult<BTreeMap<IncidentSeverity, u32>> {
        let mut counts: BTreeMap<IncidentSeverity, u32> = IncidentSeverity::ALL
            .iter()
            .map(|severity| (*severity, 0))
            .collect();

        let mut stmt = self.conn.prepare(
            "SELECT severity, COUNT(*) FROM incidents
             WHERE timestamp >= ?1 AND timestamp <= ?2
             GROUP BY severity;",
        )?;
        let mut rows = stmt.query(params![start, end])?;
        while let Some(row) = rows.next()? {
            let severity_text: String = row.get(0)?;
            let severity = parse_severity(&severity_text)?;
            counts.insert(severity, row.get::<_, u32>(1)?);
        }
        Ok(counts)
    }
}

fn parse_severity(value: &str) -> RepoResult<IncidentSeverity> {
    IncidentSeverity::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid severity `{value}` in incidents.severity"))
    })
}

fn parse_incident_row(row: &Row<'_>) -> RepoResult<Incident> {
    let severity_text: String = row.get("severity")?;
    let status_text: String = row.get("status")?;
    let status = IncidentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in incidents.status"))
    })?;

    Ok(Incident {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        description: row.get("description")?,
        timestamp: row.get("timestamp")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        location: row.get("location")?,
        photo_path: row.get("photo_path")?,
        severity: parse_severity(&severity_text)?,
        status,
    })
}
