//! Clock entry cache.
//!
//! # Invariants
//! - All list reads are ordered `timestamp DESC, id DESC`.
//! - Range bounds are inclusive on both ends.

use super::{bool_to_int, int_to_bool, RepoError, RepoResult};
use crate::model::time_entry::{TimeEntry, TimeEntryType};
use rusqlite::{params, Connection, Params, Row};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    timestamp,
    type,
    latitude,
    longitude,
    location,
    qr_code_data,
    is_manual_entry
FROM time_entries";

const ENTRY_ORDER_SQL: &str = "ORDER BY timestamp DESC, id DESC";

/// Repository interface for cached clock entries.
pub trait TimeEntryRepository {
    fn upsert_entry(&self, entry: &TimeEntry) -> RepoResult<()>;
    fn get_entry(&self, id: &str) -> RepoResult<Option<TimeEntry>>;
    fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<TimeEntry>>;
    fn last_for_user(&self, user_id: &str) -> RepoResult<Option<TimeEntry>>;
    fn list_for_user_in_range(
        &self,
        user_id: &str,
        start: i64,
        end: i64,
    ) -> RepoResult<Vec<TimeEntry>>;
    fn list_all(&self) -> RepoResult<Vec<TimeEntry>>;
    /// Most recent entry of `kind` for the user at or after `since`.
    fn latest_of_type_since(
        &self,
        user_id: &str,
        kind: TimeEntryType,
        since: i64,
    ) -> RepoResult<Option<TimeEntry>>;
}

/// SQLite-backed clock entry repository.
pub struct SqliteTimeEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTimeEntryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_entries(&self, sql: &str, params: impl Params) -> RepoResult<Vec<TimeEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(row)?);
        }
        Ok(entries)
    }
}

impl TimeEntryRepository for SqliteTimeEntryRepository<'_> {
    fn upsert_entry(&self, entry: &TimeEntry) -> RepoResult<()> {
        entry.validate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO time_entries (
                id,
                user_id,
                timestamp,
                type,
                latitude,
                longitude,
                location,
                qr_code_data,
                is_manual_entry
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                entry.id.as_str(),
                entry.user_id.as_str(),
                entry.timestamp,
                entry.kind.as_str(),
                entry.latitude,
                entry.longitude,
                entry.location.as_deref(),
                entry.qr_code_data.as_deref(),
                bool_to_int(entry.is_manual_entry),
            ],
        )?;
        Ok(())
    }

    fn get_entry(&self, id: &str) -> RepoResult<Option<TimeEntry>> {
        let entries =
            self.query_entries(&format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"), params![id])?;
        Ok(entries.into_iter().next())
    }

    fn list_for_user(&self, user_id: &str) -> RepoResult<Vec<TimeEntry>> {
        self.query_entries(
            &format!("{ENTRY_SELECT_SQL} WHERE user_id = ?1 {ENTRY_ORDER_SQL};"),
            params![user_id],
        )
    }

    fn last_for_user(&self, user_id: &str) -> RepoResult<Option<TimeEntry>> {
        let entries = self.query_entries(
            &format!("{ENTRY_SELECT_SQL} WHERE user_id = ?1 {ENTRY_ORDER_SQL} LIMIT 1;"),
            params![user_id],
        )?;
        Ok(entries.into_iter().next())
    }

    fn list_for_user_in_range(
        &self,
        user_id: &str,
        start: i64,
        end: i64,
    ) -> RepoResult<Vec<TimeEntry>> {
        self.query_entries(
            &format!(
                "{ENTRY_SELECT_SQL}
                 WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
                 {ENTRY_ORDER_SQL};"
            ),
            params![user_id, start, end],
        )
    }

    fn list_all(&self) -> RepoResult<Vec<TimeEntry>> {
        self.query_entries(&format!("{ENTRY_SELECT_SQL} {ENTRY_ORDER_SQL};"), [])
    }

    fn latest_of_type_since(
        &self,
        user_id: &str,
        kind: TimeEntryType,
        since: i64,
    ) -> RepoResult<Option<TimeEntry>> {
        let entries = self.query_entries(
            &format!(
                "{ENTRY_SELECT_SQL}
                 WHERE user_id = ?1 AND type = ?2 AND timestamp >= ?3
                 {ENTRY_ORDER_SQL} LIMIT 1;"
            ),
            params![user_id, kind.as_str(), since],
        )?;
        Ok(entries.into_iter().next())
    }
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<TimeEntry> {
    let type_text: String = row.get("type")?;
    let kind = TimeEntryType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid entry type `{type_text}` in time_entries.type"
        ))
    })?;

    Ok(TimeEntry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        timestamp: row.get("timestamp")?,
        kind,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        location: row.get("location")?,
        qr_code_data: row.get("qr_code_data")?,
        is_manual_entry: int_to_bool(
            row.get("is_manual_entry")?,
            "time_entries.is_manual_entry",
        )?,
    })
}
