//! Clock in/out use cases.
//!
//! # Responsibility
//! - Derive a guard's clock status from cached entries.
//! - Record QR and manual clock entries through the synced store.
//!
//! # Invariants
//! - The recorded entry type is always the opposite of the current status.
//! - A missing position never blocks clocking.
//! - Two entries of the same type closer than the minimum interval are rejected.

use super::audit::{metadata, AuditAction, AuditLogger};
use crate::config::{AppSettings, CoreConfig};
use crate::logging::redact_id;
use crate::model::clock::{pair_shifts, ClockStatus, Shift};
use crate::model::geo::GeoPoint;
use crate::model::new_record_id;
use crate::model::time_entry::{TimeEntry, TimeEntryType};
use crate::model::ModelValidationError;
use crate::repo::time_entry_repo::TimeEntryRepository;
use crate::repo::RepoError;
use crate::sync::{SaveOutcome, SyncError, SyncedStore};
use crate::time::{format_local, now_epoch_ms};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NO_ACTIVITY: &str = "No recent activity";

#[derive(Debug)]
pub enum ClockServiceError {
    /// Shared settings have `maintenanceMode` switched on.
    MaintenanceMode,
    EmptyQrPayload,
    /// Same entry type already recorded inside the minimum interval.
    DuplicateEntry {
        kind: TimeEntryType,
        previous_at: i64,
    },
    InvalidLocation(ModelValidationError),
    Sync(SyncError),
}

impl Display for ClockServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaintenanceMode => write!(f, "clocking is paused for maintenance"),
            Self::EmptyQrPayload => write!(f, "QR payload cannot be empty"),
            Self::DuplicateEntry { kind, previous_at } => write!(
                f,
                "{} already recorded at {previous_at}; wait before clocking again",
                kind.as_str()
            ),
            Self::InvalidLocation(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ClockServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLocation(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SyncError> for ClockServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<RepoError> for ClockServiceError {
    fn from(value: RepoError) -> Self {
        Self::Sync(SyncError::Repo(value))
    }
}

/// How the guard proved presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockMethod {
    /// Raw payload decoded from a site QR code.
    Qr(String),
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockRequest {
    pub method: ClockMethod,
    pub location: Option<GeoPoint>,
}

impl ClockRequest {
    pub fn qr(payload: impl Into<String>, location: Option<GeoPoint>) -> Self {
        Self {
            method: ClockMethod::Qr(payload.into()),
            location,
        }
    }

    pub fn manual(location: Option<GeoPoint>) -> Self {
        Self {
            method: ClockMethod::Manual,
            location,
        }
    }
}

/// Recorded entry plus the status it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockRecord {
    pub entry: TimeEntry,
    pub status: ClockStatus,
    pub outcome: SaveOutcome,
}

pub struct ClockService<'conn> {
    store: SyncedStore<'conn>,
    audit: AuditLogger<'conn>,
    min_interval_ms: i64,
    maintenance_mode: bool,
}

impl<'conn> ClockService<'conn> {
    pub fn new(store: SyncedStore<'conn>, config: &CoreConfig) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            audit,
            min_interval_ms: config.min_clock_interval_ms,
            maintenance_mode: false,
        }
    }

    /// Applies shared settings; maintenance mode blocks new entries.
    pub fn with_settings(mut self, settings: &AppSettings) -> Self {
        self.maintenance_mode = settings.maintenance_mode;
        self
    }

    pub fn clock_status(&self, user_id: &str) -> Result<ClockStatus, ClockServiceError> {
        let last = self.store.time_entries().last_for_user(user_id)?;
        Ok(ClockStatus::from_last_entry(last.as_ref()))
    }

    /// Human-readable summary of the latest entry, in local time.
    pub fn last_activity(&self, user_id: &str) -> Result<String, ClockServiceError> {
        let last = self.store.time_entries().last_for_user(user_id)?;
        Ok(match last {
            Some(entry) => {
                let verb = match entry.kind {
                    TimeEntryType::ClockIn => "Clocked in",
                    TimeEntryType::ClockOut => "Clocked out",
                };
                format!("{verb} at {}", format_local(entry.timestamp))
            }
            None => NO_ACTIVITY.to_string(),
        })
    }

    /// Records the next clock entry at the current time.
    pub fn record_clock(
        &self,
        user_id: &str,
        request: ClockRequest,
    ) -> Result<ClockRecord, ClockServiceError> {
        self.record_clock_at(user_id, request, now_epoch_ms())
    }

    /// Records the next clock entry stamped `now`.
    pub fn record_clock_at(
        &self,
        user_id: &str,
        request: ClockRequest,
        now: i64,
    ) -> Result<ClockRecord, ClockServiceError> {
        if self.maintenance_mode {
            return Err(ClockServiceError::MaintenanceMode);
        }
        let (qr_code_data, is_manual_entry) = match request.method {
            ClockMethod::Qr(payload) => {
                let payload = payload.trim().to_string();
                if payload.is_empty() {
                    return Err(ClockServiceError::EmptyQrPayload);
                }
                (Some(payload), false)
            }
            ClockMethod::Manual => (None, true),
        };
        if let Some(point) = &request.location {
            point.validate().map_err(ClockServiceError::InvalidLocation)?;
        }

        let kind = self.clock_status(user_id)?.next_entry_type();
        self.reject_rapid_duplicate(user_id, kind, now)?;

        let mut entry = TimeEntry::new(new_record_id(), user_id, now, kind);
        if let Some(point) = request.location {
            entry = entry.with_position(point);
        }
        entry.qr_code_data = qr_code_data;
        entry.is_manual_entry = is_manual_entry;

        let outcome = self.store.save_time_entry(&entry)?;
        self.audit.record(
            AuditAction::TimeEntryCreated,
            user_id,
            Some(&entry.id),
            metadata([
                ("type", kind.as_str()),
                ("location", entry.location.as_deref().unwrap_or_default()),
            ]),
        );
        info!(
            "event=clock_record module=clock status=ok user={} entry={} type={} manual={} located={} synced={}",
            redact_id(user_id),
            redact_id(&entry.id),
            kind.as_str(),
            is_manual_entry,
            entry.location.is_some(),
            outcome.is_synced()
        );

        let status = ClockStatus::from_last_entry(Some(&entry));
        Ok(ClockRecord {
            entry,
            status,
            outcome,
        })
    }

    pub fn entries_for_user(&self, user_id: &str) -> Result<Vec<TimeEntry>, ClockServiceError> {
        Ok(self.store.time_entries().list_for_user(user_id)?)
    }

    /// Entries within inclusive `[start, end]`, newest first.
    pub fn entries_in_range(
        &self,
        user_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<TimeEntry>, ClockServiceError> {
        Ok(self
            .store
            .time_entries()
            .list_for_user_in_range(user_id, start, end)?)
    }

    /// Shifts reconstructed from entries within `[start, end]`, oldest first.
    pub fn shifts(
        &self,
        user_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Shift>, ClockServiceError> {
        let entries = self.entries_in_range(user_id, start, end)?;
        Ok(pair_shifts(&entries))
    }

    fn reject_rapid_duplicate(
        &self,
        user_id: &str,
        kind: TimeEntryType,
        now: i64,
    ) -> Result<(), ClockServiceError> {
        if self.min_interval_ms <= 0 {
            return Ok(());
        }
        let since = now.saturating_sub(self.min_interval_ms);
        if let Some(previous) = self
            .store
            .time_entries()
            .latest_of_type_since(user_id, kind, since)?
        {
            warn!(
                "event=clock_record module=clock status=rejected error_code=duplicate_entry type={}",
                kind.as_str()
            );
            return Err(ClockServiceError::DuplicateEntry {
                kind,
                previous_at: previous.timestamp,
            });
        }
        Ok(())
    }
}
