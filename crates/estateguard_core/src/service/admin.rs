//! Administrator dashboard and management use cases.
//!
//! # Responsibility
//! - Aggregate workforce and incident figures from the local cache.
//! - Deactivate users and maintain shared app settings.
//!
//! # Invariants
//! - Dashboard figures are computed from cached data only.
//! - Settings reads never fail; defaults apply when the backend is unreachable.

use super::audit::{metadata, AuditAction, AuditLogger};
use crate::backend::collections::{APP_CONFIG_DOC, SETTINGS};
use crate::config::{AppSettings, CoreConfig};
use crate::logging::log_text;
use crate::model::clock::ClockStatus;
use crate::model::incident::{Incident, IncidentSeverity};
use crate::model::time_entry::TimeEntryType;
use crate::model::user::User;
use crate::repo::incident_repo::IncidentRepository;
use crate::repo::time_entry_repo::TimeEntryRepository;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use crate::sync::{SaveOutcome, SyncError, SyncedStore};
use crate::time::{local_day_bounds_ms, now_epoch_ms};
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum AdminServiceError {
    Sync(SyncError),
    Encode(String),
}

impl Display for AdminServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(err) => write!(f, "{err}"),
            Self::Encode(message) => write!(f, "settings encoding failed: {message}"),
        }
    }
}

impl Error for AdminServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sync(err) => Some(err),
            Self::Encode(_) => None,
        }
    }
}

impl From<SyncError> for AdminServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<RepoError> for AdminServiceError {
    fn from(value: RepoError) -> Self {
        Self::Sync(SyncError::Repo(value))
    }
}

/// A guard whose latest entry is a clock-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOnDuty {
    pub user_id: String,
    pub name: String,
    pub clocked_in_at: i64,
    /// Shift has run longer than the auto clock-out window.
    pub overdue: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub total_users: u32,
    pub total_incidents: u32,
    pub today_incidents: u32,
    pub active_guards: u32,
    pub guards_on_duty: Vec<GuardOnDuty>,
    pub overdue_guards: u32,
    pub recent_incidents: Vec<Incident>,
}

pub struct AdminService<'conn> {
    store: SyncedStore<'conn>,
    audit: AuditLogger<'conn>,
    recent_limit: u32,
}

impl<'conn> AdminService<'conn> {
    pub fn new(store: SyncedStore<'conn>, config: &CoreConfig) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            audit,
            recent_limit: config.recent_incident_limit,
        }
    }

    /// Builds the dashboard as seen at `now`.
    pub fn dashboard(&self, now: i64) -> Result<DashboardSnapshot, AdminServiceError> {
        let settings = self.load_settings();
        let overdue_after_ms = settings.auto_clock_out_ms();
        let users = self.store.users();
        let incidents = self.store.incidents();
        let entries = self.store.time_entries();

        let guards: Vec<User> = users
            .list_active_users()?
            .into_iter()
            .filter(User::is_guard)
            .collect();

        let mut guards_on_duty = Vec::new();
        for guard in &guards {
            let last = entries.last_for_user(&guard.id)?;
            if ClockStatus::from_last_entry(last.as_ref()) != ClockStatus::ClockedIn {
                continue;
            }
            if let Some(entry) = last.filter(|entry| entry.kind == TimeEntryType::ClockIn) {
                guards_on_duty.push(GuardOnDuty {
                    user_id: guard.id.clone(),
                    name: guard.name.clone(),
                    clocked_in_at: entry.timestamp,
                    overdue: now.saturating_sub(entry.timestamp) > overdue_after_ms,
                });
            }
        }
        let overdue_guards = guards_on_duty.iter().filter(|duty| duty.overdue).count() as u32;

        let (day_start, day_end) = local_day_bounds_ms(now);
        let snapshot = DashboardSnapshot {
            total_users: users.count_users()?,
            total_incidents: incidents.count_all()?,
            today_incidents: incidents.count_in_range(day_start, day_end)?,
            active_guards: guards.len() as u32,
            guards_on_duty,
            overdue_guards,
            recent_incidents: incidents.list_recent(self.recent_limit)?,
        };
        info!(
            "event=admin_dashboard module=admin status=ok users={} incidents={} on_duty={} overdue={}",
            snapshot.total_users,
            snapshot.total_incidents,
            snapshot.guards_on_duty.len(),
            snapshot.overdue_guards
        );
        Ok(snapshot)
    }

    /// Incident counts per severity within inclusive `[start, end]`.
    pub fn incident_stats(
        &self,
        start: i64,
        end: i64,
    ) -> Result<BTreeMap<IncidentSeverity, u32>, AdminServiceError> {
        Ok(self.store.incidents().severity_counts_in_range(start, end)?)
    }

    pub fn active_users(&self) -> Result<Vec<User>, AdminServiceError> {
        Ok(self.store.users().list_active_users()?)
    }

    /// Every cached profile, deactivated ones included, sorted by name.
    pub fn all_users(&self) -> Result<Vec<User>, AdminServiceError> {
        Ok(self.store.users().list_users()?)
    }

    pub fn deactivate_user(
        &self,
        user_id: &str,
        actor_id: &str,
    ) -> Result<SaveOutcome, AdminServiceError> {
        let outcome = self.store.deactivate_user(user_id)?;
        self.audit.record(
            AuditAction::UserDeactivated,
            actor_id,
            Some(user_id),
            metadata([]),
        );
        info!(
            "event=user_deactivate module=admin status=ok synced={}",
            outcome.is_synced()
        );
        Ok(outcome)
    }

    /// Reads `settings/app_config`, falling back to defaults.
    pub fn load_settings(&self) -> AppSettings {
        match self
            .store
            .documents()
            .get_document(SETTINGS, APP_CONFIG_DOC)
        {
            Ok(Some(document)) => serde_json::from_value(document).unwrap_or_else(|err| {
                warn!(
                    "event=settings_load module=admin status=error error_code=invalid_settings error={}",
                    log_text(&err)
                );
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(err) => {
                warn!(
                    "event=settings_load module=admin status=fallback error_code={}",
                    err.code
                );
                AppSettings::default()
            }
        }
    }

    /// Writes `settings` as a full `settings/app_config` document.
    ///
    /// Fields this build does not model are carried over when the current
    /// document can be read. The write is a `set`, so a queued copy lands on
    /// replay even if the document did not exist yet.
    pub fn update_settings(
        &self,
        settings: &AppSettings,
        actor_id: &str,
    ) -> Result<SaveOutcome, AdminServiceError> {
        let Value::Object(fields) = serde_json::to_value(settings)
            .map_err(|err| AdminServiceError::Encode(err.to_string()))?
        else {
            return Err(AdminServiceError::Encode(
                "settings did not encode to an object".to_string(),
            ));
        };

        let mut document = match self
            .store
            .documents()
            .get_document(SETTINGS, APP_CONFIG_DOC)
        {
            Ok(Some(Value::Object(current))) => current,
            Ok(_) => Map::new(),
            Err(err) => {
                warn!(
                    "event=settings_update module=admin status=fallback error_code={}",
                    err.code
                );
                Map::new()
            }
        };
        document.extend(fields);
        document.insert("updatedAt".to_string(), Value::from(now_epoch_ms()));

        let outcome = self
            .store
            .push_remote(SETTINGS, APP_CONFIG_DOC, &Value::Object(document))?;
        self.audit.record(
            AuditAction::SettingsUpdated,
            actor_id,
            Some(APP_CONFIG_DOC),
            metadata([]),
        );
        info!(
            "event=settings_update module=admin status=ok synced={}",
            outcome.is_synced()
        );
        Ok(outcome)
    }
}
