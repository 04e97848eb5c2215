//! Incident reporting and triage use cases.
//!
//! # Responsibility
//! - Turn a guard's draft into a persisted incident with optional photo.
//! - Move incidents through their status lifecycle and notify the reporter.
//!
//! # Invariants
//! - Photo problems never block an incident; they surface as warnings.
//! - A photo that could not reach storage is queued, never dropped.
//! - New incidents always start as `REPORTED`.
//! - Setting the current status again is a no-op.

use super::audit::{metadata, AuditAction, AuditLogger};
use super::notify::Notifier;
use crate::backend::collections::{INCIDENTS, INCIDENT_PHOTOS_PATH, INCIDENT_PHOTO_FIELD};
use crate::backend::ObjectStorage;
use crate::config::AppSettings;
use crate::logging::{log_text, redact_id};
use crate::model::geo::{GeoPoint, LOCATION_UNAVAILABLE};
use crate::model::incident::{Incident, IncidentSeverity, IncidentStatus};
use crate::model::new_record_id;
use crate::model::ModelValidationError;
use crate::repo::incident_repo::IncidentRepository;
use crate::repo::upload_repo::UploadTarget;
use crate::repo::RepoError;
use crate::sync::{SaveOutcome, SyncError, SyncedStore};
use crate::time::{local_day_bounds_ms, now_epoch_ms};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const PHOTO_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug)]
pub enum IncidentServiceError {
    /// Shared settings have `maintenanceMode` switched on.
    MaintenanceMode,
    EmptyDescription,
    InvalidLocation(ModelValidationError),
    NotFound(String),
    Sync(SyncError),
}

impl Display for IncidentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaintenanceMode => write!(f, "incident reporting is paused for maintenance"),
            Self::EmptyDescription => write!(f, "incident description cannot be empty"),
            Self::InvalidLocation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "incident not found: {id}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IncidentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLocation(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SyncError> for IncidentServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<RepoError> for IncidentServiceError {
    fn from(value: RepoError) -> Self {
        Self::Sync(SyncError::Repo(value))
    }
}

/// Guard input for a new incident.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncidentDraft {
    pub description: String,
    pub severity: IncidentSeverity,
    pub location: Option<GeoPoint>,
    /// JPEG bytes captured by the host camera.
    pub photo: Option<Vec<u8>>,
}

/// Non-fatal problem encountered while submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentWarning {
    PhotoTooLarge { size_bytes: usize, limit_bytes: usize },
    /// Storage was unreachable; the photo is kept and uploaded on the next sync.
    PhotoQueued { code: String },
    PhotoUploadFailed { code: String },
}

impl Display for IncidentWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PhotoTooLarge {
                size_bytes,
                limit_bytes,
            } => write!(
                f,
                "photo skipped: {size_bytes} bytes exceeds limit of {limit_bytes} bytes"
            ),
            Self::PhotoQueued { code } => write!(f, "photo queued for upload: {code}"),
            Self::PhotoUploadFailed { code } => write!(f, "photo upload failed: {code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentSubmission {
    pub incident: Incident,
    pub outcome: SaveOutcome,
    pub warnings: Vec<IncidentWarning>,
    pub notified_admins: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub incident: Incident,
    pub previous: IncidentStatus,
    pub changed: bool,
    pub reporter_notified: bool,
}

/// Per-id result of a batch status update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStatusReport {
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub missing: Vec<String>,
}

pub struct IncidentService<'conn> {
    store: SyncedStore<'conn>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Notifier,
    audit: AuditLogger<'conn>,
    settings: AppSettings,
}

impl<'conn> IncidentService<'conn> {
    pub fn new(
        store: SyncedStore<'conn>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Notifier,
        settings: AppSettings,
    ) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            storage,
            notifier,
            audit,
            settings,
        }
    }

    pub fn submit_incident(
        &self,
        user_id: &str,
        draft: IncidentDraft,
    ) -> Result<IncidentSubmission, IncidentServiceError> {
        self.submit_incident_at(user_id, draft, now_epoch_ms())
    }

    /// Persists a new incident stamped `now`.
    ///
    /// HIGH and CRITICAL incidents alert active admins after saving.
    pub fn submit_incident_at(
        &self,
        user_id: &str,
        draft: IncidentDraft,
        now: i64,
    ) -> Result<IncidentSubmission, IncidentServiceError> {
        if self.settings.maintenance_mode {
            return Err(IncidentServiceError::MaintenanceMode);
        }
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(IncidentServiceError::EmptyDescription);
        }
        if let Some(point) = &draft.location {
            point
                .validate()
                .map_err(IncidentServiceError::InvalidLocation)?;
        }

        let mut incident = Incident::new(new_record_id(), user_id, description, now);
        incident.severity = draft.severity;
        match draft.location {
            Some(point) => {
                incident.latitude = Some(point.latitude);
                incident.longitude = Some(point.longitude);
                incident.location = Some(point.label());
            }
            None => incident.location = Some(LOCATION_UNAVAILABLE.to_string()),
        }

        let mut warnings = Vec::new();
        if let Some(photo) = draft.photo.as_deref() {
            match self.upload_photo(&incident.id, photo, now) {
                Ok(url) => incident.photo_path = Some(url),
                Err(warning) => {
                    warn!(
                        "event=incident_photo module=incident status=skipped reason={}",
                        warning
                    );
                    warnings.push(warning);
                }
            }
        }

        let outcome = self.store.save_incident(&incident)?;
        self.audit.record(
            AuditAction::IncidentCreated,
            user_id,
            Some(&incident.id),
            metadata([("severity", incident.severity.as_str())]),
        );
        let notified_admins = if incident.severity.requires_escalation() {
            self.notifier.notify_admins(&incident)
        } else {
            0
        };
        info!(
            "event=incident_submit module=incident status=ok user={} incident={} severity={} photo={} synced={} warnings={}",
            redact_id(user_id),
            redact_id(&incident.id),
            incident.severity.as_str(),
            incident.photo_path.is_some(),
            outcome.is_synced(),
            warnings.len()
        );

        Ok(IncidentSubmission {
            incident,
            outcome,
            warnings,
            notified_admins,
        })
    }

    /// Moves an incident to `status`; notifies the reporter on `RESOLVED`.
    pub fn update_status(
        &self,
        incident_id: &str,
        status: IncidentStatus,
        actor_id: &str,
    ) -> Result<StatusChange, IncidentServiceError> {
        let mut incident = self
            .store
            .incidents()
            .get_incident(incident_id)?
            .ok_or_else(|| IncidentServiceError::NotFound(incident_id.to_string()))?;
        let previous = incident.status;
        if previous == status {
            return Ok(StatusChange {
                incident,
                previous,
                changed: false,
                reporter_notified: false,
            });
        }

        incident.status = status;
        self.store.save_incident(&incident)?;
        self.audit.record(
            AuditAction::IncidentStatusChanged,
            actor_id,
            Some(&incident.id),
            metadata([
                ("oldStatus", previous.as_str()),
                ("newStatus", status.as_str()),
            ]),
        );
        let reporter_notified =
            status == IncidentStatus::Resolved && self.notifier.notify_resolved(&incident);
        info!(
            "event=incident_status module=incident status=ok incident={} from={} to={}",
            redact_id(&incident.id),
            previous.as_str(),
            status.as_str()
        );

        Ok(StatusChange {
            incident,
            previous,
            changed: true,
            reporter_notified,
        })
    }

    /// Applies `status` to every id; unknown ids are reported, not fatal.
    pub fn batch_update_status(
        &self,
        incident_ids: &[String],
        status: IncidentStatus,
        actor_id: &str,
    ) -> Result<BatchStatusReport, IncidentServiceError> {
        let mut report = BatchStatusReport::default();
        for incident_id in incident_ids {
            match self.update_status(incident_id, status, actor_id) {
                Ok(change) if change.changed => report.updated.push(incident_id.clone()),
                Ok(_) => report.unchanged.push(incident_id.clone()),
                Err(IncidentServiceError::NotFound(_)) => report.missing.push(incident_id.clone()),
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    pub fn get_incident(&self, incident_id: &str) -> Result<Option<Incident>, IncidentServiceError> {
        Ok(self.store.incidents().get_incident(incident_id)?)
    }

    pub fn incidents_for_user(&self, user_id: &str) -> Result<Vec<Incident>, IncidentServiceError> {
        Ok(self.store.incidents().list_for_user(user_id)?)
    }

    pub fn all_incidents(&self) -> Result<Vec<Incident>, IncidentServiceError> {
        Ok(self.store.incidents().list_all()?)
    }

    pub fn incidents_by_status(
        &self,
        status: IncidentStatus,
    ) -> Result<Vec<Incident>, IncidentServiceError> {
        Ok(self.store.incidents().list_by_status(status)?)
    }

    pub fn incidents_in_range(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<Incident>, IncidentServiceError> {
        Ok(self.store.incidents().list_in_range(start, end)?)
    }

    /// Incidents the user reported during the current local day.
    pub fn today_count_for_user(&self, user_id: &str) -> Result<u32, IncidentServiceError> {
        self.today_count_for_user_at(user_id, now_epoch_ms())
    }

    pub fn today_count_for_user_at(
        &self,
        user_id: &str,
        now: i64,
    ) -> Result<u32, IncidentServiceError> {
        let (day_start, day_end) = local_day_bounds_ms(now);
        Ok(self
            .store
            .incidents()
            .count_for_user_in_range(user_id, day_start, day_end)?)
    }

    fn upload_photo(
        &self,
        incident_id: &str,
        photo: &[u8],
        now: i64,
    ) -> Result<String, IncidentWarning> {
        let limit_bytes = self.settings.max_photo_size_bytes();
        if photo.len() > limit_bytes {
            return Err(IncidentWarning::PhotoTooLarge {
                size_bytes: photo.len(),
                limit_bytes,
            });
        }
        let path = format!("{INCIDENT_PHOTOS_PATH}/incident_{incident_id}_{now}.jpg");
        let err = match self.storage.put_object(&path, photo, PHOTO_CONTENT_TYPE) {
            Ok(url) => return Ok(url),
            Err(err) => err,
        };
        if !err.retryable {
            return Err(IncidentWarning::PhotoUploadFailed { code: err.code });
        }

        let target = UploadTarget::new(INCIDENTS, incident_id, INCIDENT_PHOTO_FIELD);
        match self
            .store
            .queue_upload(&path, PHOTO_CONTENT_TYPE, photo, &target)
        {
            Ok(()) => Err(IncidentWarning::PhotoQueued { code: err.code }),
            Err(queue_err) => {
                warn!(
                    "event=incident_photo module=incident status=error error_code=upload_queue_failed error={}",
                    log_text(&queue_err)
                );
                Err(IncidentWarning::PhotoUploadFailed { code: err.code })
            }
        }
    }
}
