//! Profile photo use case.
//!
//! # Invariants
//! - Photos land at `profile_photos/{user_id}/profile_{ts}.jpg`.
//! - The download URL is merged into `users/{id}.profilePhotoUrl`.
//! - Photos that cannot reach storage are queued, not dropped.

use super::audit::{metadata, AuditAction, AuditLogger};
use crate::backend::collections::{PROFILE_PHOTOS_PATH, PROFILE_PHOTO_FIELD, USERS};
use crate::backend::{BackendError, ObjectStorage};
use crate::config::AppSettings;
use crate::logging::redact_id;
use crate::repo::upload_repo::UploadTarget;
use crate::sync::{SaveOutcome, SyncError, SyncedStore};
use crate::time::now_epoch_ms;
use log::{info, warn};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const PHOTO_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug)]
pub enum ProfileServiceError {
    InvalidInput(String),
    PhotoTooLarge { size_bytes: usize, limit_bytes: usize },
    /// Storage refused the upload; retrying will not help.
    Upload(BackendError),
    Sync(SyncError),
}

impl Display for ProfileServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::PhotoTooLarge {
                size_bytes,
                limit_bytes,
            } => write!(
                f,
                "profile photo of {size_bytes} bytes exceeds limit of {limit_bytes} bytes"
            ),
            Self::Upload(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProfileServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Upload(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SyncError> for ProfileServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilePhotoUpload {
    Uploaded { url: String, outcome: SaveOutcome },
    /// Bytes are kept locally until the next upload flush.
    Queued { object_path: String, code: String },
}

pub struct ProfileService<'conn> {
    store: SyncedStore<'conn>,
    storage: Arc<dyn ObjectStorage>,
    audit: AuditLogger<'conn>,
    settings: AppSettings,
}

impl<'conn> ProfileService<'conn> {
    pub fn new(
        store: SyncedStore<'conn>,
        storage: Arc<dyn ObjectStorage>,
        settings: AppSettings,
    ) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self {
            store,
            storage,
            audit,
            settings,
        }
    }

    pub fn upload_profile_photo(
        &self,
        user_id: &str,
        photo: &[u8],
    ) -> Result<ProfilePhotoUpload, ProfileServiceError> {
        self.upload_profile_photo_at(user_id, photo, now_epoch_ms())
    }

    pub fn upload_profile_photo_at(
        &self,
        user_id: &str,
        photo: &[u8],
        now: i64,
    ) -> Result<ProfilePhotoUpload, ProfileServiceError> {
        let user_id = user_id.trim();
        if user_id.is_empty() || photo.is_empty() {
            return Err(ProfileServiceError::InvalidInput(
                "user_id and photo bytes are required".to_string(),
            ));
        }
        let limit_bytes = self.settings.max_photo_size_bytes();
        if photo.len() > limit_bytes {
            return Err(ProfileServiceError::PhotoTooLarge {
                size_bytes: photo.len(),
                limit_bytes,
            });
        }

        let object_path = format!("{PROFILE_PHOTOS_PATH}/{user_id}/profile_{now}.jpg");
        let upload = match self
            .storage
            .put_object(&object_path, photo, PHOTO_CONTENT_TYPE)
        {
            Ok(url) => {
                let mut fields = Map::new();
                fields.insert(PROFILE_PHOTO_FIELD.to_string(), Value::String(url.clone()));
                fields.insert("updatedAt".to_string(), Value::from(now));
                let outcome = self.store.merge_remote(USERS, user_id, fields)?;
                ProfilePhotoUpload::Uploaded { url, outcome }
            }
            Err(err) if err.retryable => {
                let target = UploadTarget::new(USERS, user_id, PROFILE_PHOTO_FIELD);
                self.store
                    .queue_upload(&object_path, PHOTO_CONTENT_TYPE, photo, &target)?;
                ProfilePhotoUpload::Queued {
                    object_path,
                    code: err.code,
                }
            }
            Err(err) => {
                warn!(
                    "event=profile_photo module=profile status=error error_code={}",
                    err.code
                );
                return Err(ProfileServiceError::Upload(err));
            }
        };

        self.audit.record(
            AuditAction::ProfilePhotoUpdated,
            user_id,
            Some(user_id),
            metadata([(
                "state",
                match &upload {
                    ProfilePhotoUpload::Uploaded { .. } => "uploaded",
                    ProfilePhotoUpload::Queued { .. } => "queued",
                },
            )]),
        );
        info!(
            "event=profile_photo module=profile status=ok user={} queued={} size_bytes={}",
            redact_id(user_id),
            matches!(upload, ProfilePhotoUpload::Queued { .. }),
            photo.len()
        );
        Ok(upload)
    }
}
