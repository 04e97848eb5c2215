//! External backend-as-a-service surface.
//!
//! # Responsibility
//! - Describe the document store, auth, object storage and push messaging
//!   calls core needs, without binding to one vendor SDK.
//! - Carry backend failures as stable error envelopes.
//!
//! # Invariants
//! - Trait methods are synchronous; host adapters bridge async SDK calls.
//! - Implementations must be `Send + Sync` so handles can be shared.
//! - `set_document` replaces the whole document (last write wins).

pub mod memory;
pub mod offline;
mod query;

pub use query::{DocumentQuery, FieldFilter, SortDirection};

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Remote collection and storage path names.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TIME_ENTRIES: &str = "timeEntries";
    pub const INCIDENTS: &str = "incidents";
    pub const SETTINGS: &str = "settings";
    pub const AUDIT_LOGS: &str = "auditLogs";

    /// Document ID of the shared app configuration in `settings`.
    pub const APP_CONFIG_DOC: &str = "app_config";

    pub const INCIDENT_PHOTOS_PATH: &str = "incident_photos";
    pub const PROFILE_PHOTOS_PATH: &str = "profile_photos";

    /// Incident field holding the photo download URL.
    pub const INCIDENT_PHOTO_FIELD: &str = "photoPath";
    /// User field holding the profile photo download URL.
    pub const PROFILE_PHOTO_FIELD: &str = "profilePhotoUrl";
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Which backend capability produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendService {
    Documents,
    Auth,
    Storage,
    Messaging,
}

impl BackendService {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Auth => "auth",
            Self::Storage => "storage",
            Self::Messaging => "messaging",
        }
    }
}

/// Stable error envelope for backend calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub service: BackendService,
    /// Machine-readable code, e.g. `backend_unavailable`, `invalid_credentials`.
    pub code: String,
    pub message: String,
    /// Whether retrying the same call later may succeed.
    pub retryable: bool,
}

impl BackendError {
    pub fn new(
        service: BackendService,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            service,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Transient connectivity failure.
    pub fn unavailable(service: BackendService) -> Self {
        Self::new(
            service,
            "backend_unavailable",
            "Backend is not reachable.",
            true,
        )
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} backend error [{}]: {}",
            self.service.as_str(),
            self.code,
            self.message
        )
    }
}

impl Error for BackendError {}

/// One document returned by a read.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

/// Authenticated backend account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAccount {
    pub uid: String,
    pub email: String,
}

/// Outbound push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Device registration token of the recipient.
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Remote document database.
pub trait DocumentStore: Send + Sync {
    fn set_document(&self, collection: &str, id: &str, data: &Value) -> BackendResult<()>;
    fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Value>>;
    /// Merges `fields` into an existing document.
    fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> BackendResult<()>;
    fn query(&self, collection: &str, query: &DocumentQuery)
        -> BackendResult<Vec<StoredDocument>>;
}

/// Remote email/password authentication.
pub trait AuthBackend: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthAccount>;
    fn create_account(&self, email: &str, password: &str) -> BackendResult<AuthAccount>;
    fn sign_out(&self) -> BackendResult<()>;
    fn current_account(&self) -> BackendResult<Option<AuthAccount>>;
}

/// Remote blob storage.
pub trait ObjectStorage: Send + Sync {
    /// Uploads bytes and returns a download URL.
    fn put_object(&self, path: &str, bytes: &[u8], content_type: &str) -> BackendResult<String>;
}

/// Remote push delivery.
pub trait PushMessaging: Send + Sync {
    fn send(&self, message: &PushMessage) -> BackendResult<()>;
}

/// Shared handles to every backend capability.
#[derive(Clone)]
pub struct BackendHandle {
    pub documents: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthBackend>,
    pub storage: Arc<dyn ObjectStorage>,
    pub messaging: Arc<dyn PushMessaging>,
}

impl BackendHandle {
    /// Builds a handle where one value implements every capability.
    pub fn from_shared<T>(backend: Arc<T>) -> Self
    where
        T: DocumentStore + AuthBackend + ObjectStorage + PushMessaging + 'static,
    {
        Self {
            documents: backend.clone(),
            auth: backend.clone(),
            storage: backend.clone(),
            messaging: backend,
        }
    }
}
