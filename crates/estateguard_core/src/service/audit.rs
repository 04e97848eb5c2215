//! Audit trail writer.
//!
//! # Invariants
//! - Audit failures are logged and never propagate to the calling use case.
//! - Audit documents carry no free text beyond the supplied metadata.

use crate::backend::collections::AUDIT_LOGS;
use crate::logging::log_text;
use crate::model::new_record_id;
use crate::sync::{SaveOutcome, SyncedStore};
use crate::time::now_epoch_ms;
use log::warn;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    UserCreated,
    UserSignedIn,
    UserSignedOut,
    UserDeactivated,
    TimeEntryCreated,
    IncidentCreated,
    IncidentStatusChanged,
    SettingsUpdated,
    ProfilePhotoUpdated,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserCreated => "USER_CREATED",
            Self::UserSignedIn => "USER_SIGNED_IN",
            Self::UserSignedOut => "USER_SIGNED_OUT",
            Self::UserDeactivated => "USER_DEACTIVATED",
            Self::TimeEntryCreated => "TIME_ENTRY_CREATED",
            Self::IncidentCreated => "INCIDENT_CREATED",
            Self::IncidentStatusChanged => "INCIDENT_STATUS_CHANGED",
            Self::SettingsUpdated => "SETTINGS_UPDATED",
            Self::ProfilePhotoUpdated => "PROFILE_PHOTO_UPDATED",
        }
    }
}

/// Writes `auditLogs/{id}` documents through the synced store.
#[derive(Clone)]
pub struct AuditLogger<'conn> {
    store: SyncedStore<'conn>,
}

impl<'conn> AuditLogger<'conn> {
    pub fn new(store: SyncedStore<'conn>) -> Self {
        Self { store }
    }

    /// Records one audit event and returns its document id.
    ///
    /// Returns `None` when the event could not be stored or queued.
    pub fn record(
        &self,
        action: AuditAction,
        user_id: &str,
        resource_id: Option<&str>,
        metadata: Map<String, Value>,
    ) -> Option<String> {
        let id = new_record_id();
        let document = json!({
            "action": action.as_str(),
            "userId": user_id,
            "resourceId": resource_id,
            "metadata": Value::Object(metadata),
            "timestamp": now_epoch_ms(),
        });

        match self.store.push_remote(AUDIT_LOGS, &id, &document) {
            Ok(SaveOutcome::Rejected { code }) => {
                warn!(
                    "event=audit_record module=audit status=error action={} error_code={}",
                    action.as_str(),
                    code
                );
                None
            }
            Ok(_) => Some(id),
            Err(err) => {
                warn!(
                    "event=audit_record module=audit status=error action={} error={}",
                    action.as_str(),
                    log_text(&err)
                );
                None
            }
        }
    }
}

/// Builds audit metadata from string pairs.
pub fn metadata<const N: usize>(pairs: [(&str, &str); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{metadata, AuditAction, AuditLogger};
    use crate::backend::collections::AUDIT_LOGS;
    use crate::backend::memory::MemoryBackend;
    use crate::db::open_db_in_memory;
    use crate::repo::outbox_repo::OutboxRepository;
    use crate::sync::SyncedStore;
    use std::sync::Arc;

    #[test]
    fn record_writes_document_with_metadata() {
        let conn = open_db_in_memory().expect("open db");
        let backend = Arc::new(MemoryBackend::new());
        let logger = AuditLogger::new(SyncedStore::new(&conn, backend.clone()));

        let id = logger
            .record(
                AuditAction::IncidentStatusChanged,
                "guard-1",
                Some("incident-1"),
                metadata([("oldStatus", "REPORTED"), ("newStatus", "RESOLVED")]),
            )
            .expect("audit should be recorded");

        let document = backend.document(AUDIT_LOGS, &id).expect("remote audit doc");
        assert_eq!(document["action"], "INCIDENT_STATUS_CHANGED");
        assert_eq!(document["resourceId"], "incident-1");
        assert_eq!(document["metadata"]["newStatus"], "RESOLVED");
    }

    #[test]
    fn record_queues_while_offline() {
        let conn = open_db_in_memory().expect("open db");
        let backend = Arc::new(MemoryBackend::new());
        backend.set_offline(true);
        let store = SyncedStore::new(&conn, backend.clone());
        let logger = AuditLogger::new(store.clone());

        let id = logger.record(AuditAction::UserSignedOut, "guard-1", None, metadata([]));
        assert!(id.is_some());
        assert_eq!(backend.document_count(AUDIT_LOGS), 0);
        assert_eq!(store.outbox().pending_count().expect("count"), 1);
    }
}
