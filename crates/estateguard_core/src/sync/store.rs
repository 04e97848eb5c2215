//! `SyncedStore`: the cache-plus-remote repository used by services.

use super::{SyncError, SyncResult};
use crate::backend::collections::{INCIDENTS, INCIDENT_PHOTO_FIELD, TIME_ENTRIES, USERS};
use crate::backend::{BackendError, DocumentQuery, DocumentStore, ObjectStorage, StoredDocument};
use crate::logging::{log_text, redact_id};
use crate::model::incident::Incident;
use crate::model::time_entry::TimeEntry;
use crate::model::user::User;
use crate::repo::incident_repo::{IncidentRepository, SqliteIncidentRepository};
use crate::repo::outbox_repo::{OutboxOp, OutboxRepository, SqliteOutboxRepository};
use crate::repo::session_repo::SqliteSessionRepository;
use crate::repo::time_entry_repo::{SqliteTimeEntryRepository, TimeEntryRepository};
use crate::repo::upload_repo::{SqliteUploadRepository, UploadRepository, UploadTarget};
use crate::repo::user_repo::{SqliteUserRepository, UserRepository};
use crate::repo::{RepoError, RepoResult};
use crate::time::now_epoch_ms;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of the remote half of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Backend accepted the write.
    Synced,
    /// Transient failure; the write waits in the outbox.
    Queued { code: String },
    /// Backend refused the write; only the local copy exists.
    Rejected { code: String },
}

impl SaveOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub pushed: u32,
    pub failed: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullReport {
    pub users: u32,
    pub time_entries: u32,
    pub incidents: u32,
    /// Documents ignored because a local change is still pending.
    pub skipped_pending: u32,
    /// Documents that could not be decoded or validated.
    pub invalid: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub flush: FlushReport,
    pub pull: PullReport,
}

/// Single source of truth for cached records.
#[derive(Clone)]
pub struct SyncedStore<'conn> {
    conn: &'conn Connection,
    documents: Arc<dyn DocumentStore>,
}

impl<'conn> SyncedStore<'conn> {
    pub fn new(conn: &'conn Connection, documents: Arc<dyn DocumentStore>) -> Self {
        Self { conn, documents }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn users(&self) -> SqliteUserRepository<'conn> {
        SqliteUserRepository::new(self.conn)
    }

    pub fn time_entries(&self) -> SqliteTimeEntryRepository<'conn> {
        SqliteTimeEntryRepository::new(self.conn)
    }

    pub fn incidents(&self) -> SqliteIncidentRepository<'conn> {
        SqliteIncidentRepository::new(self.conn)
    }

    pub fn sessions(&self) -> SqliteSessionRepository<'conn> {
        SqliteSessionRepository::new(self.conn)
    }

    pub fn outbox(&self) -> SqliteOutboxRepository<'conn> {
        SqliteOutboxRepository::new(self.conn)
    }

    pub fn uploads(&self) -> SqliteUploadRepository<'conn> {
        SqliteUploadRepository::new(self.conn)
    }

    pub fn pending_count(&self) -> SyncResult<u32> {
        Ok(self.outbox().pending_count()?)
    }

    pub fn pending_upload_count(&self) -> SyncResult<u32> {
        Ok(self.uploads().pending_count()?)
    }

    /// Keeps upload bytes until object storage is reachable again.
    pub fn queue_upload(
        &self,
        object_path: &str,
        content_type: &str,
        bytes: &[u8],
        target: &UploadTarget,
    ) -> SyncResult<()> {
        self.uploads()
            .enqueue(object_path, content_type, bytes, target, now_epoch_ms())?;
        info!(
            "event=upload_queue module=sync status=queued collection={} field={} size_bytes={}",
            target.collection,
            target.field,
            bytes.len()
        );
        Ok(())
    }

    /// Uploads queued photos and writes each URL into its target field.
    ///
    /// Stops at the first retryable failure, like `flush_outbox`.
    pub fn flush_uploads(&self, storage: &dyn ObjectStorage) -> SyncResult<FlushReport> {
        let uploads = self.uploads();
        let mut report = FlushReport::default();

        for upload in uploads.list_pending()? {
            match storage.put_object(&upload.object_path, &upload.bytes, &upload.content_type) {
                Ok(url) => {
                    self.attach_url(&upload.target, &url)?;
                    uploads.remove(upload.seq)?;
                    report.pushed += 1;
                }
                Err(err) => {
                    uploads.mark_attempt_failed(upload.seq, &err.to_string())?;
                    report.failed += 1;
                    if err.retryable {
                        break;
                    }
                }
            }
        }

        report.remaining = uploads.pending_count()?;
        info!(
            "event=upload_flush module=sync status=ok pushed={} failed={} remaining={}",
            report.pushed, report.failed, report.remaining
        );
        Ok(report)
    }

    /// Saves a user profile locally, then pushes `users/{id}`.
    pub fn save_user(&self, user: &User) -> SyncResult<SaveOutcome> {
        self.users().upsert_user(user)?;
        self.push_record(USERS, &user.id, user)
    }

    /// Saves a clock entry locally, then pushes `timeEntries/{id}`.
    pub fn save_time_entry(&self, entry: &TimeEntry) -> SyncResult<SaveOutcome> {
        self.time_entries().upsert_entry(entry)?;
        self.push_record(TIME_ENTRIES, &entry.id, entry)
    }

    /// Saves an incident locally, then pushes `incidents/{id}`.
    pub fn save_incident(&self, incident: &Incident) -> SyncResult<SaveOutcome> {
        self.incidents().upsert_incident(incident)?;
        self.push_record(INCIDENTS, &incident.id, incident)
    }

    /// Soft-deletes a user locally and pushes the updated profile.
    pub fn deactivate_user(&self, user_id: &str) -> SyncResult<SaveOutcome> {
        let users = self.users();
        users.deactivate_user(user_id)?;
        let user = users.get_user(user_id)?.ok_or_else(|| RepoError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })?;
        self.push_record(USERS, user_id, &user)
    }

    /// Pushes a document that has no local table.
    pub fn push_remote(&self, collection: &str, doc_id: &str, data: &Value) -> SyncResult<SaveOutcome> {
        let outbox = self.outbox();
        match self.documents.set_document(collection, doc_id, data) {
            Ok(()) => {
                if let Some(stale) = outbox.get_pending(collection, doc_id, OutboxOp::Set)? {
                    outbox.remove(stale.seq)?;
                }
                debug!("event=remote_push module=sync status=ok op=set collection={collection}");
                Ok(SaveOutcome::Synced)
            }
            Err(err) => self.defer(collection, doc_id, OutboxOp::Set, data, err),
        }
    }

    /// Merges fields into a remote document, folding in pending writes.
    ///
    /// When a full `set` of the document is still queued, the remote copy
    /// may not exist yet, so the fields are folded into that payload and
    /// the combined document is pushed as a `set` instead.
    pub fn merge_remote(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Map<String, Value>,
    ) -> SyncResult<SaveOutcome> {
        let outbox = self.outbox();
        if let Some(queued_set) = outbox.get_pending(collection, doc_id, OutboxOp::Set)? {
            let Value::Object(mut document) = queued_set.payload else {
                return Err(SyncError::Encode(format!(
                    "queued set for {collection}/{doc_id} is not an object"
                )));
            };
            document.extend(fields);
            let document = Value::Object(document);
            outbox.enqueue(collection, doc_id, OutboxOp::Set, &document, queued_set.enqueued_at)?;
            debug!("event=remote_push module=sync status=folded op=merge collection={collection}");
            // The folded set stays queued even when this attempt is refused.
            return Ok(match self.push_remote(collection, doc_id, &document)? {
                SaveOutcome::Rejected { code } => SaveOutcome::Queued { code },
                outcome => outcome,
            });
        }

        let pending = outbox.get_pending(collection, doc_id, OutboxOp::Merge)?;
        let mut combined = match pending.as_ref().map(|entry| &entry.payload) {
            Some(Value::Object(previous)) => previous.clone(),
            _ => Map::new(),
        };
        combined.extend(fields);

        match self.documents.update_fields(collection, doc_id, &combined) {
            Ok(()) => {
                if let Some(stale) = pending {
                    outbox.remove(stale.seq)?;
                }
                debug!("event=remote_push module=sync status=ok op=merge collection={collection}");
                Ok(SaveOutcome::Synced)
            }
            Err(err) => self.defer(
                collection,
                doc_id,
                OutboxOp::Merge,
                &Value::Object(combined),
                err,
            ),
        }
    }

    /// Replays queued writes in enqueue order.
    ///
    /// Stops at the first retryable failure so later writes never overtake
    /// earlier ones while the backend is unreachable.
    pub fn flush_outbox(&self) -> SyncResult<FlushReport> {
        let outbox = self.outbox();
        let mut report = FlushReport::default();

        for entry in outbox.list_pending()? {
            let result = match entry.op {
                OutboxOp::Set => {
                    self.documents
                        .set_document(&entry.collection, &entry.doc_id, &entry.payload)
                }
                OutboxOp::Merge => match &entry.payload {
                    Value::Object(fields) => {
                        self.documents
                            .update_fields(&entry.collection, &entry.doc_id, fields)
                    }
                    _ => {
                        error!(
                            "event=sync_flush module=sync status=error error_code=invalid_merge_payload seq={}",
                            entry.seq
                        );
                        outbox.remove(entry.seq)?;
                        report.failed += 1;
                        continue;
                    }
                },
            };

            match result {
                Ok(()) => {
                    outbox.remove(entry.seq)?;
                    report.pushed += 1;
                }
                Err(err) => {
                    outbox.mark_attempt_failed(entry.seq, &err.to_string())?;
                    report.failed += 1;
                    if err.retryable {
                        break;
                    }
                }
            }
        }

        report.remaining = outbox.pending_count()?;
        info!(
            "event=sync_flush module=sync status=ok pushed={} failed={} remaining={}",
            report.pushed, report.failed, report.remaining
        );
        Ok(report)
    }

    /// Refreshes one user's profile, clock entries and incidents.
    pub fn pull_user_data(&self, user_id: &str) -> SyncResult<PullReport> {
        let mut report = PullReport::default();

        if let Some(data) = self.documents.get_document(USERS, user_id)? {
            let document = StoredDocument {
                id: user_id.to_string(),
                data,
            };
            self.apply_users(vec![document], &mut report)?;
        }

        let by_user = DocumentQuery::new().where_eq("userId", user_id);
        let entries = self.documents.query(TIME_ENTRIES, &by_user)?;
        self.apply_time_entries(entries, &mut report)?;
        let incidents = self.documents.query(INCIDENTS, &by_user)?;
        self.apply_incidents(incidents, &mut report)?;

        log_pull("user", &report);
        Ok(report)
    }

    /// Refreshes every user, clock entry and incident (admin devices).
    pub fn pull_all(&self) -> SyncResult<PullReport> {
        let mut report = PullReport::default();
        let everything = DocumentQuery::new();

        let users = self.documents.query(USERS, &everything)?;
        self.apply_users(users, &mut report)?;
        let entries = self.documents.query(TIME_ENTRIES, &everything)?;
        self.apply_time_entries(entries, &mut report)?;
        let incidents = self.documents.query(INCIDENTS, &everything)?;
        self.apply_incidents(incidents, &mut report)?;

        log_pull("all", &report);
        Ok(report)
    }

    /// Flushes the outbox, then pulls the user's documents.
    pub fn sync_with_backend(&self, user_id: &str) -> SyncResult<SyncReport> {
        let flush = self.flush_outbox()?;
        let pull = self.pull_user_data(user_id)?;
        Ok(SyncReport { flush, pull })
    }

    /// Records a finished upload locally and on the target document.
    fn attach_url(&self, target: &UploadTarget, url: &str) -> SyncResult<SaveOutcome> {
        if target.collection == INCIDENTS && target.field == INCIDENT_PHOTO_FIELD {
            let incidents = self.incidents();
            if let Some(mut incident) = incidents.get_incident(&target.doc_id)? {
                incident.photo_path = Some(url.to_string());
                incidents.upsert_incident(&incident)?;
            }
        }
        let mut fields = Map::new();
        fields.insert(target.field.clone(), Value::String(url.to_string()));
        self.merge_remote(&target.collection, &target.doc_id, fields)
    }

    fn push_record<T: Serialize>(
        &self,
        collection: &str,
        doc_id: &str,
        record: &T,
    ) -> SyncResult<SaveOutcome> {
        let data =
            serde_json::to_value(record).map_err(|err| SyncError::Encode(err.to_string()))?;
        self.push_remote(collection, doc_id, &data)
    }

    fn defer(
        &self,
        collection: &str,
        doc_id: &str,
        op: OutboxOp,
        payload: &Value,
        err: BackendError,
    ) -> SyncResult<SaveOutcome> {
        if !err.retryable {
            error!(
                "event=remote_push module=sync status=rejected op={} collection={} error_code={}",
                op.as_str(),
                collection,
                err.code
            );
            return Ok(SaveOutcome::Rejected { code: err.code });
        }

        self.outbox()
            .enqueue(collection, doc_id, op, payload, now_epoch_ms())?;
        warn!(
            "event=remote_push module=sync status=queued op={} collection={} error_code={}",
            op.as_str(),
            collection,
            err.code
        );
        Ok(SaveOutcome::Queued { code: err.code })
    }

    fn apply_users(&self, documents: Vec<StoredDocument>, report: &mut PullReport) -> RepoResult<()> {
        let repo = self.users();
        for document in documents {
            if let Some(user) = self.decode_fresh::<User>(USERS, document, report)? {
                if store_valid(repo.upsert_user(&user), report)? {
                    report.users += 1;
                }
            }
        }
        Ok(())
    }

    fn apply_time_entries(
        &self,
        documents: Vec<StoredDocument>,
        report: &mut PullReport,
    ) -> RepoResult<()> {
        let repo = self.time_entries();
        for document in documents {
            if let Some(entry) = self.decode_fresh::<TimeEntry>(TIME_ENTRIES, document, report)? {
                if store_valid(repo.upsert_entry(&entry), report)? {
                    report.time_entries += 1;
                }
            }
        }
        Ok(())
    }

    fn apply_incidents(
        &self,
        documents: Vec<StoredDocument>,
        report: &mut PullReport,
    ) -> RepoResult<()> {
        let repo = self.incidents();
        for document in documents {
            if let Some(incident) = self.decode_fresh::<Incident>(INCIDENTS, document, report)? {
                if store_valid(repo.upsert_incident(&incident), report)? {
                    report.incidents += 1;
                }
            }
        }
        Ok(())
    }

    /// Decodes a pulled document unless local changes to it are pending.
    fn decode_fresh<T: DeserializeOwned>(
        &self,
        collection: &str,
        document: StoredDocument,
        report: &mut PullReport,
    ) -> RepoResult<Option<T>> {
        if self.outbox().has_pending_for(collection, &document.id)? {
            report.skipped_pending += 1;
            return Ok(None);
        }
        match serde_json::from_value::<T>(document.data) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(
                    "event=sync_pull module=sync status=skipped collection={} doc={} error_code=undecodable_document error={}",
                    collection,
                    redact_id(&document.id),
                    log_text(&err)
                );
                report.invalid += 1;
                Ok(None)
            }
        }
    }
}

/// Maps validation failures on pulled records to a skip.
fn store_valid(result: RepoResult<()>, report: &mut PullReport) -> RepoResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(RepoError::Validation(_)) => {
            report.invalid += 1;
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn log_pull(scope: &str, report: &PullReport) {
    info!(
        "event=sync_pull module=sync status=ok scope={} users={} time_entries={} incidents={} skipped_pending={} invalid={}",
        scope,
        report.users,
        report.time_entries,
        report.incidents,
        report.skipped_pending,
        report.invalid
    );
}
