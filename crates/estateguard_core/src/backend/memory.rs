//! In-process backend used by tests and local tooling.
//!
//! Implements every backend capability over in-memory maps, with fault
//! injection so offline and retry paths can be driven deterministically.

use super::{
    AuthAccount, AuthBackend, BackendError, BackendResult, BackendService, DocumentQuery,
    DocumentStore, ObjectStorage, PushMessage, PushMessaging, StoredDocument,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MemoryAccount {
    uid: String,
    password: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    accounts: BTreeMap<String, MemoryAccount>,
    current: Option<AuthAccount>,
    objects: BTreeMap<String, Vec<u8>>,
    sent: Vec<PushMessage>,
    offline: bool,
    fail_next: u32,
    next_uid: u64,
}

/// Thread-safe in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline, every call fails with a retryable error.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    /// Makes the next `count` calls fail with a retryable error.
    pub fn fail_next_calls(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = count;
        }
    }

    /// Returns one stored document, bypassing fault injection.
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        let state = self.state.lock().ok()?;
        state.collections.get(collection)?.get(id).cloned()
    }

    /// Number of documents in a collection, bypassing fault injection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.collections.get(collection).map(BTreeMap::len))
            .unwrap_or(0)
    }

    /// Messages accepted by `send` so far.
    pub fn sent_messages(&self) -> Vec<PushMessage> {
        self.state
            .lock()
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }

    /// Uploaded bytes for a storage path.
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().ok()?.objects.get(path).cloned()
    }

    fn enter(&self, service: BackendService) -> BackendResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.state.lock().map_err(|_| {
            BackendError::new(service, "state_poisoned", "Backend state lock poisoned.", false)
        })?;
        if state.offline {
            return Err(BackendError::unavailable(service));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(BackendError::unavailable(service));
        }
        Ok(state)
    }
}

impl DocumentStore for MemoryBackend {
    fn set_document(&self, collection: &str, id: &str, data: &Value) -> BackendResult<()> {
        let mut state = self.enter(BackendService::Documents)?;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data.clone());
        Ok(())
    }

    fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Value>> {
        let state = self.enter(BackendService::Documents)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
    ) -> BackendResult<()> {
        let mut state = self.enter(BackendService::Documents)?;
        let document = state
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| {
                BackendError::new(
                    BackendService::Documents,
                    "not_found",
                    format!("No document {collection}/{id}."),
                    false,
                )
            })?;
        let Value::Object(existing) = document else {
            return Err(BackendError::new(
                BackendService::Documents,
                "invalid_document",
                format!("Document {collection}/{id} is not an object."),
                false,
            ));
        };
        for (key, value) in fields {
            existing.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> BackendResult<Vec<StoredDocument>> {
        let state = self.enter(BackendService::Documents)?;
        let mut matches: Vec<StoredDocument> = state
            .collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, data)| query.matches(data))
                    .map(|(id, data)| StoredDocument {
                        id: id.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        matches.sort_by(|left, right| query.compare(&left.data, &right.data));
        if let Some(limit) = query.limit {
            matches.truncate(limit as usize);
        }
        Ok(matches)
    }
}

impl AuthBackend for MemoryBackend {
    fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthAccount> {
        let mut state = self.enter(BackendService::Auth)?;
        let account = state
            .accounts
            .get(email)
            .filter(|account| account.password == password)
            .map(|account| AuthAccount {
                uid: account.uid.clone(),
                email: email.to_string(),
            })
            .ok_or_else(|| {
                BackendError::new(
                    BackendService::Auth,
                    "invalid_credentials",
                    "Invalid email or password.",
                    false,
                )
            })?;
        state.current = Some(account.clone());
        Ok(account)
    }

    fn create_account(&self, email: &str, password: &str) -> BackendResult<AuthAccount> {
        let mut state = self.enter(BackendService::Auth)?;
        if state.accounts.contains_key(email) {
            return Err(BackendError::new(
                BackendService::Auth,
                "email_already_in_use",
                "An account already exists for this email.",
                false,
            ));
        }
        state.next_uid += 1;
        let uid = format!("uid_{:04}", state.next_uid);
        state.accounts.insert(
            email.to_string(),
            MemoryAccount {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );
        let account = AuthAccount {
            uid,
            email: email.to_string(),
        };
        state.current = Some(account.clone());
        Ok(account)
    }

    fn sign_out(&self) -> BackendResult<()> {
        let mut state = self.enter(BackendService::Auth)?;
        state.current = None;
        Ok(())
    }

    fn current_account(&self) -> BackendResult<Option<AuthAccount>> {
        let state = self.enter(BackendService::Auth)?;
        Ok(state.current.clone())
    }
}

impl ObjectStorage for MemoryBackend {
    fn put_object(&self, path: &str, bytes: &[u8], _content_type: &str) -> BackendResult<String> {
        let mut state = self.enter(BackendService::Storage)?;
        state.objects.insert(path.to_string(), bytes.to_vec());
        Ok(format!("memory://{path}"))
    }
}

impl PushMessaging for MemoryBackend {
    fn send(&self, message: &PushMessage) -> BackendResult<()> {
        let mut state = self.enter(BackendService::Messaging)?;
        state.sent.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryBackend;
    use crate::backend::{AuthBackend, DocumentQuery, DocumentStore, SortDirection};
    use serde_json::{json, Map};

    #[test]
    fn query_filters_orders_and_limits() {
        let backend = MemoryBackend::new();
        for (id, ts) in [("a", 10), ("b", 30), ("c", 20)] {
            backend
                .set_document("incidents", id, &json!({"userId": "u1", "timestamp": ts}))
                .unwrap();
        }

        let docs = backend
            .query(
                "incidents",
                &DocumentQuery::new()
                    .where_eq("userId", "u1")
                    .order_by("timestamp", SortDirection::Descending)
                    .limit(2),
            )
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn update_fields_merges_and_requires_existing_document() {
        let backend = MemoryBackend::new();
        backend
            .set_document("users", "u1", &json!({"name": "Ann"}))
            .unwrap();

        let mut fields = Map::new();
        fields.insert("fcmToken".to_string(), json!("tok"));
        backend.update_fields("users", "u1", &fields).unwrap();
        let doc = backend.document("users", "u1").unwrap();
        assert_eq!(doc["name"], "Ann");
        assert_eq!(doc["fcmToken"], "tok");

        let err = backend.update_fields("users", "missing", &fields).unwrap_err();
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn fault_injection_fails_then_recovers() {
        let backend = MemoryBackend::new();
        backend.fail_next_calls(1);
        let err = backend.get_document("users", "u1").unwrap_err();
        assert!(err.retryable);
        assert!(backend.get_document("users", "u1").unwrap().is_none());
    }

    #[test]
    fn accounts_require_matching_password() {
        let backend = MemoryBackend::new();
        let created = backend.create_account("a@b.c", "secret").unwrap();
        let err = backend.sign_in("a@b.c", "wrong").unwrap_err();
        assert_eq!(err.code, "invalid_credentials");
        let account = backend.sign_in("a@b.c", "secret").unwrap();
        assert_eq!(account.uid, created.uid);
        assert_eq!(backend.current_account().unwrap(), Some(account));
    }
}
