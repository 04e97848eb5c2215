//! Backend stand-in for devices without a remote adapter attached.
//!
//! Every call fails with a retryable `backend_unavailable` error, so writes
//! land in the local cache and queue in the sync outbox.

use super::{
    AuthAccount, AuthBackend, BackendError, BackendResult, BackendService, DocumentQuery,
    DocumentStore, ObjectStorage, PushMessage, PushMessaging, StoredDocument,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl DocumentStore for OfflineBackend {
    fn set_document(&self, _collection: &str, _id: &str, _data: &Value) -> BackendResult<()> {
        Err(BackendError::unavailable(BackendService::Documents))
    }

    fn get_document(&self, _collection: &str, _id: &str) -> BackendResult<Option<Value>> {
        Err(BackendError::unavailable(BackendService::Documents))
    }

    fn update_fields(
        &self,
        _collection: &str,
        _id: &str,
        _fields: &Map<String, Value>,
    ) -> BackendResult<()> {
        Err(BackendError::unavailable(BackendService::Documents))
    }

    fn query(
        &self,
        _collection: &str,
        _query: &DocumentQuery,
    ) -> BackendResult<Vec<StoredDocument>> {
        Err(BackendError::unavailable(BackendService::Documents))
    }
}

impl AuthBackend for OfflineBackend {
    fn sign_in(&self, _email: &str, _password: &str) -> BackendResult<AuthAccount> {
        Err(BackendError::unavailable(BackendService::Auth))
    }

    fn create_account(&self, _email: &str, _password: &str) -> BackendResult<AuthAccount> {
        Err(BackendError::unavailable(BackendService::Auth))
    }

    fn sign_out(&self) -> BackendResult<()> {
        Err(BackendError::unavailable(BackendService::Auth))
    }

    fn current_account(&self) -> BackendResult<Option<AuthAccount>> {
        Err(BackendError::unavailable(BackendService::Auth))
    }
}

impl ObjectStorage for OfflineBackend {
    fn put_object(&self, _path: &str, _bytes: &[u8], _content_type: &str) -> BackendResult<String> {
        Err(BackendError::unavailable(BackendService::Storage))
    }
}

impl PushMessaging for OfflineBackend {
    fn send(&self, _message: &PushMessage) -> BackendResult<()> {
        Err(BackendError::unavailable(BackendService::Messaging))
    }
}
