//! Local-first persistence with remote document sync.
//!
//! # Responsibility
//! - Write every record to the local cache before pushing it remotely.
//! - Queue pushes that fail transiently and replay them later.
//! - Refresh the cache from backend documents.
//!
//! # Invariants
//! - A remote failure never fails a local write.
//! - Reads are served from the local cache only.
//! - Pulled documents never overwrite rows with unsynced local changes.

mod store;

pub use store::{FlushReport, PullReport, SaveOutcome, SyncReport, SyncedStore};

use crate::backend::BackendError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// Local cache failure.
    Repo(RepoError),
    /// Backend failure on a read path.
    Backend(BackendError),
    /// Record could not be converted to a document.
    Encode(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::Encode(message) => write!(f, "document encoding failed: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::Encode(_) => None,
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<BackendError> for SyncError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}
