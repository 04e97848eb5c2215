//! Photo uploads waiting for object storage.
//!
//! # Invariants
//! - One row per `object_path`; re-queueing replaces the bytes.
//! - Each row names the document field that receives the download URL.
//! - Rows are drained in `seq` order.

use super::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

/// Document field that receives the URL once the upload succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub collection: String,
    pub doc_id: String,
    pub field: String,
}

impl UploadTarget {
    pub fn new(
        collection: impl Into<String>,
        doc_id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            doc_id: doc_id.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub seq: i64,
    pub object_path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub target: UploadTarget,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: i64,
}

pub trait UploadRepository {
    fn enqueue(
        &self,
        object_path: &str,
        content_type: &str,
        bytes: &[u8],
        target: &UploadTarget,
        now: i64,
    ) -> RepoResult<()>;
    fn list_pending(&self) -> RepoResult<Vec<PendingUpload>>;
    fn mark_attempt_failed(&self, seq: i64, error: &str) -> RepoResult<()>;
    fn remove(&self, seq: i64) -> RepoResult<()>;
    fn pending_count(&self) -> RepoResult<u32>;
}

pub struct SqliteUploadRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUploadRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl UploadRepository for SqliteUploadRepository<'_> {
    fn enqueue(
        &self,
        object_path: &str,
        content_type: &str,
        bytes: &[u8],
        target: &UploadTarget,
        now: i64,
    ) -> RepoResult<()> {
        if object_path.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "pending upload needs an object path".to_string(),
            ));
        }
        self.conn.execute(
            "INSERT INTO pending_uploads
                (object_path, content_type, bytes, collection, doc_id, field, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (object_path)
             DO UPDATE SET bytes = excluded.bytes, content_type = excluded.content_type;",
            params![
                object_path,
                content_type,
                bytes,
                target.collection,
                target.doc_id,
                target.field,
                now
            ],
        )?;
        Ok(())
    }

    fn list_pending(&self) -> RepoResult<Vec<PendingUpload>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, object_path, content_type, bytes, collection, doc_id, field,
                    attempts, last_error, enqueued_at
             FROM pending_uploads
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut uploads = Vec::new();
        while let Some(row) = rows.next()? {
            uploads.push(parse_upload_row(row)?);
        }
        Ok(uploads)
    }

    fn mark_attempt_failed(&self, seq: i64, error: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE pending_uploads SET attempts = attempts + 1, last_error = ?1 WHERE seq = ?2;",
            params![error, seq],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "pending upload",
                id: seq.to_string(),
            });
        }
        Ok(())
    }

    fn remove(&self, seq: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM pending_uploads WHERE seq = ?1;", [seq])?;
        Ok(())
    }

    fn pending_count(&self) -> RepoResult<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_uploads;", [], |row| {
                row.get::<_, u32>(0)
            })?;
        Ok(count)
    }
}

fn parse_upload_row(row: &Row<'_>) -> RepoResult<PendingUpload> {
    Ok(PendingUpload {
        seq: row.get("seq")?,
        object_path: row.get("object_path")?,
        content_type: row.get("content_type")?,
        bytes: row.get("bytes")?,
        target: UploadTarget {
            collection: row.get("collection")?,
            doc_id: row.get("doc_id")?,
            field: row.get("field")?,
        },
        attempts: row.get("attempts")?,
        last_error: row.get("last_error")?,
        enqueued_at: row.get("enqueued_at")?,
    })
}
