//! Pending remote writes that could not be pushed yet.
//!
//! # Invariants
//! - One row per `(collection, doc_id, op)`; re-queueing replaces the
//!   payload and keeps `seq` and `attempts`.
//! - Rows are drained in `seq` order.

use super::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use serde_json::Value;

/// How a queued payload is applied remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxOp {
    /// Full document replacement.
    Set,
    /// Field-level merge into an existing document.
    Merge,
}

impl OutboxOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Merge => "merge",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "set" => Some(Self::Set),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

/// One queued remote write.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub seq: i64,
    pub collection: String,
    pub doc_id: String,
    pub op: OutboxOp,
    pub payload: Value,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: i64,
}

pub trait OutboxRepository {
    fn enqueue(
        &self,
        collection: &str,
        doc_id: &str,
        op: OutboxOp,
        payload: &Value,
        now: i64,
    ) -> RepoResult<()>;
    fn get_pending(&self, collection: &str, doc_id: &str, op: OutboxOp)
        -> RepoResult<Option<OutboxEntry>>;
    fn list_pending(&self) -> RepoResult<Vec<OutboxEntry>>;
    fn mark_attempt_failed(&self, seq: i64, error: &str) -> RepoResult<()>;
    fn remove(&self, seq: i64) -> RepoResult<()>;
    fn pending_count(&self) -> RepoResult<u32>;
    fn has_pending_for(&self, collection: &str, doc_id: &str) -> RepoResult<bool>;
}

pub struct SqliteOutboxRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOutboxRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

const OUTBOX_SELECT_SQL: &str = "SELECT
    seq,
    collection,
    doc_id,
    op,
    payload,
    attempts,
    last_error,
    enqueued_at
FROM sync_outbox";

impl OutboxRepository for SqliteOutboxRepository<'_> {
    fn enqueue(
        &self,
        collection: &str,
        doc_id: &str,
        op: OutboxOp,
        payload: &Value,
        now: i64,
    ) -> RepoResult<()> {
        let payload_text = serde_json::to_string(payload)
            .map_err(|err| RepoError::InvalidData(format!("unencodable payload: {err}")))?;
        self.conn.execute(
            "INSERT INTO sync_outbox (collection, doc_id, op, payload, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (collection, doc_id, op)
             DO UPDATE SET payload = excluded.payload;",
            params![collection, doc_id, op.as_str(), payload_text, now],
        )?;
        Ok(())
    }

    fn get_pending(
        &self,
        collection: &str,
        doc_id: &str,
        op: OutboxOp,
    ) -> RepoResult<Option<OutboxEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{OUTBOX_SELECT_SQL} WHERE collection = ?1 AND doc_id = ?2 AND op = ?3;"
        ))?;
        let mut rows = stmt.query(params![collection, doc_id, op.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_outbox_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_pending(&self) -> RepoResult<Vec<OutboxEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OUTBOX_SELECT_SQL} ORDER BY seq ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_outbox_row(row)?);
        }
        Ok(entries)
    }

    fn mark_attempt_failed(&self, seq: i64, error: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE sync_outbox SET attempts = attempts + 1, last_error = ?1 WHERE seq = ?2;",
            params![error, seq],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "outbox entry",
                id: seq.to_string(),
            });
        }
        Ok(())
    }

    fn remove(&self, seq: i64) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM sync_outbox WHERE seq = ?1;", [seq])?;
        Ok(())
    }

    fn pending_count(&self) -> RepoResult<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_outbox;", [], |row| {
                row.get::<_, u32>(0)
            })?;
        Ok(count)
    }

    fn has_pending_for(&self, collection: &str, doc_id: &str) -> RepoResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sync_outbox WHERE collection = ?1 AND doc_id = ?2
            );",
            params![collection, doc_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_outbox_row(row: &Row<'_>) -> RepoResult<OutboxEntry> {
    let op_text: String = row.get("op")?;
    let op = OutboxOp::parse(&op_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid op `{op_text}` in sync_outbox.op"))
    })?;
    let payload_text: String = row.get("payload")?;
    let payload = serde_json::from_str(&payload_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON in sync_outbox.payload: {err}"))
    })?;

    Ok(OutboxEntry {
        seq: row.get("seq")?,
        collection: row.get("collection")?,
        doc_id: row.get("doc_id")?,
        op,
        payload,
        attempts: row.get("attempts")?,
        last_error: row.get("last_error")?,
        enqueued_at: row.get("enqueued_at")?,
    })
}
