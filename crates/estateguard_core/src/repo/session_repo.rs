//! Persisted sign-in session.
//!
//! # Invariants
//! - At most one session row exists (`slot = 1`).
//! - Clearing the session never touches cached records.

use super::{RepoError, RepoResult};
use crate::model::user::{User, UserRole};
use rusqlite::{params, Connection, OptionalExtension};

/// Signed-in identity kept across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub signed_in_at: i64,
}

impl Session {
    pub fn for_user(user: &User, signed_in_at: i64) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            signed_in_at,
        }
    }
}

pub trait SessionRepository {
    fn save_session(&self, session: &Session) -> RepoResult<()>;
    fn load_session(&self) -> RepoResult<Option<Session>>;
    fn clear_session(&self) -> RepoResult<()>;
}

pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn save_session(&self, session: &Session) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO session (slot, user_id, email, name, role, signed_in_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5);",
            params![
                session.user_id.as_str(),
                session.email.as_str(),
                session.name.as_str(),
                session.role.as_str(),
                session.signed_in_at,
            ],
        )?;
        Ok(())
    }

    fn load_session(&self) -> RepoResult<Option<Session>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, email, name, role, signed_in_at FROM session WHERE slot = 1;",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, email, name, role_text, signed_in_at)) = row else {
            return Ok(None);
        };
        let role = UserRole::parse(&role_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid user role `{role_text}` in session.role"))
        })?;
        Ok(Some(Session {
            user_id,
            email,
            name,
            role,
            signed_in_at,
        }))
    }

    fn clear_session(&self) -> RepoResult<()> {
        self.conn.execute("DELETE FROM session;", [])?;
        Ok(())
    }
}
