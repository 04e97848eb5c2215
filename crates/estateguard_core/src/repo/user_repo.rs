//! User profile cache.

use super::{bool_to_int, int_to_bool, RepoError, RepoResult};
use crate::model::user::{User, UserRole};
use rusqlite::{params, Connection, OptionalExtension, Row};

const USER_SELECT_SQL: &str = "SELECT id, email, name, role, is_active, created_at FROM users";

/// Repository interface for cached user profiles.
pub trait UserRepository {
    fn upsert_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: &str) -> RepoResult<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    fn list_active_users(&self) -> RepoResult<Vec<User>>;
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn deactivate_user(&self, id: &str) -> RepoResult<()>;
    fn count_users(&self) -> RepoResult<u32>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_users(&self, sql: &str) -> RepoResult<Vec<User>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn upsert_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO users (id, email, name, role, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                user.id.as_str(),
                user.email.as_str(),
                user.name.as_str(),
                user.role.as_str(),
                bool_to_int(user.is_active),
                user.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1 ORDER BY created_at ASC LIMIT 1;",
                [email.trim()],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_user(&id),
            None => Ok(None),
        }
    }

    fn list_active_users(&self) -> RepoResult<Vec<User>> {
        self.query_users(&format!(
            "{USER_SELECT_SQL} WHERE is_active = 1 ORDER BY name ASC, id ASC;"
        ))
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        self.query_users(&format!("{USER_SELECT_SQL} ORDER BY name ASC, id ASC;"))
    }

    fn deactivate_user(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("UPDATE users SET is_active = 0 WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn count_users(&self) -> RepoResult<u32> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get::<_, u32>(0))?;
        Ok(count)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = UserRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid user role `{role_text}` in users.role"))
    })?;

    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        role,
        is_active: int_to_bool(row.get("is_active")?, "users.is_active")?,
        created_at: row.get("created_at")?,
    })
}
