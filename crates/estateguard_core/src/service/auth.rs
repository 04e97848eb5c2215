//! Authentication and session use cases.
//!
//! # Responsibility
//! - Sign users in and up against the backend auth service.
//! - Keep the signed-in profile in the local session for offline starts.
//!
//! # Invariants
//! - Only active profiles can hold a session.
//! - Credentials never reach logs or the local cache.

use super::audit::{metadata, AuditAction, AuditLogger};
use crate::backend::collections::USERS;
use crate::backend::{AuthBackend, BackendError};
use crate::logging::redact_id;
use crate::model::user::{User, UserRole};
use crate::repo::session_repo::{Session, SessionRepository};
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use crate::sync::{SaveOutcome, SyncError, SyncedStore};
use crate::time::now_epoch_ms;
use log::{info, warn};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

const ACCOUNT_EXISTS_CODE: &str = "email_already_in_use";

/// Demo accounts seeded for first-run evaluation.
pub const DEMO_USERS: [(&str, &str, UserRole); 2] = [
    ("admin@estateguard.com", "John Smith", UserRole::Admin),
    ("guard@estateguard.com", "Michael Johnson", UserRole::SecurityGuard),
];

#[derive(Debug)]
pub enum AuthServiceError {
    InvalidInput(String),
    /// Signed in, but no `users/{uid}` profile exists.
    ProfileNotFound(String),
    /// Profile document could not be decoded.
    ProfileInvalid(String),
    AccountInactive(String),
    Backend(BackendError),
    Sync(SyncError),
}

impl Display for AuthServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::ProfileNotFound(uid) => write!(f, "user profile not found: {uid}"),
            Self::ProfileInvalid(message) => write!(f, "user profile is invalid: {message}"),
            Self::AccountInactive(uid) => write!(f, "account is deactivated: {uid}"),
            Self::Backend(err) => write!(f, "{err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Sync(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for AuthServiceError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<SyncError> for AuthServiceError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

impl From<RepoError> for AuthServiceError {
    fn from(value: RepoError) -> Self {
        Self::Sync(SyncError::Repo(value))
    }
}

pub struct AuthService<'conn> {
    store: SyncedStore<'conn>,
    auth: Arc<dyn AuthBackend>,
    audit: AuditLogger<'conn>,
}

impl<'conn> AuthService<'conn> {
    pub fn new(store: SyncedStore<'conn>, auth: Arc<dyn AuthBackend>) -> Self {
        let audit = AuditLogger::new(store.clone());
        Self { store, auth, audit }
    }

    /// Signs in and caches the profile plus session.
    ///
    /// # Errors
    /// - `ProfileNotFound` when the account has no profile document.
    /// - `AccountInactive` when the profile is deactivated.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthServiceError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthServiceError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let account = self.auth.sign_in(email, password).map_err(|err| {
            warn!(
                "event=auth_sign_in module=auth status=error error_code={}",
                err.code
            );
            err
        })?;

        let Some(document) = self.store.documents().get_document(USERS, &account.uid)? else {
            self.sign_out_backend();
            return Err(AuthServiceError::ProfileNotFound(account.uid));
        };
        let user: User = serde_json::from_value(document)
            .map_err(|err| AuthServiceError::ProfileInvalid(err.to_string()))?;
        if !user.is_active {
            self.sign_out_backend();
            return Err(AuthServiceError::AccountInactive(user.id));
        }

        self.store.users().upsert_user(&user)?;
        self.store
            .sessions()
            .save_session(&Session::for_user(&user, now_epoch_ms()))?;
        self.audit
            .record(AuditAction::UserSignedIn, &user.id, None, Map::new());
        info!(
            "event=auth_sign_in module=auth status=ok user={} role={}",
            redact_id(&user.id),
            user.role.as_str()
        );
        Ok(user)
    }

    /// Creates an account and its active profile, then starts a session.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> Result<User, AuthServiceError> {
        let user = self.create_profile(email, password, name, role)?;
        self.store
            .sessions()
            .save_session(&Session::for_user(&user, now_epoch_ms()))?;
        Ok(user)
    }

    /// Ends the backend session and clears the local one.
    ///
    /// A backend failure is logged; the local session is cleared regardless.
    pub fn sign_out(&self) -> Result<(), AuthServiceError> {
        let sessions = self.store.sessions();
        let session = sessions.load_session()?;
        self.sign_out_backend();
        sessions.clear_session()?;
        if let Some(session) = session {
            self.audit
                .record(AuditAction::UserSignedOut, &session.user_id, None, Map::new());
        }
        info!("event=auth_sign_out module=auth status=ok");
        Ok(())
    }

    /// Resolves the signed-in user from the local session.
    pub fn current_user(&self) -> Result<Option<User>, AuthServiceError> {
        let Some(session) = self.store.sessions().load_session()? else {
            return Ok(None);
        };
        if let Some(user) = self.store.users().get_user(&session.user_id)? {
            return Ok(user.is_active.then_some(user));
        }
        Ok(Some(User::new(
            session.user_id,
            session.email,
            session.name,
            session.role,
            session.signed_in_at,
        )))
    }

    /// Stores a device push token on the user document.
    pub fn register_push_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<SaveOutcome, AuthServiceError> {
        let token = token.trim();
        if user_id.trim().is_empty() || token.is_empty() {
            return Err(AuthServiceError::InvalidInput(
                "user_id and token are required".to_string(),
            ));
        }
        let mut fields = Map::new();
        fields.insert("fcmToken".to_string(), Value::String(token.to_string()));
        fields.insert("updatedAt".to_string(), Value::from(now_epoch_ms()));
        let outcome = self.store.merge_remote(USERS, user_id, fields)?;
        info!(
            "event=push_token_register module=auth status=ok synced={}",
            outcome.is_synced()
        );
        Ok(outcome)
    }

    /// Creates the demo admin and guard. Existing accounts are skipped.
    pub fn seed_demo_users(&self, password: &str) -> Result<Vec<User>, AuthServiceError> {
        let mut created = Vec::new();
        for (email, name, role) in DEMO_USERS {
            match self.create_profile(email, password, name, role) {
                Ok(user) => created.push(user),
                Err(AuthServiceError::Backend(err)) if err.code == ACCOUNT_EXISTS_CODE => {
                    info!(
                        "event=seed_demo_user module=auth status=skipped role={}",
                        role.as_str()
                    );
                }
                Err(err) => return Err(err),
            }
        }
        self.sign_out_backend();
        info!(
            "event=seed_demo_users module=auth status=ok created={}",
            created.len()
        );
        Ok(created)
    }

    fn create_profile(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> Result<User, AuthServiceError> {
        let email = email.trim();
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthServiceError::InvalidInput("name is required".to_string()));
        }
        if password.is_empty() {
            return Err(AuthServiceError::InvalidInput(
                "password is required".to_string(),
            ));
        }
        let now = now_epoch_ms();
        User::new("pending", email, name, role, now)
            .validate()
            .map_err(|err| AuthServiceError::InvalidInput(err.to_string()))?;

        let account = self.auth.create_account(email, password)?;
        let user = User::new(account.uid, email, name, role, now);
        self.store.save_user(&user)?;
        self.audit.record(
            AuditAction::UserCreated,
            &user.id,
            Some(&user.id),
            metadata([("role", role.as_str())]),
        );
        info!(
            "event=auth_sign_up module=auth status=ok role={}",
            role.as_str()
        );
        Ok(user)
    }

    fn sign_out_backend(&self) {
        if let Err(err) = self.auth.sign_out() {
            warn!(
                "event=auth_sign_out module=auth status=error error_code={}",
                err.code
            );
        }
    }
}
