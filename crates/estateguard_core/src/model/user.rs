//! User profile model.
//!
//! # Invariants
//! - `id` matches the backend auth account ID.
//! - Deactivation flips `is_active`; profiles are never removed.

use super::{require_id, ModelValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email regex"));

/// Access role of a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Views dashboards and manages incidents and users.
    Admin,
    /// Clocks shifts and reports incidents.
    #[default]
    SecurityGuard,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::SecurityGuard => "SECURITY_GUARD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ADMIN" => Some(Self::Admin),
            "SECURITY_GUARD" => Some(Self::SecurityGuard),
            _ => None,
        }
    }
}

/// Profile document stored under `users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Creates an active profile.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        role: UserRole,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            role,
            is_active: true,
            created_at,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_guard(&self) -> bool {
        self.role == UserRole::SecurityGuard
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id("user", &self.id)?;
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(ModelValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}
