//! Domain model for guards, clock entries and incident reports.
//!
//! # Responsibility
//! - Define the canonical records shared by the local cache and the backend.
//! - Keep validation rules next to the data they protect.
//!
//! # Invariants
//! - Every record is identified by a stable, non-empty string ID.
//! - Users are soft-deleted via `is_active`; entries and incidents are never
//!   hard-deleted by core.
//! - Serialized shape matches backend documents (camelCase fields,
//!   upper-snake enum values).

pub mod clock;
pub mod geo;
pub mod incident;
pub mod time_entry;
pub mod user;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failure raised by any domain record.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValidationError {
    /// Record ID is empty or whitespace.
    EmptyId(&'static str),
    /// Owning user ID is empty or whitespace.
    EmptyUserId,
    /// Email is empty or not shaped like an address.
    InvalidEmail(String),
    /// Incident description is blank.
    EmptyDescription,
    /// Only one of latitude/longitude was provided.
    PartialCoordinates,
    /// Latitude outside `[-90, 90]`.
    LatitudeOutOfRange(f64),
    /// Longitude outside `[-180, 180]`.
    LongitudeOutOfRange(f64),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId(entity) => write!(f, "{entity} id must not be empty"),
            Self::EmptyUserId => write!(f, "user_id must not be empty"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::EmptyDescription => write!(f, "incident description must not be blank"),
            Self::PartialCoordinates => {
                write!(f, "latitude and longitude must be provided together")
            }
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude {value} is outside [-90, 90]")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude {value} is outside [-180, 180]")
            }
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_id(entity: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::EmptyId(entity));
    }
    Ok(())
}

pub(crate) fn require_user_id(value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::EmptyUserId);
    }
    Ok(())
}

/// Generates a new random record ID.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
