//! Clock entry model.
//!
//! # Invariants
//! - Entries are append-only from the guard's perspective.
//! - Coordinates are either both present or both absent.

use super::geo::{validate_coordinates, GeoPoint};
use super::{require_id, require_user_id, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Direction of a clock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeEntryType {
    ClockIn,
    ClockOut,
}

impl TimeEntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClockIn => "CLOCK_IN",
            Self::ClockOut => "CLOCK_OUT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CLOCK_IN" => Some(Self::ClockIn),
            "CLOCK_OUT" => Some(Self::ClockOut),
            _ => None,
        }
    }
}

/// Timestamped record of a guard starting or ending a shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: TimeEntryType,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub qr_code_data: Option<String>,
    #[serde(default)]
    pub is_manual_entry: bool,
}

impl TimeEntry {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        timestamp: i64,
        kind: TimeEntryType,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            timestamp,
            kind,
            latitude: None,
            longitude: None,
            location: None,
            qr_code_data: None,
            is_manual_entry: false,
        }
    }

    /// Tags the entry with a position fix and its display label.
    pub fn with_position(mut self, point: GeoPoint) -> Self {
        self.latitude = Some(point.latitude);
        self.longitude = Some(point.longitude);
        self.location = Some(point.label());
        self
    }

    pub fn position(&self) -> Option<GeoPoint> {
        GeoPoint::from_parts(self.latitude, self.longitude)
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id("time entry", &self.id)?;
        require_user_id(&self.user_id)?;
        validate_coordinates(self.latitude, self.longitude)
    }
}
