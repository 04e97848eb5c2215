//! Incident report model.
//!
//! # Invariants
//! - `description` is never blank.
//! - New reports start in `IncidentStatus::Reported`.

use super::geo::validate_coordinates;
use super::{require_id, require_user_id, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Reported urgency of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentSeverity {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Whether admins are paged when such an incident is reported.
    pub fn requires_escalation(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Handling state of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    #[default]
    Reported,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "REPORTED",
            Self::Investigating => "INVESTIGATING",
            Self::Resolved => "RESOLVED",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REPORTED" => Some(Self::Reported),
            "INVESTIGATING" => Some(Self::Investigating),
            "RESOLVED" => Some(Self::Resolved),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Timestamped security-event report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub user_id: String,
    pub description: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    /// Download URL of the uploaded photo.
    #[serde(default)]
    pub photo_path: Option<String>,
    #[serde(default)]
    pub severity: IncidentSeverity,
    #[serde(default)]
    pub status: IncidentStatus,
}

impl Incident {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        description: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            description: description.into(),
            timestamp,
            latitude: None,
            longitude: None,
            location: None,
            photo_path: None,
            severity: IncidentSeverity::default(),
            status: IncidentStatus::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        require_id("incident", &self.id)?;
        require_user_id(&self.user_id)?;
        if self.description.trim().is_empty() {
            return Err(ModelValidationError::EmptyDescription);
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}
