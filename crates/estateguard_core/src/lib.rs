//! Core domain logic for EstateGuard.
//! This crate is the single source of truth for business invariants.

pub mod backend;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;
pub mod time;

pub use backend::{BackendError, BackendHandle};
pub use config::{AppSettings, ConfigError, CoreConfig};
pub use logging::{
    default_log_level, init_from_config, init_logging, log_text, logging_status, redact_id,
    LogSettings,
};
pub use model::clock::{ClockStatus, Shift};
pub use model::geo::GeoPoint;
pub use model::incident::{Incident, IncidentSeverity, IncidentStatus};
pub use model::time_entry::{TimeEntry, TimeEntryType};
pub use model::user::{User, UserRole};
pub use model::ModelValidationError;
pub use repo::{RepoError, RepoResult};
pub use sync::{SaveOutcome, SyncError, SyncReport, SyncedStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
