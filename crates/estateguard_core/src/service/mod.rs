//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate synced-store, backend and audit calls into use-case APIs.
//! - Keep UI/FFI layers decoupled from storage and vendor details.
//!
//! # Invariants
//! - Services write records only through `SyncedStore`.
//! - Audit and notification failures never fail a use case.

pub mod admin;
pub mod audit;
pub mod auth;
pub mod clock;
pub mod incident;
pub mod notify;
pub mod profile;

pub use admin::{AdminService, AdminServiceError, DashboardSnapshot, GuardOnDuty};
pub use audit::{AuditAction, AuditLogger};
pub use auth::{AuthService, AuthServiceError, DEMO_USERS};
pub use clock::{ClockMethod, ClockRecord, ClockRequest, ClockService, ClockServiceError};
pub use incident::{
    BatchStatusReport, IncidentDraft, IncidentService, IncidentServiceError, IncidentSubmission,
    IncidentWarning, StatusChange,
};
pub use notify::{classify_incoming, DisplayNotification, Notifier};
pub use profile::{ProfilePhotoUpload, ProfileService, ProfileServiceError};
