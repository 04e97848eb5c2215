//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Run every write through the local-first store so it survives offline.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Until the host registers a backend adapter, every remote call fails as
//!   retryable and writes wait in the outbox for `sync_now`.

use estateguard_core::backend::offline::OfflineBackend;
use estateguard_core::backend::collections::INCIDENTS;
use estateguard_core::backend::BackendHandle;
use estateguard_core::db::open_db;
use estateguard_core::repo::outbox_repo::OutboxRepository;
use estateguard_core::service::{
    classify_incoming, AdminService, AuthService, ClockRequest, ClockService, DashboardSnapshot,
    IncidentDraft, IncidentService, Notifier, ProfilePhotoUpload, ProfileService,
};
use estateguard_core::time::now_epoch_ms;
use estateguard_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, log_text,
    ping as ping_inner, AppSettings, CoreConfig, GeoPoint, Incident, IncidentSeverity,
    IncidentStatus, SaveOutcome, SyncedStore, User,
};
use log::{info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

const INCIDENT_DEFAULT_LIMIT: u32 = 20;
const INCIDENT_LIMIT_MAX: u32 = 100;
static FFI_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
static FFI_BACKEND: OnceLock<BackendHandle> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Clock state shown on the guard home screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockStatusResponse {
    pub ok: bool,
    /// `CLOCKED_IN` or `CLOCKED_OUT`.
    pub status: String,
    pub label: String,
    pub last_activity: String,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// ID of the created or changed record.
    pub record_id: Option<String>,
    /// Whether the remote write is waiting in the outbox.
    pub queued: bool,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, record_id: String, outcome: &SaveOutcome) -> Self {
        Self {
            ok: true,
            record_id: Some(record_id),
            queued: !outcome.is_synced(),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_id: None,
            queued: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentItem {
    pub id: String,
    pub description: String,
    pub severity: String,
    pub status: String,
    pub timestamp: i64,
    pub location: String,
    pub photo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentListResponse {
    pub items: Vec<IncidentItem>,
    pub message: String,
    pub applied_limit: u32,
}

/// Signed-in user returned by `sign_in`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub ok: bool,
    pub user_id: Option<String>,
    pub name: String,
    /// `ADMIN` or `SECURITY_GUARD`.
    pub role: String,
    pub message: String,
}

impl SessionResponse {
    fn failure(message: String) -> Self {
        Self {
            ok: false,
            user_id: None,
            name: String::new(),
            role: String::new(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOnDutyItem {
    pub user_id: String,
    pub name: String,
    pub clocked_in_at: i64,
    pub overdue: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardResponse {
    pub ok: bool,
    pub total_users: u32,
    pub total_incidents: u32,
    pub today_incidents: u32,
    pub active_guards: u32,
    pub overdue_guards: u32,
    pub guards_on_duty: Vec<GuardOnDutyItem>,
    pub recent_incidents: Vec<IncidentItem>,
    pub message: String,
}

/// Counters from one `sync_now` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    /// `false` when the pull step could not reach the backend.
    pub ok: bool,
    pub pushed: u32,
    pub uploaded: u32,
    pub failed: u32,
    pub pulled: u32,
    /// Outbox rows plus queued photo uploads still waiting.
    pub remaining: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResponse {
    pub title: String,
    pub body: String,
    pub high_priority: bool,
    pub emergency: bool,
}

/// Attaches the host's backend adapter for every later call.
///
/// Returns `false` when an adapter is already attached; the first one stays.
#[flutter_rust_bridge::frb(ignore)]
pub fn register_backend(handle: BackendHandle) -> bool {
    let registered = FFI_BACKEND.set(handle).is_ok();
    if registered {
        info!("event=ffi_backend_register module=ffi status=ok");
    } else {
        warn!("event=ffi_backend_register module=ffi status=rejected reason=already_registered");
    }
    registered
}

/// Current clock state for `user_id`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn clock_status(user_id: String) -> ClockStatusResponse {
    let result = with_context(|ctx| {
        let service = ctx.clock();
        let status = service.clock_status(&user_id).map_err(|err| err.to_string())?;
        let last_activity = service
            .last_activity(&user_id)
            .map_err(|err| err.to_string())?;
        Ok((status, last_activity))
    });
    match result {
        Ok((status, last_activity)) => ClockStatusResponse {
            ok: true,
            status: status.as_str().to_string(),
            label: status.label().to_string(),
            last_activity,
            message: String::new(),
        },
        Err(err) => ClockStatusResponse {
            ok: false,
            status: String::new(),
            label: String::new(),
            last_activity: String::new(),
            message: format!("clock_status failed: {err}"),
        },
    }
}

/// Records the next clock entry (in or out) for `user_id`.
///
/// Input semantics:
/// - `qr_payload`: scanned QR text; `None` records a manual entry.
/// - `latitude`/`longitude`: optional position fix, both or neither.
#[flutter_rust_bridge::frb(sync)]
pub fn clock_toggle(
    user_id: String,
    qr_payload: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> ActionResponse {
    let location = GeoPoint::from_parts(latitude, longitude);
    let request = match qr_payload {
        Some(payload) => ClockRequest::qr(payload, location),
        None => ClockRequest::manual(location),
    };
    let result = with_context(|ctx| {
        ctx.clock()
            .with_settings(&ctx.settings())
            .record_clock(user_id.trim(), request)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(record) => ActionResponse::success(
            format!("{}.", record.status.label()),
            record.entry.id,
            &record.outcome,
        ),
        Err(err) => ActionResponse::failure(format!("clock_toggle failed: {err}")),
    }
}

/// Files a new incident report.
///
/// Input semantics:
/// - `severity`: `LOW|MEDIUM|HIGH|CRITICAL` (case-insensitive); unknown values fall back to `LOW`.
/// - `photo`: JPEG bytes, optional. Photo problems are returned in `message`.
#[flutter_rust_bridge::frb(sync)]
pub fn submit_incident(
    user_id: String,
    description: String,
    severity: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    photo: Option<Vec<u8>>,
) -> ActionResponse {
    let draft = IncidentDraft {
        description,
        severity: IncidentSeverity::parse(&severity.trim().to_ascii_uppercase()).unwrap_or_default(),
        location: GeoPoint::from_parts(latitude, longitude),
        photo,
    };
    let result = with_context(|ctx| {
        ctx.incidents(ctx.settings())
            .submit_incident(user_id.trim(), draft)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(submission) => {
            let mut message = "Incident reported.".to_string();
            for warning in &submission.warnings {
                message.push(' ');
                message.push_str(&warning.to_string());
            }
            ActionResponse::success(message, submission.incident.id, &submission.outcome)
        }
        Err(err) => ActionResponse::failure(format!("submit_incident failed: {err}")),
    }
}

/// Moves an incident to `status` on behalf of `actor_id`.
///
/// `status`: `REPORTED|INVESTIGATING|RESOLVED|CLOSED` (case-insensitive).
#[flutter_rust_bridge::frb(sync)]
pub fn update_incident_status(
    incident_id: String,
    status: String,
    actor_id: String,
) -> ActionResponse {
    match with_context(|ctx| change_status(ctx, &incident_id, &status, &actor_id)) {
        Ok(response) => response,
        Err(err) => ActionResponse::failure(format!("update_incident_status failed: {err}")),
    }
}

/// Lists cached incidents, newest first.
///
/// `user_id = None` lists every incident (admin view).
#[flutter_rust_bridge::frb(sync)]
pub fn list_incidents(user_id: Option<String>, limit: Option<u32>) -> IncidentListResponse {
    let applied_limit = normalize_incident_limit(limit);
    let result = with_context(|ctx| {
        let service = ctx.incidents(AppSettings::default());
        let incidents = match user_id.as_deref().map(str::trim) {
            Some(user_id) if !user_id.is_empty() => service.incidents_for_user(user_id),
            _ => service.all_incidents(),
        };
        incidents.map_err(|err| err.to_string())
    });
    match result {
        Ok(incidents) => {
            let items = incidents
                .into_iter()
                .take(applied_limit as usize)
                .map(to_incident_item)
                .collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No incidents.".to_string()
            } else {
                format!("Found {} incident(s).", items.len())
            };
            IncidentListResponse {
                items,
                message,
                applied_limit,
            }
        }
        Err(err) => IncidentListResponse {
            items: Vec::new(),
            message: format!("list_incidents failed: {err}"),
            applied_limit,
        },
    }
}

/// Signs in against the backend and caches the profile and session.
#[flutter_rust_bridge::frb(sync)]
pub fn sign_in(email: String, password: String) -> SessionResponse {
    match with_context(|ctx| start_session(ctx, &email, &password)) {
        Ok(user) => to_session_response(user),
        Err(err) => SessionResponse::failure(format!("sign_in failed: {err}")),
    }
}

/// Ends the backend session and clears the cached one.
#[flutter_rust_bridge::frb(sync)]
pub fn sign_out() -> String {
    let result = with_context(|ctx| {
        AuthService::new(ctx.store.clone(), ctx.backend.auth.clone())
            .sign_out()
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(()) => String::new(),
        Err(err) => format!("sign_out failed: {err}"),
    }
}

/// Uploads a profile photo; it is queued when storage is unreachable.
#[flutter_rust_bridge::frb(sync)]
pub fn upload_profile_photo(user_id: String, photo: Vec<u8>) -> ActionResponse {
    let user_id = user_id.trim().to_string();
    let result = with_context(|ctx| {
        ProfileService::new(ctx.store.clone(), ctx.backend.storage.clone(), ctx.settings())
            .upload_profile_photo(&user_id, &photo)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(ProfilePhotoUpload::Uploaded { outcome, .. }) => {
            ActionResponse::success("Profile photo updated.", user_id, &outcome)
        }
        Ok(ProfilePhotoUpload::Queued { code, .. }) => ActionResponse {
            ok: true,
            record_id: Some(user_id),
            queued: true,
            message: format!("Profile photo queued for upload: {code}"),
        },
        Err(err) => ActionResponse::failure(format!("upload_profile_photo failed: {err}")),
    }
}

/// Admin home screen counters from the local cache.
#[flutter_rust_bridge::frb(sync)]
pub fn admin_dashboard() -> DashboardResponse {
    let result = with_context(|ctx| {
        AdminService::new(ctx.store.clone(), ctx.config)
            .dashboard(now_epoch_ms())
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(snapshot) => to_dashboard_response(snapshot),
        Err(err) => DashboardResponse {
            ok: false,
            total_users: 0,
            total_incidents: 0,
            today_incidents: 0,
            active_guards: 0,
            overdue_guards: 0,
            guards_on_duty: Vec::new(),
            recent_incidents: Vec::new(),
            message: format!("admin_dashboard failed: {err}"),
        },
    }
}

/// Flushes queued writes and photo uploads, then refreshes the cache.
///
/// `user_id = None` pulls every record (admin devices).
#[flutter_rust_bridge::frb(sync)]
pub fn sync_now(user_id: Option<String>) -> SyncResponse {
    match with_context(|ctx| run_sync(ctx, user_id.as_deref())) {
        Ok(response) => response,
        Err(err) => SyncResponse {
            ok: false,
            pushed: 0,
            uploaded: 0,
            failed: 0,
            pulled: 0,
            remaining: 0,
            message: format!("sync_now failed: {err}"),
        },
    }
}

/// Remote writes and photo uploads still waiting; `-1` on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn pending_sync_count() -> i64 {
    match with_context(|ctx| pending_total(&ctx.store)) {
        Ok(count) => i64::from(count),
        Err(err) => {
            warn!(
                "event=ffi_pending_count module=ffi status=error error={}",
                log_text(&err)
            );
            -1
        }
    }
}

/// Maps an inbound push data payload to display fields.
#[flutter_rust_bridge::frb(sync)]
pub fn classify_notification(data: HashMap<String, String>) -> NotificationResponse {
    let data = data.into_iter().collect::<BTreeMap<_, _>>();
    let notification = classify_incoming(&data);
    NotificationResponse {
        title: notification.title,
        body: notification.body,
        high_priority: notification.high_priority,
        emergency: notification.emergency,
    }
}

/// One opened cache plus the backend it talks to.
struct FfiContext<'a> {
    store: SyncedStore<'a>,
    backend: BackendHandle,
    config: &'a CoreConfig,
}

impl<'a> FfiContext<'a> {
    /// Shared settings document, or defaults when it cannot be read.
    fn settings(&self) -> AppSettings {
        AdminService::new(self.store.clone(), self.config).load_settings()
    }

    fn clock(&self) -> ClockService<'a> {
        ClockService::new(self.store.clone(), self.config)
    }

    fn incidents(&self, settings: AppSettings) -> IncidentService<'a> {
        IncidentService::new(
            self.store.clone(),
            self.backend.storage.clone(),
            Notifier::new(self.backend.documents.clone(), self.backend.messaging.clone()),
            settings,
        )
    }
}

fn start_session(ctx: &FfiContext<'_>, email: &str, password: &str) -> Result<User, String> {
    AuthService::new(ctx.store.clone(), ctx.backend.auth.clone())
        .sign_in(email, password)
        .map_err(|err| err.to_string())
}

fn change_status(
    ctx: &FfiContext<'_>,
    incident_id: &str,
    status: &str,
    actor_id: &str,
) -> Result<ActionResponse, String> {
    let status = IncidentStatus::parse(&status.trim().to_ascii_uppercase())
        .ok_or_else(|| format!("unknown incident status `{}`", status.trim()))?;
    let change = ctx
        .incidents(AppSettings::default())
        .update_status(incident_id.trim(), status, actor_id.trim())
        .map_err(|err| err.to_string())?;
    let message = if change.changed {
        format!("Incident moved to {}.", status.as_str())
    } else {
        format!("Incident already {}.", status.as_str())
    };
    let queued = ctx
        .store
        .outbox()
        .has_pending_for(INCIDENTS, &change.incident.id)
        .map_err(|err| err.to_string())?;
    Ok(ActionResponse {
        ok: true,
        record_id: Some(change.incident.id),
        queued,
        message,
    })
}

fn run_sync(ctx: &FfiContext<'_>, user_id: Option<&str>) -> Result<SyncResponse, String> {
    let store = &ctx.store;
    let flush = store.flush_outbox().map_err(|err| err.to_string())?;
    let uploads = store
        .flush_uploads(ctx.backend.storage.as_ref())
        .map_err(|err| err.to_string())?;
    // Uploads merge URLs into documents; push those before pulling.
    let follow_up = store.flush_outbox().map_err(|err| err.to_string())?;

    let pull = match user_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(user_id) => store.pull_user_data(user_id),
        None => store.pull_all(),
    };
    let (ok, pulled, message) = match pull {
        Ok(report) => {
            let pulled = report.users + report.time_entries + report.incidents;
            (true, pulled, format!("Synced. Pulled {pulled} record(s)."))
        }
        Err(err) => (false, 0, format!("Pull skipped: {err}")),
    };

    Ok(SyncResponse {
        ok,
        pushed: flush.pushed + follow_up.pushed,
        uploaded: uploads.pushed,
        failed: flush.failed + uploads.failed + follow_up.failed,
        pulled,
        remaining: pending_total(store)?,
        message,
    })
}

fn pending_total(store: &SyncedStore<'_>) -> Result<u32, String> {
    let writes = store.pending_count().map_err(|err| err.to_string())?;
    let uploads = store
        .pending_upload_count()
        .map_err(|err| err.to_string())?;
    Ok(writes + uploads)
}

fn normalize_incident_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => INCIDENT_DEFAULT_LIMIT,
        Some(value) if value > INCIDENT_LIMIT_MAX => INCIDENT_LIMIT_MAX,
        Some(value) => value,
    }
}

fn resolve_config() -> &'static CoreConfig {
    FFI_CONFIG.get_or_init(|| {
        CoreConfig::from_env().unwrap_or_else(|err| {
            warn!(
                "event=ffi_config module=ffi status=fallback error={}",
                log_text(&err)
            );
            CoreConfig::default()
        })
    })
}

fn current_backend() -> BackendHandle {
    FFI_BACKEND
        .get()
        .cloned()
        .unwrap_or_else(|| BackendHandle::from_shared(Arc::new(OfflineBackend)))
}

fn with_context<T>(f: impl FnOnce(&FfiContext<'_>) -> Result<T, String>) -> Result<T, String> {
    with_context_using(resolve_config(), current_backend(), f)
}

fn with_context_using<T>(
    config: &CoreConfig,
    backend: BackendHandle,
    f: impl FnOnce(&FfiContext<'_>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_db(&config.db_path).map_err(|err| format!("DB open failed: {err}"))?;
    let ctx = FfiContext {
        store: SyncedStore::new(&conn, backend.documents.clone()),
        backend,
        config,
    };
    f(&ctx)
}

fn to_session_response(user: User) -> SessionResponse {
    SessionResponse {
        ok: true,
        message: format!("Welcome, {}.", user.name),
        role: user.role.as_str().to_string(),
        name: user.name,
        user_id: Some(user.id),
    }
}

fn to_dashboard_response(snapshot: DashboardSnapshot) -> DashboardResponse {
    DashboardResponse {
        ok: true,
        total_users: snapshot.total_users,
        total_incidents: snapshot.total_incidents,
        today_incidents: snapshot.today_incidents,
        active_guards: snapshot.active_guards,
        overdue_guards: snapshot.overdue_guards,
        guards_on_duty: snapshot
            .guards_on_duty
            .into_iter()
            .map(|duty| GuardOnDutyItem {
                user_id: duty.user_id,
                name: duty.name,
                clocked_in_at: duty.clocked_in_at,
                overdue: duty.overdue,
            })
            .collect(),
        recent_incidents: snapshot
            .recent_incidents
            .into_iter()
            .map(to_incident_item)
            .collect(),
        message: String::new(),
    }
}

fn to_incident_item(incident: Incident) -> IncidentItem {
    IncidentItem {
        location: incident.location.unwrap_or_default(),
        severity: incident.severity.as_str().to_string(),
        status: incident.status.as_str().to_string(),
        id: incident.id,
        description: incident.description,
        timestamp: incident.timestamp,
        photo_path: incident.photo_path,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        change_status, classify_notification, clock_status, clock_toggle, core_version,
        init_logging, list_incidents, normalize_incident_limit, pending_sync_count, ping,
        run_sync, start_session, submit_incident, to_dashboard_response, to_session_response,
        with_context_using, FfiContext,
    };
    use estateguard_core::backend::memory::MemoryBackend;
    use estateguard_core::backend::offline::OfflineBackend;
    use estateguard_core::backend::BackendHandle;
    use estateguard_core::backend::collections::INCIDENTS;
    use estateguard_core::service::{AdminService, AuthService, ClockRequest, IncidentDraft};
    use estateguard_core::time::now_epoch_ms;
    use estateguard_core::{CoreConfig, IncidentSeverity};
    use std::collections::HashMap;
    use std::sync::Arc;

    const DEMO_PASSWORD: &str = "demo-password";

    fn unique_user(prefix: &str) -> String {
        format!("{prefix}-{}", uuid::Uuid::new_v4())
    }

    fn temp_config(dir: &tempfile::TempDir) -> CoreConfig {
        CoreConfig {
            db_path: dir.path().join("ffi.sqlite3"),
            ..CoreConfig::default()
        }
    }

    fn offline() -> BackendHandle {
        BackendHandle::from_shared(Arc::new(OfflineBackend))
    }

    fn report_incident(ctx: &FfiContext<'_>, user_id: &str, photo: Option<Vec<u8>>) -> String {
        ctx.incidents(ctx.settings())
            .submit_incident(
                user_id,
                IncidentDraft {
                    description: "Gate left open overnight".to_string(),
                    severity: IncidentSeverity::Medium,
                    location: None,
                    photo,
                },
            )
            .unwrap()
            .incident
            .id
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn incident_limit_is_clamped() {
        assert_eq!(normalize_incident_limit(None), 20);
        assert_eq!(normalize_incident_limit(Some(0)), 20);
        assert_eq!(normalize_incident_limit(Some(500)), 100);
        assert_eq!(normalize_incident_limit(Some(7)), 7);
    }

    #[test]
    fn clock_toggle_alternates_and_queues_remote_write() {
        let user_id = unique_user("ffi-guard");
        let before = clock_status(user_id.clone());
        assert!(before.ok, "{}", before.message);
        assert_eq!(before.status, "CLOCKED_OUT");
        assert_eq!(before.last_activity, "No recent activity");

        let response = clock_toggle(user_id.clone(), Some("GATE-1".to_string()), None, None);
        assert!(response.ok, "{}", response.message);
        assert!(response.queued);
        assert!(pending_sync_count() >= 1);

        let after = clock_status(user_id);
        assert_eq!(after.status, "CLOCKED_IN");
        assert!(after.last_activity.starts_with("Clocked in at "));
    }

    #[test]
    fn clock_toggle_rejects_blank_qr() {
        let response = clock_toggle(unique_user("ffi-blank"), Some("  ".to_string()), None, None);
        assert!(!response.ok);
        assert!(response.message.contains("QR"));
    }

    #[test]
    fn submitted_incident_is_listed_for_reporter() {
        let user_id = unique_user("ffi-reporter");
        let response = submit_incident(
            user_id.clone(),
            "Broken fence on north side".to_string(),
            "high".to_string(),
            Some(-26.2041),
            Some(28.0473),
            Some(vec![0xFF, 0xD8, 0xFF]),
        );
        assert!(response.ok, "{}", response.message);
        assert!(response.message.contains("photo queued for upload"));

        let listed = list_incidents(Some(user_id), None);
        assert_eq!(listed.items.len(), 1);
        let item = &listed.items[0];
        assert_eq!(item.severity, "HIGH");
        assert_eq!(item.status, "REPORTED");
        assert_eq!(item.location, "Lat: -26.204100, Lng: 28.047300");
        assert!(item.photo_path.is_none());
    }

    #[test]
    fn submit_incident_rejects_blank_description() {
        let response = submit_incident(
            unique_user("ffi-blank-incident"),
            "   ".to_string(),
            "LOW".to_string(),
            None,
            None,
            None,
        );
        assert!(!response.ok);
    }

    #[test]
    fn classify_notification_maps_emergency() {
        let mut data = HashMap::new();
        data.insert("type".to_string(), "emergency".to_string());
        let response = classify_notification(data);
        assert_eq!(response.title, "EMERGENCY ALERT");
        assert!(response.emergency);
    }

    #[test]
    fn sync_now_drains_writes_and_photos_once_backend_is_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        let incident_id = with_context_using(&config, offline(), |ctx| {
            Ok(report_incident(ctx, "g1", Some(vec![0xFF, 0xD8])))
        })
        .unwrap();

        let offline_pass = with_context_using(&config, offline(), |ctx| run_sync(ctx, None)).unwrap();
        assert!(!offline_pass.ok);
        assert_eq!(offline_pass.pushed, 0);
        assert!(offline_pass.remaining >= 2);

        let backend = Arc::new(MemoryBackend::new());
        let online = BackendHandle::from_shared(backend.clone());
        let response = with_context_using(&config, online, |ctx| run_sync(ctx, Some("g1"))).unwrap();
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.uploaded, 1);
        assert_eq!(response.remaining, 0);
        assert!(response.pushed >= 1);
        assert_eq!(response.pulled, 1);

        let remote = backend.document(INCIDENTS, &incident_id).unwrap();
        assert!(remote["photoPath"]
            .as_str()
            .unwrap()
            .starts_with("memory://incident_photos/"));
    }

    #[test]
    fn sign_in_and_dashboard_run_against_an_online_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        let online = BackendHandle::from_shared(Arc::new(MemoryBackend::new()));

        let (session, dashboard) = with_context_using(&config, online, |ctx| {
            AuthService::new(ctx.store.clone(), ctx.backend.auth.clone())
                .seed_demo_users(DEMO_PASSWORD)
                .unwrap();
            let guard = start_session(ctx, "guard@estateguard.com", DEMO_PASSWORD)?;
            ctx.clock()
                .record_clock(&guard.id, ClockRequest::manual(None))
                .unwrap();
            report_incident(ctx, &guard.id, None);
            let snapshot = AdminService::new(ctx.store.clone(), ctx.config)
                .dashboard(now_epoch_ms())
                .unwrap();
            Ok((to_session_response(guard), to_dashboard_response(snapshot)))
        })
        .unwrap();

        assert!(session.ok);
        assert_eq!(session.role, "SECURITY_GUARD");
        assert_eq!(session.name, "Michael Johnson");
        assert_eq!(dashboard.total_users, 2);
        assert_eq!(dashboard.total_incidents, 1);
        assert_eq!(dashboard.guards_on_duty.len(), 1);
        assert_eq!(dashboard.recent_incidents[0].severity, "MEDIUM");

        let wrong = with_context_using(&config, offline(), |ctx| {
            start_session(ctx, "guard@estateguard.com", DEMO_PASSWORD)
        });
        assert!(wrong.is_err());
    }

    #[test]
    fn status_update_parses_status_and_reports_queueing() {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(&dir);
        with_context_using(&config, offline(), |ctx| {
            let incident_id = report_incident(ctx, "g1", None);

            let moved = change_status(ctx, &incident_id, " investigating ", "admin-1")?;
            assert!(moved.ok);
            assert!(moved.queued);
            assert_eq!(moved.message, "Incident moved to INVESTIGATING.");

            let again = change_status(ctx, &incident_id, "INVESTIGATING", "admin-1")?;
            assert_eq!(again.message, "Incident already INVESTIGATING.");

            let unknown = change_status(ctx, &incident_id, "archived", "admin-1").unwrap_err();
            assert!(unknown.contains("archived"));
            assert!(change_status(ctx, "missing", "CLOSED", "admin-1").is_err());
            Ok(())
        })
        .unwrap();
    }
}
