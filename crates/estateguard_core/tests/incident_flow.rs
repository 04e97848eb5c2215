use estateguard_core::backend::collections::{INCIDENTS, USERS};
use estateguard_core::backend::memory::MemoryBackend;
use estateguard_core::backend::DocumentStore;
use estateguard_core::db::open_db_in_memory;
use estateguard_core::repo::upload_repo::UploadRepository;
use estateguard_core::service::{
    IncidentDraft, IncidentService, IncidentServiceError, IncidentWarning, Notifier,
};
use estateguard_core::time::local_day_start_ms;
use estateguard_core::{
    AppSettings, GeoPoint, IncidentSeverity, IncidentStatus, SaveOutcome, SyncedStore, User,
    UserRole,
};
use serde_json::json;
use std::sync::Arc;

const NOW: i64 = 1_700_000_000_000;

fn service<'conn>(store: SyncedStore<'conn>, backend: &Arc<MemoryBackend>) -> IncidentService<'conn> {
    service_with_settings(store, backend, AppSettings::default())
}

fn service_with_settings<'conn>(
    store: SyncedStore<'conn>,
    backend: &Arc<MemoryBackend>,
    settings: AppSettings,
) -> IncidentService<'conn> {
    IncidentService::new(
        store,
        backend.clone(),
        Notifier::new(backend.clone(), backend.clone()),
        settings,
    )
}

fn register_user(backend: &MemoryBackend, user: &User, token: Option<&str>) {
    let mut document = serde_json::to_value(user).unwrap();
    if let Some(token) = token {
        document["fcmToken"] = json!(token);
    }
    backend.set_document(USERS, &user.id, &document).unwrap();
}

fn draft(description: &str, severity: IncidentSeverity) -> IncidentDraft {
    IncidentDraft {
        description: description.to_string(),
        severity,
        ..IncidentDraft::default()
    }
}

#[test]
fn submit_uploads_photo_and_tags_location() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);

    let submission = service
        .submit_incident_at(
            "g1",
            IncidentDraft {
                description: "  Suspicious vehicle at gate  ".to_string(),
                severity: IncidentSeverity::Medium,
                location: Some(GeoPoint::new(-26.1, 28.2)),
                photo: Some(vec![0xFF, 0xD8, 0xFF, 0xE0]),
            },
            NOW,
        )
        .unwrap();

    let incident = &submission.incident;
    assert_eq!(incident.description, "Suspicious vehicle at gate");
    assert_eq!(incident.status, IncidentStatus::Reported);
    assert_eq!(incident.location.as_deref(), Some("Lat: -26.100000, Lng: 28.200000"));
    let expected_path = format!("incident_photos/incident_{}_{NOW}.jpg", incident.id);
    assert_eq!(
        incident.photo_path.as_deref(),
        Some(format!("memory://{expected_path}").as_str())
    );
    assert_eq!(backend.object(&expected_path), Some(vec![0xFF, 0xD8, 0xFF, 0xE0]));
    assert!(submission.warnings.is_empty());
    assert!(submission.outcome.is_synced());
    assert_eq!(submission.notified_admins, 0);
    assert!(backend.document(INCIDENTS, &incident.id).is_some());
}

#[test]
fn missing_location_uses_placeholder_label() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);

    let submission = service
        .submit_incident_at("g1", draft("Light out", IncidentSeverity::Low), NOW)
        .unwrap();
    assert_eq!(
        submission.incident.location.as_deref(),
        Some("Location not available")
    );
    assert!(submission.incident.latitude.is_none());
}

#[test]
fn photo_problems_become_warnings() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let settings = AppSettings {
        max_photo_size_mb: 1,
        ..AppSettings::default()
    };
    let service = service_with_settings(SyncedStore::new(&conn, backend.clone()), &backend, settings);

    let mut oversized = draft("Graffiti on wall", IncidentSeverity::Low);
    oversized.photo = Some(vec![0; 1024 * 1024 + 1]);
    let submission = service.submit_incident_at("g1", oversized, NOW).unwrap();
    assert!(submission.incident.photo_path.is_none());
    assert_eq!(
        submission.warnings,
        vec![IncidentWarning::PhotoTooLarge {
            size_bytes: 1024 * 1024 + 1,
            limit_bytes: 1024 * 1024,
        }]
    );

    let mut failing = draft("Broken camera", IncidentSeverity::Low);
    failing.photo = Some(vec![1, 2, 3]);
    backend.fail_next_calls(1);
    let submission = service.submit_incident_at("g1", failing, NOW + 1).unwrap();
    assert!(submission.incident.photo_path.is_none());
    assert!(matches!(
        submission.warnings.as_slice(),
        [IncidentWarning::PhotoQueued { .. }]
    ));
}

#[test]
fn queued_photo_is_uploaded_on_next_flush() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());
    let service = service(store.clone(), &backend);

    backend.set_offline(true);
    let mut with_photo = draft("Fence cut near pump house", IncidentSeverity::Medium);
    with_photo.photo = Some(vec![0xFF, 0xD8, 0x01]);
    let submission = service.submit_incident_at("g1", with_photo, NOW).unwrap();
    let incident_id = submission.incident.id.clone();
    assert!(matches!(submission.outcome, SaveOutcome::Queued { .. }));
    assert_eq!(store.pending_upload_count().unwrap(), 1);

    backend.set_offline(false);
    store.flush_outbox().unwrap();
    let report = store.flush_uploads(backend.as_ref()).unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.remaining, 0);

    let expected_path = format!("incident_photos/incident_{incident_id}_{NOW}.jpg");
    assert_eq!(backend.object(&expected_path), Some(vec![0xFF, 0xD8, 0x01]));
    let url = format!("memory://{expected_path}");
    assert_eq!(
        service.get_incident(&incident_id).unwrap().unwrap().photo_path,
        Some(url.clone())
    );
    assert_eq!(backend.document(INCIDENTS, &incident_id).unwrap()["photoPath"], url);
}

#[test]
fn photo_waits_in_queue_while_storage_stays_down() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());
    let service = service(store.clone(), &backend);

    backend.set_offline(true);
    let mut with_photo = draft("Gate motor burnt out", IncidentSeverity::Low);
    with_photo.photo = Some(vec![7; 16]);
    service.submit_incident_at("g1", with_photo, NOW).unwrap();

    let report = store.flush_uploads(backend.as_ref()).unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.remaining, 1);
    let pending = store.uploads().list_pending().unwrap();
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[0].bytes, vec![7; 16]);
}

#[test]
fn blank_description_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);

    let err = service
        .submit_incident_at("g1", draft(" \n ", IncidentSeverity::High), NOW)
        .unwrap_err();
    assert!(matches!(err, IncidentServiceError::EmptyDescription));
    assert!(service.all_incidents().unwrap().is_empty());
}

#[test]
fn high_severity_alerts_active_admins_with_tokens() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);

    register_user(
        &backend,
        &User::new("a1", "a1@x.io", "Alert Admin", UserRole::Admin, 0),
        Some("token-a1"),
    );
    register_user(
        &backend,
        &User::new("a2", "a2@x.io", "Tokenless Admin", UserRole::Admin, 0),
        None,
    );
    let mut retired = User::new("a3", "a3@x.io", "Retired Admin", UserRole::Admin, 0);
    retired.deactivate();
    register_user(&backend, &retired, Some("token-a3"));
    register_user(
        &backend,
        &User::new("g9", "g9@x.io", "Other Guard", UserRole::SecurityGuard, 0),
        Some("token-g9"),
    );

    let low = service
        .submit_incident_at("g1", draft("Litter", IncidentSeverity::Low), NOW)
        .unwrap();
    assert_eq!(low.notified_admins, 0);

    let critical = service
        .submit_incident_at("g1", draft("Armed intruder", IncidentSeverity::Critical), NOW)
        .unwrap();
    assert_eq!(critical.notified_admins, 1);
    let sent = backend.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "token-a1");
    assert_eq!(sent[0].title, "CRITICAL Incident Reported");
    assert_eq!(sent[0].body, "Armed intruder...");
}

#[test]
fn resolving_notifies_reporter_and_repeat_is_noop() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);
    register_user(
        &backend,
        &User::new("g1", "g1@x.io", "Guard", UserRole::SecurityGuard, 0),
        Some("token-g1"),
    );

    let id = service
        .submit_incident_at("g1", draft("Alarm triggered", IncidentSeverity::Medium), NOW)
        .unwrap()
        .incident
        .id;

    let investigating = service
        .update_status(&id, IncidentStatus::Investigating, "a1")
        .unwrap();
    assert!(investigating.changed);
    assert_eq!(investigating.previous, IncidentStatus::Reported);
    assert!(!investigating.reporter_notified);

    let resolved = service
        .update_status(&id, IncidentStatus::Resolved, "a1")
        .unwrap();
    assert!(resolved.reporter_notified);
    assert_eq!(backend.sent_messages()[0].title, "Incident Resolved");
    assert_eq!(backend.document(INCIDENTS, &id).unwrap()["status"], "RESOLVED");

    let repeat = service
        .update_status(&id, IncidentStatus::Resolved, "a1")
        .unwrap();
    assert!(!repeat.changed);
    assert_eq!(backend.sent_messages().len(), 1);

    let err = service
        .update_status("missing", IncidentStatus::Closed, "a1")
        .unwrap_err();
    assert!(matches!(err, IncidentServiceError::NotFound(_)));
}

#[test]
fn batch_update_reports_each_id() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);

    let first = service
        .submit_incident_at("g1", draft("One", IncidentSeverity::Low), NOW)
        .unwrap()
        .incident
        .id;
    let second = service
        .submit_incident_at("g1", draft("Two", IncidentSeverity::Low), NOW + 1)
        .unwrap()
        .incident
        .id;
    service
        .update_status(&second, IncidentStatus::Closed, "a1")
        .unwrap();

    let ids = vec![first.clone(), second.clone(), "ghost".to_string()];
    let report = service
        .batch_update_status(&ids, IncidentStatus::Closed, "a1")
        .unwrap();
    assert_eq!(report.updated, vec![first]);
    assert_eq!(report.unchanged, vec![second]);
    assert_eq!(report.missing, vec!["ghost".to_string()]);
    assert_eq!(
        service
            .incidents_by_status(IncidentStatus::Closed)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn today_count_uses_local_day() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let service = service(SyncedStore::new(&conn, backend.clone()), &backend);
    let midday = local_day_start_ms(NOW) + 12 * 60 * 60 * 1000;

    service
        .submit_incident_at("g1", draft("Yesterday", IncidentSeverity::Low), midday - 24 * 60 * 60 * 1000)
        .unwrap();
    service
        .submit_incident_at("g1", draft("Today", IncidentSeverity::Low), midday)
        .unwrap();
    service
        .submit_incident_at("g2", draft("Other guard", IncidentSeverity::Low), midday)
        .unwrap();
    service
        .submit_incident_at("g1", draft("Tomorrow", IncidentSeverity::Low), midday + 24 * 60 * 60 * 1000)
        .unwrap();

    assert_eq!(service.today_count_for_user_at("g1", midday + 1).unwrap(), 1);
    assert_eq!(service.incidents_for_user("g1").unwrap().len(), 3);
    assert_eq!(
        service
            .incidents_in_range(midday, midday)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn maintenance_mode_pauses_reporting() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let settings = AppSettings {
        maintenance_mode: true,
        ..AppSettings::default()
    };
    let service = service_with_settings(SyncedStore::new(&conn, backend.clone()), &backend, settings);

    let err = service
        .submit_incident_at("g1", draft("Alarm tripped", IncidentSeverity::High), NOW)
        .unwrap_err();
    assert!(matches!(err, IncidentServiceError::MaintenanceMode));
    assert!(service.all_incidents().unwrap().is_empty());
}
