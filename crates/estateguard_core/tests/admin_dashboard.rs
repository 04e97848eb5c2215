use estateguard_core::backend::collections::{APP_CONFIG_DOC, AUDIT_LOGS, SETTINGS, USERS};
use estateguard_core::backend::memory::MemoryBackend;
use estateguard_core::backend::DocumentStore;
use estateguard_core::db::open_db_in_memory;
use estateguard_core::service::AdminService;
use estateguard_core::time::{local_day_start_ms, DAY_MS};
use estateguard_core::{
    AppSettings, CoreConfig, Incident, IncidentSeverity, SaveOutcome, SyncedStore, TimeEntry,
    TimeEntryType, User, UserRole,
};
use serde_json::json;
use std::sync::Arc;

const HOUR_MS: i64 = 60 * 60 * 1000;

fn midday() -> i64 {
    local_day_start_ms(1_700_000_000_000) + 12 * HOUR_MS
}

fn seed_workforce(store: &SyncedStore<'_>, now: i64) {
    store
        .save_user(&User::new("admin", "admin@x.io", "Admin", UserRole::Admin, 0))
        .unwrap();
    for id in ["fresh", "overdue", "off", "gone"] {
        store
            .save_user(&User::new(id, format!("{id}@x.io"), id, UserRole::SecurityGuard, 0))
            .unwrap();
    }
    store.deactivate_user("gone").unwrap();

    let clock = |id: &str, user: &str, at: i64, kind: TimeEntryType| {
        store
            .save_time_entry(&TimeEntry::new(id, user, at, kind))
            .unwrap();
    };
    clock("f-in", "fresh", now - HOUR_MS, TimeEntryType::ClockIn);
    clock("o-in", "overdue", now - 13 * HOUR_MS, TimeEntryType::ClockIn);
    clock("x-in", "off", now - 9 * HOUR_MS, TimeEntryType::ClockIn);
    clock("x-out", "off", now - HOUR_MS, TimeEntryType::ClockOut);
    clock("g-in", "gone", now - HOUR_MS, TimeEntryType::ClockIn);
}

#[test]
fn dashboard_aggregates_workforce_and_incidents() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());
    let now = midday();
    seed_workforce(&store, now);

    for index in 0..12 {
        store
            .save_incident(&Incident::new(
                format!("today-{index:02}"),
                "fresh",
                "report",
                now - index * 60_000,
            ))
            .unwrap();
    }
    store
        .save_incident(&Incident::new("old", "off", "report", now - 2 * DAY_MS))
        .unwrap();

    let admin = AdminService::new(store, &CoreConfig::default());
    let snapshot = admin.dashboard(now).unwrap();

    assert_eq!(snapshot.total_users, 5);
    assert_eq!(snapshot.active_guards, 3);
    assert_eq!(snapshot.total_incidents, 13);
    assert_eq!(snapshot.today_incidents, 12);
    assert_eq!(snapshot.recent_incidents.len(), 10);
    assert_eq!(snapshot.recent_incidents[0].id, "today-00");

    let on_duty: Vec<(&str, bool)> = snapshot
        .guards_on_duty
        .iter()
        .map(|duty| (duty.user_id.as_str(), duty.overdue))
        .collect();
    assert_eq!(on_duty, vec![("fresh", false), ("overdue", true)]);
    assert_eq!(snapshot.overdue_guards, 1);
}

#[test]
fn dashboard_honors_remote_auto_clock_out_window() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());
    let now = midday();
    seed_workforce(&store, now);

    let admin = AdminService::new(store, &CoreConfig::default());
    let settings = AppSettings {
        auto_clock_out_hours: 24,
        ..AppSettings::default()
    };
    admin.update_settings(&settings, "admin").unwrap();

    let snapshot = admin.dashboard(now).unwrap();
    assert_eq!(snapshot.overdue_guards, 0);
}

#[test]
fn incident_stats_count_by_severity() {
    let conn = open_db_in_memory().unwrap();
    let store = SyncedStore::new(&conn, Arc::new(MemoryBackend::new()));
    for (id, severity, at) in [
        ("a", IncidentSeverity::High, 100),
        ("b", IncidentSeverity::High, 200),
        ("c", IncidentSeverity::Critical, 300),
        ("d", IncidentSeverity::Low, 5_000),
    ] {
        let mut incident = Incident::new(id, "g1", "report", at);
        incident.severity = severity;
        store.save_incident(&incident).unwrap();
    }

    let stats = AdminService::new(store, &CoreConfig::default())
        .incident_stats(0, 1_000)
        .unwrap();
    assert_eq!(stats[&IncidentSeverity::High], 2);
    assert_eq!(stats[&IncidentSeverity::Critical], 1);
    assert_eq!(stats[&IncidentSeverity::Low], 0);
    assert_eq!(stats[&IncidentSeverity::Medium], 0);
}

#[test]
fn deactivate_user_soft_deletes_and_audits() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());
    store
        .save_user(&User::new("g1", "g1@x.io", "Guard", UserRole::SecurityGuard, 0))
        .unwrap();
    let admin = AdminService::new(store, &CoreConfig::default());

    assert!(admin.deactivate_user("g1", "admin").unwrap().is_synced());
    assert!(admin.active_users().unwrap().is_empty());
    let everyone = admin.all_users().unwrap();
    assert_eq!(everyone.len(), 1);
    assert!(!everyone[0].is_active);
    assert_eq!(backend.document(USERS, "g1").unwrap()["isActive"], false);
    assert_eq!(backend.document_count(AUDIT_LOGS), 1);
    assert!(admin.deactivate_user("ghost", "admin").is_err());
}

#[test]
fn settings_fall_back_to_defaults_and_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let admin = AdminService::new(SyncedStore::new(&conn, backend.clone()), &CoreConfig::default());

    assert_eq!(admin.load_settings(), AppSettings::default());

    let settings = AppSettings {
        maintenance_mode: true,
        max_photo_size_mb: 5,
        ..AppSettings::default()
    };
    assert!(admin.update_settings(&settings, "admin").unwrap().is_synced());
    let remote = backend.document(SETTINGS, APP_CONFIG_DOC).unwrap();
    assert_eq!(remote["maxPhotoSizeMB"], 5);
    assert_eq!(admin.load_settings(), settings);

    let changed = AppSettings {
        clock_in_radius: 250,
        ..settings.clone()
    };
    admin.update_settings(&changed, "admin").unwrap();
    assert_eq!(admin.load_settings().clock_in_radius, 250);

    backend.set_offline(true);
    assert_eq!(admin.load_settings(), AppSettings::default());
}

#[test]
fn offline_settings_update_lands_when_document_is_new() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());
    let admin = AdminService::new(store.clone(), &CoreConfig::default());

    backend.set_offline(true);
    let settings = AppSettings {
        clock_in_radius: 250,
        ..AppSettings::default()
    };
    let outcome = admin.update_settings(&settings, "admin").unwrap();
    assert!(matches!(outcome, SaveOutcome::Queued { .. }));

    backend.set_offline(false);
    let report = store.flush_outbox().unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.remaining, 0);
    assert_eq!(admin.load_settings().clock_in_radius, 250);
    assert_eq!(store.flush_outbox().unwrap().pushed, 0);
}

#[test]
fn settings_update_keeps_unmodelled_fields() {
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    backend
        .set_document(
            SETTINGS,
            APP_CONFIG_DOC,
            &json!({"appVersion": "1.0.0", "clockInRadius": 100}),
        )
        .unwrap();
    let admin = AdminService::new(SyncedStore::new(&conn, backend.clone()), &CoreConfig::default());

    let settings = AppSettings {
        clock_in_radius: 75,
        ..AppSettings::default()
    };
    assert!(admin.update_settings(&settings, "admin").unwrap().is_synced());

    let remote = backend.document(SETTINGS, APP_CONFIG_DOC).unwrap();
    assert_eq!(remote["appVersion"], "1.0.0");
    assert_eq!(remote["clockInRadius"], 75);
    assert!(remote["updatedAt"].is_i64());
}
