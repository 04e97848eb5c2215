//! Local-day arithmetic pinned to a zone with DST.
//!
//! Every test sets `TZ` before the first local-time call on its thread, and
//! all of them use the same zone, so parallel tests in this binary agree.

use estateguard_core::backend::memory::MemoryBackend;
use estateguard_core::db::open_db_in_memory;
use estateguard_core::service::{AdminService, IncidentService, Notifier};
use estateguard_core::time::{local_day_bounds_ms, local_day_start_ms};
use estateguard_core::{AppSettings, CoreConfig, Incident, SyncedStore};
use std::sync::Arc;

const HOUR_MS: i64 = 60 * 60 * 1000;

// 2025-10-26 is a 25 hour day in London (BST ends at 01:00 UTC).
const AUTUMN_START: i64 = 1_761_433_200_000; // 2025-10-25T23:00Z
const AUTUMN_NEXT: i64 = 1_761_523_200_000; // 2025-10-27T00:00Z
const AUTUMN_LATE: i64 = 1_761_521_400_000; // 2025-10-26T23:30Z

// 2025-03-30 is a 23 hour day (BST starts at 01:00 UTC).
const SPRING_START: i64 = 1_743_292_800_000; // 2025-03-30T00:00Z
const SPRING_NEXT: i64 = 1_743_375_600_000; // 2025-03-30T23:00Z
const SPRING_NOON: i64 = 1_743_336_000_000; // 2025-03-30T12:00Z

fn pin_london() {
    std::env::set_var("TZ", "Europe/London");
}

#[test]
fn autumn_day_spans_twenty_five_hours() {
    pin_london();
    let (start, end) = local_day_bounds_ms(AUTUMN_LATE);
    assert_eq!(start, AUTUMN_START);
    assert_eq!(end, AUTUMN_NEXT - 1);
    assert!(start <= AUTUMN_LATE && AUTUMN_LATE <= end);
    assert_eq!(end + 1 - start, 25 * HOUR_MS);
}

#[test]
fn spring_day_spans_twenty_three_hours() {
    pin_london();
    let (start, end) = local_day_bounds_ms(SPRING_NOON);
    assert_eq!(start, SPRING_START);
    assert_eq!(end, SPRING_NEXT - 1);
    assert_eq!(end + 1 - start, 23 * HOUR_MS);
    assert_eq!(local_day_start_ms(SPRING_NEXT), SPRING_NEXT);
}

#[test]
fn dashboard_and_reporter_counts_share_day_bounds() {
    pin_london();
    let conn = open_db_in_memory().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let store = SyncedStore::new(&conn, backend.clone());

    // 23:30 BST on the previous day, then the last hour of the long day.
    store
        .save_incident(&Incident::new("eve", "g1", "report", AUTUMN_START - 30 * 60_000))
        .unwrap();
    store
        .save_incident(&Incident::new("late", "g1", "report", AUTUMN_LATE - 15 * 60_000))
        .unwrap();
    store
        .save_incident(&Incident::new("tomorrow", "g1", "report", AUTUMN_NEXT))
        .unwrap();

    let dashboard = AdminService::new(store.clone(), &CoreConfig::default())
        .dashboard(AUTUMN_LATE)
        .unwrap();
    let incidents = IncidentService::new(
        store,
        backend.clone(),
        Notifier::new(backend.clone(), backend),
        AppSettings::default(),
    );
    let reporter_today = incidents.today_count_for_user_at("g1", AUTUMN_LATE).unwrap();

    assert_eq!(dashboard.today_incidents, 1);
    assert_eq!(reporter_today, 1);
}
