//! Wall-clock helpers shared by services.
//!
//! All stored timestamps are Unix epoch milliseconds; only calendar-day
//! boundaries and display strings depend on the device's local time zone.

use chrono::{Local, NaiveDate, TimeZone};

/// Milliseconds in one calendar day without DST shifts.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Current time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Start of the local calendar day containing `epoch_ms`.
pub fn local_day_start_ms(epoch_ms: i64) -> i64 {
    local_date(epoch_ms)
        .and_then(local_midnight_ms)
        .unwrap_or_else(|| epoch_ms - epoch_ms.rem_euclid(DAY_MS))
}

/// Inclusive `[start, end]` bounds of the local day containing `epoch_ms`.
///
/// `end` is one millisecond before the next local midnight, so 23 and 25
/// hour days around DST changes are covered exactly.
pub fn local_day_bounds_ms(epoch_ms: i64) -> (i64, i64) {
    let start = local_day_start_ms(epoch_ms);
    let next_start = local_date(epoch_ms)
        .and_then(|date| date.succ_opt())
        .and_then(local_midnight_ms)
        .unwrap_or(start + DAY_MS);
    (start, next_start - 1)
}

fn local_date(epoch_ms: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|moment| moment.date_naive())
}

/// First instant of `date` in local time.
fn local_midnight_ms(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|start| start.timestamp_millis())
}

/// Formats a timestamp as `HH:MM - DD/MM/YYYY` in local time.
pub fn format_local(epoch_ms: i64) -> String {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|moment| moment.format("%H:%M - %d/%m/%Y").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::{format_local, local_day_bounds_ms, local_day_start_ms, DAY_MS};

    #[test]
    fn day_start_is_not_after_input_and_within_a_day() {
        let now = 1_760_000_000_123;
        let start = local_day_start_ms(now);
        assert!(start <= now);
        assert!(now - start < DAY_MS + 60 * 60 * 1000);
        assert_eq!(local_day_start_ms(start), start);
    }

    #[test]
    fn bounds_cover_the_input() {
        let now = 1_760_000_000_123;
        let (start, end) = local_day_bounds_ms(now);
        assert!(start <= now && now <= end);
    }

    #[test]
    fn format_matches_display_pattern() {
        let formatted = format_local(1_760_000_000_000);
        assert_eq!(formatted.len(), "HH:MM - DD/MM/YYYY".len());
        assert_eq!(&formatted[2..3], ":");
        assert_eq!(&formatted[5..8], " - ");
    }
}
