//! Clock status derivation and shift pairing.
//!
//! # Invariants
//! - Status is derived only from the most recent entry; it is never stored.
//! - No entry at all means `ClockedOut`.

use super::time_entry::{TimeEntry, TimeEntryType};
use serde::{Deserialize, Serialize};

/// Whether a guard is currently on shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClockStatus {
    ClockedIn,
    ClockedOut,
}

impl ClockStatus {
    /// Derives status from the user's most recent entry.
    pub fn from_last_entry(last: Option<&TimeEntry>) -> Self {
        match last.map(|entry| entry.kind) {
            Some(TimeEntryType::ClockIn) => Self::ClockedIn,
            Some(TimeEntryType::ClockOut) | None => Self::ClockedOut,
        }
    }

    /// Entry type the next clock action must record.
    pub fn next_entry_type(self) -> TimeEntryType {
        match self {
            Self::ClockedOut => TimeEntryType::ClockIn,
            Self::ClockedIn => TimeEntryType::ClockOut,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClockedIn => "CLOCKED_IN",
            Self::ClockedOut => "CLOCKED_OUT",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ClockedIn => "Clocked In",
            Self::ClockedOut => "Clocked Out",
        }
    }
}

/// One worked shift reconstructed from clock entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub clock_in_id: String,
    pub clock_out_id: Option<String>,
    pub started_at: i64,
    /// `None` while the shift is still open.
    pub ended_at: Option<i64>,
}

impl Shift {
    /// Worked milliseconds, measured up to `now` for an open shift.
    pub fn duration_ms(&self, now: i64) -> i64 {
        self.ended_at.unwrap_or(now).saturating_sub(self.started_at).max(0)
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Pairs each clock-out with the latest preceding clock-in.
///
/// Input order does not matter. Clock-outs with no preceding clock-in are
/// skipped; a trailing clock-in yields an open shift.
pub fn pair_shifts(entries: &[TimeEntry]) -> Vec<Shift> {
    let mut ordered: Vec<&TimeEntry> = entries.iter().collect();
    ordered.sort_by(|left, right| {
        left.timestamp
            .cmp(&right.timestamp)
            .then_with(|| left.id.cmp(&right.id))
    });

    let mut shifts = Vec::new();
    let mut open: Option<&TimeEntry> = None;
    for entry in ordered {
        match entry.kind {
            TimeEntryType::ClockIn => open = Some(entry),
            TimeEntryType::ClockOut => {
                if let Some(start) = open.take() {
                    shifts.push(Shift {
                        clock_in_id: start.id.clone(),
                        clock_out_id: Some(entry.id.clone()),
                        started_at: start.timestamp,
                        ended_at: Some(entry.timestamp),
                    });
                }
            }
        }
    }
    if let Some(start) = open {
        shifts.push(Shift {
            clock_in_id: start.id.clone(),
            clock_out_id: None,
            started_at: start.timestamp,
            ended_at: None,
        });
    }
    shifts
}
