use chrono::{NaiveTime, Timelike};

use crate::model::attendance::AttendanceStatus;

/// First hour (inclusive) in which students may log their own attendance.
pub const LOGGING_START_HOUR: u32 = 8;
/// Last hour (inclusive) in which students may log their own attendance.
pub const LOGGING_END_HOUR: u32 = 21;

pub const LOGGING_WINDOW_MESSAGE: &str = "You can only log attendance between 08:00 and 21:59";

/// Arrivals up to and including this second count as on time.
pub const DEFAULT_CUTOFF: NaiveTime = match NaiveTime::from_hms_opt(8, 15, 0) {
    Some(time) => time,
    None => panic!("invalid cutoff time"),
};

/// Whether self-service logging is open at `now` (08:00 to 21:59).
pub fn is_logging_allowed(now: NaiveTime) -> bool {
    (LOGGING_START_HOUR..=LOGGING_END_HOUR).contains(&now.hour())
}

/// Status picked for a student who logs today without choosing one.
/// `Absent` is never chosen automatically.
pub fn resolve_auto_status(now: NaiveTime, cutoff: NaiveTime) -> AttendanceStatus {
    if now <= cutoff {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Late
    }
}

pub fn is_after_cutoff(now: NaiveTime) -> bool {
    now > DEFAULT_CUTOFF
}
