use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::engine::AttendanceSummary;

/// Attendance status for one student on one day.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "student_id": "2026-001",
        "date": "2026-01-12",
        "status": "Present",
        "remarks": null,
        "created_at": "2026-01-12T08:05:00",
        "updated_at": "2026-01-12T08:05:00"
    })
)]
pub struct AttendanceRecord {
    pub id: u64,

    #[schema(example = "2026-001")]
    pub student_id: String,

    #[schema(example = "2026-01-12", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,

    #[schema(nullable = true)]
    pub remarks: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,

    #[schema(value_type = String, format = "date-time")]
    pub updated_at: NaiveDateTime,
}

/// Attendance row joined with the student's name.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceWithStudent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Attendance row joined with the student's year level and course, the input
/// of the administrator reports.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct ReportRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub year_level: Option<u8>,
    pub course_id: Option<u64>,
    pub course_code: Option<String>,
    pub course_name: Option<String>,
}

/// A validated write, shared by inserts, updates and upserts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendance {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
}

/// Raw attendance form as submitted by an administrator or a student.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AttendanceForm {
    #[schema(example = "2026-001")]
    pub student_id: Option<String>,

    #[schema(example = "2026-01-12", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,

    /// One of Present, Absent, Late
    #[schema(example = "Present")]
    pub status: Option<String>,

    #[schema(example = "Doctor's appointment")]
    pub remarks: Option<String>,
}

/// Self-service logging form. Leaving `status` empty on today's date lets the
/// server pick Present or Late from the clock.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LogAttendanceForm {
    #[schema(example = "2026-01-12", value_type = Option<String>, format = "date")]
    pub attendance_date: Option<NaiveDate>,

    #[schema(example = "Absent")]
    pub status: Option<String>,

    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Filters of the administrator attendance report.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportFilter {
    /// Restrict to one course
    pub course_id: Option<u64>,
    /// Restrict to one year level (1-5)
    pub year_level: Option<u8>,
    /// Inclusive lower date bound (YYYY-MM-DD)
    #[param(value_type = Option<String>)]
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper date bound (YYYY-MM-DD)
    #[param(value_type = Option<String>)]
    pub date_to: Option<NaiveDate>,
}

impl ReportFilter {
    pub fn is_empty(&self) -> bool {
        self.course_id.is_none()
            && self.year_level.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// In-memory equivalent of the SQL filter.
    #[cfg(test)]
    pub fn matches(&self, row: &ReportRow) -> bool {
        let date = row.record.date;

        self.course_id.is_none_or(|id| row.course_id == Some(id))
            && self.year_level.is_none_or(|y| row.year_level == Some(y))
            && self.date_from.is_none_or(|from| date >= from)
            && self.date_to.is_none_or(|to| date <= to)
    }
}

/// Result of a self-service log.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LoggedAttendance {
    pub outcome: UpsertOutcome,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Filters of a student's attendance history; each one is optional.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// 1-12
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// Present, Absent or Late
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceHistory {
    pub records: Vec<AttendanceRecord>,
    /// Summary of the filtered records
    pub summary: AttendanceSummary,
    /// Months with records, ascending
    pub months: Vec<u32>,
    /// Years with records, newest first
    pub years: Vec<i32>,
}

/// Anything carrying a date and a status can be summarized and filtered.
pub trait AttendanceEntry {
    fn date(&self) -> NaiveDate;
    fn status(&self) -> AttendanceStatus;
}

impl AttendanceEntry for AttendanceRecord {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn status(&self) -> AttendanceStatus {
        self.status
    }
}

impl AttendanceEntry for AttendanceWithStudent {
    fn date(&self) -> NaiveDate {
        self.record.date
    }

    fn status(&self) -> AttendanceStatus {
        self.record.status
    }
}

impl AttendanceEntry for ReportRow {
    fn date(&self) -> NaiveDate {
        self.record.date
    }

    fn status(&self) -> AttendanceStatus {
        self.record.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip_through_strings() {
        assert_eq!("Late".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Late);
        assert_eq!(AttendanceStatus::Present.to_string(), "Present");
        assert!("present".parse::<AttendanceStatus>().is_err());
        assert!(AttendanceStatus::try_from(String::new()).is_err());
    }
}
