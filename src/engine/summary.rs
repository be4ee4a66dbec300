use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::attendance::{AttendanceEntry, AttendanceStatus, ReportRow};

/// Decimal places kept in every attendance percentage.
pub const PERCENTAGE_DECIMALS: u32 = 1;

/// `part / whole` as a percentage, rounded half away from zero to
/// [`PERCENTAGE_DECIMALS`]. Rounding happens on integers so exact halves
/// such as 23/80 = 28.75 are not lost to float error.
pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }

    let factor = 10u64.pow(PERCENTAGE_DECIMALS);
    let (part, whole) = (u64::from(part), u64::from(whole));
    let scaled = (2 * part * 100 * factor + whole) / (2 * whole);

    scaled as f64 / factor as f64
}

/// Counts over a set of records. `percentage` is the share of `Present`
/// records; `Late` counts toward `total` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub total: u32,
    pub present: u32,
    pub late: u32,
    pub absent: u32,
    #[schema(example = 50.0)]
    pub percentage: f64,
}

impl AttendanceSummary {
    fn add(&mut self, status: AttendanceStatus) {
        self.total += 1;
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.percentage = percentage(self.present, self.total);
        self
    }
}

pub fn summarize<'a, T, I>(records: I) -> AttendanceSummary
where
    T: AttendanceEntry + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut summary = AttendanceSummary::default();
    for record in records {
        summary.add(record.status());
    }
    summary.finish()
}

/// How report rows are bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One group per (course, year level).
    CourseAndYear,
    /// One group per student within (course, year level).
    Student,
}

/// Field order gives the report order: course name, year level, then the
/// student's last name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
pub struct GroupKey {
    pub course_name: Option<String>,
    pub year_level: Option<u8>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub student_id: Option<String>,
    pub course_code: Option<String>,
}

impl GroupKey {
    fn of(row: &ReportRow, grouping: Grouping) -> Self {
        let per_student = grouping == Grouping::Student;
        let when = |value: &Option<String>| value.clone().filter(|_| per_student);

        GroupKey {
            course_name: row.course_name.clone(),
            year_level: row.year_level,
            last_name: when(&row.last_name),
            first_name: when(&row.first_name),
            student_id: per_student.then(|| row.record.student_id.clone()),
            course_code: row.course_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub key: GroupKey,
    #[serde(flatten)]
    pub summary: AttendanceSummary,
}

/// Groups report rows and summarizes each group. Groups without records are
/// left out.
pub fn summarize_by_group(rows: &[ReportRow], grouping: Grouping) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<GroupKey, AttendanceSummary> = BTreeMap::new();
    for row in rows {
        groups
            .entry(GroupKey::of(row, grouping))
            .or_default()
            .add(row.record.status);
    }

    groups
        .into_iter()
        .map(|(key, summary)| GroupSummary {
            key,
            summary: summary.finish(),
        })
        .filter(|group| group.summary.total > 0)
        .collect()
}

/// Keeps the records matching every given predicate; `None` matches all.
pub fn filter_by_month_year_status<T>(
    records: &[T],
    month: Option<u32>,
    year: Option<i32>,
    status: Option<AttendanceStatus>,
) -> Vec<T>
where
    T: AttendanceEntry + Clone,
{
    records
        .iter()
        .filter(|r| month.is_none_or(|m| r.date().month() == m))
        .filter(|r| year.is_none_or(|y| r.date().year() == y))
        .filter(|r| status.is_none_or(|s| r.status() == s))
        .cloned()
        .collect()
}

/// Distinct months (ascending) and years (newest first) present in `records`.
pub fn available_months_and_years<T: AttendanceEntry>(records: &[T]) -> (Vec<u32>, Vec<i32>) {
    let months: BTreeSet<u32> = records.iter().map(|r| r.date().month()).collect();
    let years: BTreeSet<i32> = records.iter().map(|r| r.date().year()).collect();

    (months.into_iter().collect(), years.into_iter().rev().collect())
}
