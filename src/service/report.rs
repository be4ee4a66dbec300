use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::{
    engine::{self, Grouping, summarize_by_group},
    error::{AttendanceError, storage_fault},
    model::{
        attendance::ReportFilter,
        report::{AttendanceReport, StudentDashboard},
        role::Role,
        student::{MAX_YEAR_LEVEL, MIN_YEAR_LEVEL},
        user::SystemStats,
    },
    store::{AttendanceStore, CourseStore, StudentStore, UserStore},
};

/// Records shown on the student dashboard.
pub const RECENT_RECORDS: usize = 5;

pub struct ReportService {
    attendance: Arc<dyn AttendanceStore>,
    courses: Arc<dyn CourseStore>,
    students: Arc<dyn StudentStore>,
    users: Arc<dyn UserStore>,
}

impl ReportService {
    pub fn new(
        attendance: Arc<dyn AttendanceStore>,
        courses: Arc<dyn CourseStore>,
        students: Arc<dyn StudentStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            attendance,
            courses,
            students,
            users,
        }
    }

    pub async fn student_dashboard(
        &self,
        student_id: &str,
        now: NaiveDateTime,
    ) -> Result<StudentDashboard, AttendanceError> {
        let student = self
            .students
            .find_by_student_id(student_id)
            .await
            .map_err(storage_fault("Failed to fetch student"))?
            .ok_or_else(|| AttendanceError::NotFound("Student not found".into()))?;

        let records = self
            .attendance
            .list_by_student(student_id)
            .await
            .map_err(storage_fault("Failed to fetch student attendance"))?;

        let today = now.date();
        Ok(StudentDashboard {
            student,
            summary: engine::summarize(&records),
            logged_today: records.iter().any(|r| r.date == today),
            recent: records.into_iter().take(RECENT_RECORDS).collect(),
            logging_open: engine::is_logging_allowed(now.time()),
            past_cutoff: engine::is_after_cutoff(now.time()),
        })
    }

    pub async fn system_stats(&self) -> Result<SystemStats, AttendanceError> {
        let fault = storage_fault("Failed to compute system stats");

        Ok(SystemStats {
            total_students: self.students.count().await.map_err(&fault)?,
            total_courses: self.courses.count().await.map_err(&fault)?,
            total_attendance_records: self.attendance.count().await.map_err(&fault)?,
            total_student_users: self
                .users
                .count_by_role(Role::Student)
                .await
                .map_err(&fault)?,
            total_admin_users: self.users.count_by_role(Role::Admin).await.map_err(&fault)?,
        })
    }

    /// Summaries of the filtered records, overall, per course and year level,
    /// and per student.
    pub async fn attendance_report(
        &self,
        filter: &ReportFilter,
    ) -> Result<AttendanceReport, AttendanceError> {
        let mut errors = Vec::new();
        if filter
            .year_level
            .is_some_and(|y| !(MIN_YEAR_LEVEL..=MAX_YEAR_LEVEL).contains(&y))
        {
            errors.push(format!(
                "Valid year level ({MIN_YEAR_LEVEL}-{MAX_YEAR_LEVEL}) is required"
            ));
        }
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                errors.push("Start date must not be after end date".to_string());
            }
        }
        if !errors.is_empty() {
            return Err(AttendanceError::Validation(errors));
        }

        let rows = self
            .attendance
            .report_rows(filter)
            .await
            .map_err(storage_fault("Failed to fetch report rows"))?;
        debug!(rows = rows.len(), unfiltered = filter.is_empty(), "Building report");

        Ok(AttendanceReport {
            overall: engine::summarize(&rows),
            by_course: summarize_by_group(&rows, Grouping::CourseAndYear),
            by_student: summarize_by_group(&rows, Grouping::Student),
        })
    }
}
