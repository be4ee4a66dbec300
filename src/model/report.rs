use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    engine::{AttendanceSummary, GroupSummary},
    model::{
        attendance::AttendanceRecord, course::CourseWithStats, student::Student,
        user::SystemStats,
    },
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentDashboard {
    pub student: Student,
    /// Over the student's whole history
    pub summary: AttendanceSummary,
    /// Most recent records, newest first
    pub recent: Vec<AttendanceRecord>,
    pub logged_today: bool,
    /// Whether self-service logging is open right now
    pub logging_open: bool,
    /// Whether a log made now would count as Late
    pub past_cutoff: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub stats: SystemStats,
    pub courses: Vec<CourseWithStats>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceReport {
    pub overall: AttendanceSummary,
    /// One entry per course and year level
    pub by_course: Vec<GroupSummary>,
    /// One entry per student
    pub by_student: Vec<GroupSummary>,
}
