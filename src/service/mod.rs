//! Validation and orchestration over the store traits. Handlers call these;
//! nothing here knows about HTTP.

pub mod account;
pub mod attendance;
pub mod course;
pub mod report;
pub mod student;

pub use account::AccountService;
pub use attendance::AttendanceService;
pub use course::CourseService;
pub use report::ReportService;
pub use student::StudentService;

/// Trimmed value, or `None` when missing or blank.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
