use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::auth::handlers::LoginResponse;
use crate::engine::{AttendanceSummary, GroupKey, GroupSummary};
use crate::model::{
    attendance::{
        AttendanceForm, AttendanceHistory, AttendanceRecord, AttendanceStatus,
        AttendanceWithStudent, LogAttendanceForm, LoggedAttendance, UpsertOutcome,
    },
    course::{Course, CourseForm, CourseStats, CourseWithStats},
    report::{AdminDashboard, AttendanceReport, StudentDashboard},
    role::Role,
    student::{Student, StudentDetail, StudentForm},
    user::SystemStats,
};
use crate::models::{ChangePasswordReq, CreateAccountReq, LoginReqDto, RegisterReq};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Attendance API",
        version = "1.0.0",
        description = r#"
## School Attendance Service

Administrators manage courses, students and attendance records; students log
their own daily attendance and follow their statistics.

### Attendance rules
- A student has at most one record per day; logging again replaces it.
- Today's attendance can be self-logged between **08:00 and 21:59**.
- Without a chosen status, a log up to **08:15:00** is `Present`, later is `Late`.
- Percentages count `Present` only and are rounded to one decimal.

### Security
Endpoints outside `/auth` need a **JWT Bearer** access token from `/auth/login`.
Management endpoints are restricted to the `admin` role; `/api/me/*` to students.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::me::log_attendance,
        crate::api::me::attendance_history,
        crate::api::me::dashboard,
        crate::api::me::change_password,

        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::mark_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::course::create_course,
        crate::api::course::list_courses,
        crate::api::course::get_course,
        crate::api::course::update_course,
        crate::api::course::delete_course,
        crate::api::course::course_year_levels,
        crate::api::course::course_students,

        crate::api::student::create_student,
        crate::api::student::list_students,
        crate::api::student::get_student,
        crate::api::student::update_student,
        crate::api::student::delete_student,
        crate::api::student::next_student_id,
        crate::api::student::students_without_accounts,
        crate::api::student::create_student_account,

        crate::api::report::attendance_report,
        crate::api::report::admin_dashboard
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            ChangePasswordReq,
            CreateAccountReq,
            Role,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceWithStudent,
            AttendanceForm,
            LogAttendanceForm,
            LoggedAttendance,
            UpsertOutcome,
            AttendanceHistory,
            AttendanceSummary,
            GroupKey,
            GroupSummary,
            Course,
            CourseForm,
            CourseStats,
            CourseWithStats,
            Student,
            StudentForm,
            StudentDetail,
            SystemStats,
            StudentDashboard,
            AdminDashboard,
            AttendanceReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, registration and token rotation"),
        (name = "Student", description = "Student self-service APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Course", description = "Course management APIs"),
        (name = "Student Management", description = "Student management APIs"),
        (name = "Report", description = "Reports and dashboards"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// The document with every path outside `/auth` mounted under `api_prefix`.
    pub fn with_api_prefix(api_prefix: &str) -> openapi::OpenApi {
        let prefix = api_prefix.trim_end_matches('/');
        let mut doc = Self::openapi();

        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| {
                if path.starts_with("/auth/") {
                    (path, item)
                } else {
                    (format!("{prefix}{path}"), item)
                }
            })
            .collect();

        doc
    }
}
