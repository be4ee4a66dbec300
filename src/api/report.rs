use actix_web::{HttpResponse, web};

use crate::{
    auth::session::SessionContext,
    error::AttendanceError,
    model::{
        attendance::ReportFilter,
        report::AdminDashboard,
    },
    service::{CourseService, ReportService},
};

/// Attendance report
///
/// Summaries per course and year level and per student, optionally narrowed
/// to a course, a year level and a date range.
#[utoipa::path(
    get,
    path = "/reports/attendance",
    params(ReportFilter),
    responses(
        (status = 200, description = "Report", body = crate::model::report::AttendanceReport),
        (status = 400, description = "Invalid filter")
    ),
    tag = "Report",
    security(("bearer_auth" = []))
)]
pub async fn attendance_report(
    session: SessionContext,
    service: web::Data<ReportService>,
    filter: web::Query<ReportFilter>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.attendance_report(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "System statistics and courses", body = AdminDashboard)
    ),
    tag = "Report",
    security(("bearer_auth" = []))
)]
pub async fn admin_dashboard(
    session: SessionContext,
    reports: web::Data<ReportService>,
    courses: web::Data<CourseService>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let dashboard = AdminDashboard {
        stats: reports.system_stats().await?,
        courses: courses.list().await?,
    };

    Ok(HttpResponse::Ok().json(dashboard))
}
