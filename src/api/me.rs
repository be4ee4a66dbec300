//! Student self-service endpoints. Every handler acts on the caller's own
//! student record.

use actix_web::{HttpResponse, web};
use chrono::Local;
use serde_json::json;

use crate::{
    auth::session::SessionContext,
    error::AttendanceError,
    model::attendance::{HistoryQuery, LogAttendanceForm},
    models::ChangePasswordReq,
    service::{AccountService, AttendanceService, ReportService},
};

/// Log my attendance
///
/// Leaving `status` empty for today records Present up to 08:15:00 and Late
/// after it. Today's attendance can only be logged between 08:00 and 21:59.
#[utoipa::path(
    post,
    path = "/me/attendance",
    request_body = LogAttendanceForm,
    responses(
        (status = 200, description = "Attendance saved", body = crate::model::attendance::LoggedAttendance),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not a student account"),
        (status = 422, description = "Outside the logging window", body = Object, example = json!({
            "message": "You can only log attendance between 08:00 and 21:59"
        }))
    ),
    tag = "Student",
    security(("bearer_auth" = []))
)]
pub async fn log_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    payload: web::Json<LogAttendanceForm>,
) -> Result<HttpResponse, AttendanceError> {
    let now = Local::now().naive_local();
    let logged = service.log_attendance(&session, &payload, now).await?;

    Ok(HttpResponse::Ok().json(logged))
}

/// My attendance history
#[utoipa::path(
    get,
    path = "/me/attendance",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Filtered records and their summary", body = crate::model::attendance::AttendanceHistory),
        (status = 400, description = "Invalid filter"),
        (status = 403, description = "Not a student account")
    ),
    tag = "Student",
    security(("bearer_auth" = []))
)]
pub async fn attendance_history(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AttendanceError> {
    let student_id = session.require_student()?;
    let history = service.history(student_id, &query).await?;

    Ok(HttpResponse::Ok().json(history))
}

/// My dashboard
#[utoipa::path(
    get,
    path = "/me/dashboard",
    responses(
        (status = 200, description = "Profile, statistics and recent records", body = crate::model::report::StudentDashboard),
        (status = 403, description = "Not a student account"),
        (status = 404, description = "Student profile missing")
    ),
    tag = "Student",
    security(("bearer_auth" = []))
)]
pub async fn dashboard(
    session: SessionContext,
    service: web::Data<ReportService>,
) -> Result<HttpResponse, AttendanceError> {
    let student_id = session.require_student()?;
    let now = Local::now().naive_local();

    Ok(HttpResponse::Ok().json(service.student_dashboard(student_id, now).await?))
}

/// Change my password
#[utoipa::path(
    put,
    path = "/me/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({
            "message": "Password changed successfully"
        })),
        (status = 400, description = "Wrong current password or weak new password")
    ),
    tag = "Student",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    session: SessionContext,
    service: web::Data<AccountService>,
    payload: web::Json<ChangePasswordReq>,
) -> Result<HttpResponse, AttendanceError> {
    service.change_password(&session, &payload).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed successfully" })))
}
