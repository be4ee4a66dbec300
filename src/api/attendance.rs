use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::{
    auth::session::SessionContext,
    error::AttendanceError,
    model::attendance::AttendanceForm,
    service::AttendanceService,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Only records of this day (YYYY-MM-DD)
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Records with student names, newest first", body = [crate::model::attendance::AttendanceWithStudent]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn list_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let records = match query.date {
        Some(date) => service.list_by_date(date).await?,
        None => service.list_all().await?,
    };

    Ok(HttpResponse::Ok().json(records))
}

/// Record attendance for a student
#[utoipa::path(
    post,
    path = "/attendance",
    request_body = AttendanceForm,
    responses(
        (status = 201, description = "Record created", body = crate::model::attendance::AttendanceRecord),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "errors": ["Cannot log attendance for future dates"]
        })),
        (status = 409, description = "Student already has a record for that date")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn create_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    payload: web::Json<AttendanceForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let today = Local::now().date_naive();
    let record = service.create(&payload, today).await?;

    Ok(HttpResponse::Created().json(record))
}

/// Mark attendance for a student and date
///
/// Creates the record, or replaces the status and remarks of the existing one.
#[utoipa::path(
    put,
    path = "/attendance",
    request_body = AttendanceForm,
    responses(
        (status = 200, description = "Record saved", body = Object, example = json!({
            "outcome": "updated"
        })),
        (status = 400, description = "Validation failed")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn mark_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    payload: web::Json<AttendanceForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let today = Local::now().date_naive();
    let outcome = service.upsert_for_date(&payload, today).await?;

    Ok(HttpResponse::Ok().json(json!({ "outcome": outcome })))
}

#[utoipa::path(
    get,
    path = "/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "Attendance record", body = crate::model::attendance::AttendanceRecord),
        (status = 404, description = "Not found")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn get_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.get(path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record id")),
    request_body = AttendanceForm,
    responses(
        (status = 200, description = "Record updated", body = crate::model::attendance::AttendanceRecord),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Another record exists for that student and date")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn update_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
    payload: web::Json<AttendanceForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let today = Local::now().date_naive();
    let record = service.update(path.into_inner(), &payload, today).await?;

    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    delete,
    path = "/attendance/{id}",
    params(("id" = u64, Path, description = "Attendance record id")),
    responses(
        (status = 200, description = "Record deleted", body = Object, example = json!({
            "message": "Attendance record deleted"
        })),
        (status = 404, description = "Not found")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
pub async fn delete_attendance(
    session: SessionContext,
    service: web::Data<AttendanceService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    service.delete(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance record deleted" })))
}
