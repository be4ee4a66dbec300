use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::{
    auth::session::SessionContext,
    error::AttendanceError,
    model::course::CourseForm,
    service::CourseService,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseStudentsQuery {
    /// Restrict to one year level (1-5)
    pub year_level: Option<u8>,
}

#[utoipa::path(
    post,
    path = "/courses",
    request_body = CourseForm,
    responses(
        (status = 201, description = "Course created", body = crate::model::course::Course),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "errors": ["Course code already exists"]
        }))
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn create_course(
    session: SessionContext,
    service: web::Data<CourseService>,
    payload: web::Json<CourseForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Created().json(service.create(&payload).await?))
}

#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "Courses by name with their statistics", body = [crate::model::course::CourseWithStats])
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn list_courses(
    session: SessionContext,
    service: web::Data<CourseService>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.list().await?))
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = u64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course with statistics", body = crate::model::course::CourseWithStats),
        (status = 404, description = "Not found")
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn get_course(
    session: SessionContext,
    service: web::Data<CourseService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.get(path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(("id" = u64, Path, description = "Course id")),
    request_body = CourseForm,
    responses(
        (status = 200, description = "Course updated", body = crate::model::course::Course),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not found")
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn update_course(
    session: SessionContext,
    service: web::Data<CourseService>,
    path: web::Path<u64>,
    payload: web::Json<CourseForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.update(path.into_inner(), &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = u64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course deleted"),
        (status = 404, description = "Not found")
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn delete_course(
    session: SessionContext,
    service: web::Data<CourseService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    service.delete(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Course deleted" })))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/year-levels",
    params(("id" = u64, Path, description = "Course id")),
    responses(
        (status = 200, description = "Year levels with enrolled students, ascending", body = [u8]),
        (status = 404, description = "Not found")
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn course_year_levels(
    session: SessionContext,
    service: web::Data<CourseService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.year_levels(path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/courses/{id}/students",
    params(("id" = u64, Path, description = "Course id"), CourseStudentsQuery),
    responses(
        (status = 200, description = "Enrolled students by year level and name", body = [crate::model::student::Student]),
        (status = 404, description = "Not found")
    ),
    tag = "Course",
    security(("bearer_auth" = []))
)]
pub async fn course_students(
    session: SessionContext,
    service: web::Data<CourseService>,
    path: web::Path<u64>,
    query: web::Query<CourseStudentsQuery>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let students = service.students(path.into_inner(), query.year_level).await?;

    Ok(HttpResponse::Ok().json(students))
}
