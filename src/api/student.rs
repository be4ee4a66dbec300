use actix_web::{HttpResponse, web};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::{
    auth::session::SessionContext,
    error::AttendanceError,
    model::student::StudentForm,
    models::CreateAccountReq,
    service::{AccountService, StudentService},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentQuery {
    /// Matches first or last name
    pub search: Option<String>,
}

#[utoipa::path(
    post,
    path = "/students",
    request_body = StudentForm,
    responses(
        (status = 201, description = "Student created", body = crate::model::student::Student),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "errors": ["Student ID already exists", "Valid email address is required"]
        }))
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn create_student(
    session: SessionContext,
    service: web::Data<StudentService>,
    payload: web::Json<StudentForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Created().json(service.create(&payload).await?))
}

#[utoipa::path(
    get,
    path = "/students",
    params(StudentQuery),
    responses(
        (status = 200, description = "Students by year level and name", body = [crate::model::student::Student])
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn list_students(
    session: SessionContext,
    service: web::Data<StudentService>,
    query: web::Query<StudentQuery>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.list(query.search.as_deref()).await?))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    params(("id" = u64, Path, description = "Student row id")),
    responses(
        (status = 200, description = "Student with attendance summary", body = crate::model::student::StudentDetail),
        (status = 404, description = "Not found")
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn get_student(
    session: SessionContext,
    service: web::Data<StudentService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.get(path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/students/{id}",
    params(("id" = u64, Path, description = "Student row id")),
    request_body = StudentForm,
    responses(
        (status = 200, description = "Student updated", body = crate::model::student::Student),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not found")
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn update_student(
    session: SessionContext,
    service: web::Data<StudentService>,
    path: web::Path<u64>,
    payload: web::Json<StudentForm>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.update(path.into_inner(), &payload).await?))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    params(("id" = u64, Path, description = "Student row id")),
    responses(
        (status = 200, description = "Student, attendance and account deleted"),
        (status = 404, description = "Not found")
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn delete_student(
    session: SessionContext,
    service: web::Data<StudentService>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    service.delete(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Student deleted" })))
}

#[utoipa::path(
    get,
    path = "/students/next-id",
    responses(
        (status = 200, description = "Next free student ID", body = Object, example = json!({
            "student_id": "2026-014"
        }))
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn next_student_id(
    session: SessionContext,
    service: web::Data<StudentService>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let today = Local::now().date_naive();
    let student_id = service.next_student_id(today).await?;

    Ok(HttpResponse::Ok().json(json!({ "student_id": student_id })))
}

#[utoipa::path(
    get,
    path = "/students/without-accounts",
    responses(
        (status = 200, description = "Students that cannot log in yet", body = [crate::model::student::Student])
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn students_without_accounts(
    session: SessionContext,
    service: web::Data<StudentService>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    Ok(HttpResponse::Ok().json(service.without_accounts().await?))
}

#[utoipa::path(
    post,
    path = "/students/{student_id}/account",
    params(("student_id" = String, Path, description = "School-issued student ID")),
    request_body = CreateAccountReq,
    responses(
        (status = 201, description = "Account created", body = Object, example = json!({
            "id": 12
        })),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Student already has an account")
    ),
    tag = "Student Management",
    security(("bearer_auth" = []))
)]
pub async fn create_student_account(
    session: SessionContext,
    service: web::Data<AccountService>,
    path: web::Path<String>,
    payload: web::Json<CreateAccountReq>,
) -> Result<HttpResponse, AttendanceError> {
    session.require_admin()?;

    let id = service.create_student_account(&path, &payload).await?;

    Ok(HttpResponse::Created().json(json!({ "id": id })))
}
