use serde::Serialize;
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub student_id: Option<String>,
}

/// Account data as written to the store; `password` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub user_id: u64,
    pub revoked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SystemStats {
    pub total_students: i64,
    pub total_courses: i64,
    pub total_attendance_records: i64,
    pub total_student_users: i64,
    pub total_admin_users: i64,
}
