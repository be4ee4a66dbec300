use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::AttendanceSummary;

pub const MIN_YEAR_LEVEL: u8 = 1;
pub const MAX_YEAR_LEVEL: u8 = 5;

/// Student profile joined with its course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "student_id": "2026-007",
        "first_name": "Maria",
        "last_name": "Santos",
        "email": "maria.santos@school.edu",
        "phone": null,
        "address": null,
        "course_id": 1,
        "year_level": 2,
        "course_code": "BSIT",
        "course_name": "Bachelor of Science in Information Technology",
        "created_at": "2026-01-01T09:00:00"
    })
)]
pub struct Student {
    pub id: u64,

    #[schema(example = "2026-007")]
    pub student_id: String,

    pub first_name: String,
    pub last_name: String,

    #[schema(format = "email")]
    pub email: String,

    #[schema(nullable = true)]
    pub phone: Option<String>,

    #[schema(nullable = true)]
    pub address: Option<String>,

    /// Null once the course was deleted
    #[schema(nullable = true)]
    pub course_id: Option<u64>,

    #[schema(example = 2, minimum = 1, maximum = 5)]
    pub year_level: u8,

    #[schema(nullable = true)]
    pub course_code: Option<String>,

    #[schema(nullable = true)]
    pub course_name: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// Student create/update form. On update, missing fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StudentForm {
    #[schema(example = "2026-007")]
    pub student_id: Option<String>,
    #[schema(example = "Maria")]
    pub first_name: Option<String>,
    #[schema(example = "Santos")]
    pub last_name: Option<String>,
    #[schema(example = "maria.santos@school.edu", format = "email")]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = 1)]
    pub course_id: Option<u64>,
    #[schema(example = 2)]
    pub year_level: Option<u8>,
}

/// A validated student as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub course_id: u64,
    pub year_level: u8,
}

/// A student with the summary of their whole attendance history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub attendance: AttendanceSummary,
}
