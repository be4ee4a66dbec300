use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "course_code": "BSIT",
        "course_name": "Bachelor of Science in Information Technology",
        "description": null,
        "created_at": "2026-01-01T09:00:00"
    })
)]
pub struct Course {
    pub id: u64,

    #[schema(example = "BSIT")]
    pub course_code: String,

    #[schema(example = "Bachelor of Science in Information Technology")]
    pub course_name: String,

    #[schema(nullable = true)]
    pub description: Option<String>,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow, ToSchema)]
pub struct CourseStats {
    pub total_students: i64,
    pub year_levels: i64,
    pub total_attendance_records: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseWithStats {
    #[serde(flatten)]
    pub course: Course,
    pub stats: CourseStats,
}

/// Course create/update form. On update, missing fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CourseForm {
    #[schema(example = "bsit")]
    pub course_code: Option<String>,
    #[schema(example = "Bachelor of Science in Information Technology")]
    pub course_name: Option<String>,
    pub description: Option<String>,
}

/// A normalized course as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub course_code: String,
    pub course_name: String,
    pub description: Option<String>,
}
