//! Persistence contracts.
//!
//! Services only see these traits; `MySqlStore` backs them in production and
//! `MemoryStore` in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    attendance::{
        AttendanceRecord, AttendanceWithStudent, NewAttendance, ReportFilter, ReportRow,
        UpsertOutcome,
    },
    course::{Course, CourseStats, NewCourse},
    role::Role,
    student::{NewStudent, Student},
    user::{NewUser, RefreshToken, User},
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// MySQL SQLSTATE for integrity constraint violations.
const INTEGRITY_VIOLATION: &str = "23000";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique or foreign key constraint rejected the write.
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some(INTEGRITY_VIOLATION) {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }

        StoreError::Database(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Partial course update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoursePatch {
    pub course_code: Option<String>,
    pub course_name: Option<String>,
    pub description: Option<Option<String>>,
}

/// Partial student update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentPatch {
    pub student_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub course_id: Option<u64>,
    pub year_level: Option<u8>,
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Inserts or replaces the record keyed by (student_id, date) atomically.
    async fn upsert(&self, entry: &NewAttendance) -> StoreResult<UpsertOutcome>;

    /// Plain insert; a second record for the same key is a `Conflict`.
    async fn insert(&self, entry: &NewAttendance) -> StoreResult<u64>;

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<AttendanceRecord>>;

    async fn find_for_date(
        &self,
        student_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>>;

    /// Newest first.
    async fn list_by_student(&self, student_id: &str) -> StoreResult<Vec<AttendanceRecord>>;

    async fn list_by_date(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceWithStudent>>;

    /// Newest first, then by last name.
    async fn list_with_students(&self) -> StoreResult<Vec<AttendanceWithStudent>>;

    async fn report_rows(&self, filter: &ReportFilter) -> StoreResult<Vec<ReportRow>>;

    async fn update(&self, id: u64, entry: &NewAttendance) -> StoreResult<bool>;

    async fn delete(&self, id: u64) -> StoreResult<bool>;

    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn create(&self, course: &NewCourse) -> StoreResult<u64>;

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<Course>>;

    async fn find_by_code(&self, course_code: &str) -> StoreResult<Option<Course>>;

    async fn list(&self) -> StoreResult<Vec<Course>>;

    async fn update(&self, id: u64, patch: &CoursePatch) -> StoreResult<bool>;

    async fn delete(&self, id: u64) -> StoreResult<bool>;

    async fn stats(&self, id: u64) -> StoreResult<CourseStats>;

    /// Distinct year levels of the enrolled students, ascending.
    async fn year_levels(&self, id: u64) -> StoreResult<Vec<u8>>;

    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn create(&self, student: &NewStudent) -> StoreResult<u64>;

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<Student>>;

    async fn find_by_student_id(&self, student_id: &str) -> StoreResult<Option<Student>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Student>>;

    /// Ordered by year level, last name, first name.
    async fn list(&self) -> StoreResult<Vec<Student>>;

    async fn search_by_name(&self, name: &str) -> StoreResult<Vec<Student>>;

    /// Ordered by year level, last name, first name.
    async fn list_by_course(
        &self,
        course_id: u64,
        year_level: Option<u8>,
    ) -> StoreResult<Vec<Student>>;

    async fn list_without_accounts(&self) -> StoreResult<Vec<Student>>;

    /// Student ID starting with `prefix` with the highest numeric sequence.
    async fn last_student_id(&self, prefix: &str) -> StoreResult<Option<String>>;

    async fn update(&self, id: u64, patch: &StudentPatch) -> StoreResult<bool>;

    async fn delete(&self, id: u64) -> StoreResult<bool>;

    async fn count(&self) -> StoreResult<i64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Matches either the username or the linked student ID.
    async fn find_for_login(&self, login: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<User>>;

    async fn username_exists(&self, username: &str) -> StoreResult<bool>;

    async fn create(&self, user: &NewUser) -> StoreResult<u64>;

    /// Creates the student row and its account in one transaction.
    async fn create_with_student(&self, student: &NewStudent, user: &NewUser)
    -> StoreResult<u64>;

    async fn update_password(&self, user_id: u64, password_hash: &str) -> StoreResult<bool>;

    async fn count_by_role(&self, role: Role) -> StoreResult<i64>;

    async fn store_refresh_token(&self, user_id: u64, jti: &str, expires_at: i64)
    -> StoreResult<()>;

    async fn find_refresh_token(&self, jti: &str) -> StoreResult<Option<RefreshToken>>;

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool>;
}
