use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::{
    engine,
    error::{AttendanceError, storage_fault},
    model::student::{
        MAX_YEAR_LEVEL, MIN_YEAR_LEVEL, NewStudent, Student, StudentDetail, StudentForm,
    },
    service::clean,
    store::{AttendanceStore, CourseStore, StoreError, StudentPatch, StudentStore},
};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn not_found() -> AttendanceError {
    AttendanceError::NotFound("Student not found".into())
}

/// Value from the form, falling back to the current row on updates.
fn merged(field: &Option<String>, current: Option<&str>) -> Option<String> {
    match field {
        Some(raw) => clean(Some(raw)),
        None => current.map(String::from),
    }
}

/// Checks a student profile (form over `current` when updating). Unique
/// checks are skipped for values that did not change.
pub(crate) async fn validate_profile(
    students: &dyn StudentStore,
    courses: &dyn CourseStore,
    form: &StudentForm,
    current: Option<&Student>,
) -> Result<NewStudent, AttendanceError> {
    let fault = storage_fault("Failed to validate student");
    let mut errors = Vec::new();

    let student_id = merged(&form.student_id, current.map(|s| s.student_id.as_str()));
    match &student_id {
        None => errors.push("Student ID is required".to_string()),
        Some(id) if current.is_none_or(|c| &c.student_id != id) => {
            if students.find_by_student_id(id).await.map_err(&fault)?.is_some() {
                errors.push("Student ID already exists".to_string());
            }
        }
        Some(_) => {}
    }

    let first_name = merged(&form.first_name, current.map(|s| s.first_name.as_str()));
    if first_name.is_none() {
        errors.push("First name is required".to_string());
    }

    let last_name = merged(&form.last_name, current.map(|s| s.last_name.as_str()));
    if last_name.is_none() {
        errors.push("Last name is required".to_string());
    }

    let email = merged(&form.email, current.map(|s| s.email.as_str()));
    match &email {
        Some(email) if is_valid_email(email) => {
            if current.is_none_or(|c| &c.email != email)
                && students.find_by_email(email).await.map_err(&fault)?.is_some()
            {
                errors.push("Email address already exists".to_string());
            }
        }
        _ => errors.push("Valid email address is required".to_string()),
    }

    let course_id = form.course_id.or(current.and_then(|s| s.course_id));
    match course_id {
        None => errors.push("Course selection is required".to_string()),
        Some(id) => {
            if courses.find_by_id(id).await.map_err(&fault)?.is_none() {
                errors.push("Selected course does not exist".to_string());
            }
        }
    }

    let year_level = form
        .year_level
        .or(current.map(|s| s.year_level))
        .filter(|y| (MIN_YEAR_LEVEL..=MAX_YEAR_LEVEL).contains(y));
    if year_level.is_none() {
        errors.push(format!(
            "Valid year level ({MIN_YEAR_LEVEL}-{MAX_YEAR_LEVEL}) is required"
        ));
    }

    if !errors.is_empty() {
        return Err(AttendanceError::Validation(errors));
    }

    match (student_id, first_name, last_name, email, course_id, year_level) {
        (
            Some(student_id),
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(course_id),
            Some(year_level),
        ) => Ok(NewStudent {
            student_id,
            first_name,
            last_name,
            email,
            phone: merged(&form.phone, current.and_then(|s| s.phone.as_deref())),
            address: merged(&form.address, current.and_then(|s| s.address.as_deref())),
            course_id,
            year_level,
        }),
        _ => Err(AttendanceError::Validation(errors)),
    }
}

/// Only the columns that differ from `current`.
fn diff(current: &Student, next: NewStudent) -> StudentPatch {
    fn changed<T: PartialEq>(old: &T, new: T) -> Option<T> {
        (*old != new).then_some(new)
    }

    StudentPatch {
        student_id: changed(&current.student_id, next.student_id),
        first_name: changed(&current.first_name, next.first_name),
        last_name: changed(&current.last_name, next.last_name),
        email: changed(&current.email, next.email),
        phone: changed(&current.phone, next.phone),
        address: changed(&current.address, next.address),
        course_id: changed(&current.course_id, Some(next.course_id)).flatten(),
        year_level: changed(&current.year_level, next.year_level),
    }
}

fn write_fault(e: StoreError) -> AttendanceError {
    match e {
        StoreError::Conflict(_) => {
            AttendanceError::Conflict("Student ID or email address already exists".into())
        }
        other => storage_fault("Failed to save student")(other),
    }
}

pub struct StudentService {
    students: Arc<dyn StudentStore>,
    courses: Arc<dyn CourseStore>,
    attendance: Arc<dyn AttendanceStore>,
}

impl StudentService {
    pub fn new(
        students: Arc<dyn StudentStore>,
        courses: Arc<dyn CourseStore>,
        attendance: Arc<dyn AttendanceStore>,
    ) -> Self {
        Self {
            students,
            courses,
            attendance,
        }
    }

    pub async fn create(&self, form: &StudentForm) -> Result<Student, AttendanceError> {
        let student =
            validate_profile(self.students.as_ref(), self.courses.as_ref(), form, None).await?;

        let id = self
            .students
            .create(&student)
            .await
            .map_err(write_fault)?;
        info!(id, student_id = %student.student_id, "Student created");

        self.find(id).await
    }

    async fn find(&self, id: u64) -> Result<Student, AttendanceError> {
        self.students
            .find_by_id(id)
            .await
            .map_err(storage_fault("Failed to fetch student"))?
            .ok_or_else(not_found)
    }

    /// All students, or those whose first or last name contains `search`.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Student>, AttendanceError> {
        let result = match clean(search) {
            Some(name) => self.students.search_by_name(&name).await,
            None => self.students.list().await,
        };

        result.map_err(storage_fault("Failed to list students"))
    }

    pub async fn get(&self, id: u64) -> Result<StudentDetail, AttendanceError> {
        let student = self.find(id).await?;
        let records = self
            .attendance
            .list_by_student(&student.student_id)
            .await
            .map_err(storage_fault("Failed to fetch student attendance"))?;

        Ok(StudentDetail {
            attendance: engine::summarize(&records),
            student,
        })
    }

    pub async fn update(&self, id: u64, form: &StudentForm) -> Result<Student, AttendanceError> {
        let current = self.find(id).await?;
        let next = validate_profile(
            self.students.as_ref(),
            self.courses.as_ref(),
            form,
            Some(&current),
        )
        .await?;

        self.students
            .update(id, &diff(&current, next))
            .await
            .map_err(write_fault)?;
        info!(id, "Student updated");

        self.find(id).await
    }

    /// Also removes the student's attendance and account.
    pub async fn delete(&self, id: u64) -> Result<(), AttendanceError> {
        let deleted = self
            .students
            .delete(id)
            .await
            .map_err(storage_fault("Failed to delete student"))?;

        if !deleted {
            return Err(not_found());
        }
        info!(id, "Student deleted");

        Ok(())
    }

    /// Next free ID of the form `YYYY-NNN`; the sequence restarts at 001
    /// every year.
    pub async fn next_student_id(&self, today: NaiveDate) -> Result<String, AttendanceError> {
        let prefix = format!("{}-", today.year());
        let last = self
            .students
            .last_student_id(&prefix)
            .await
            .map_err(storage_fault("Failed to generate student ID"))?;

        let next = last
            .as_deref()
            .and_then(|id| id.strip_prefix(&prefix))
            .and_then(|seq| seq.parse::<u32>().ok())
            .map_or(1, |seq| seq + 1);

        Ok(format!("{prefix}{next:03}"))
    }

    pub async fn without_accounts(&self) -> Result<Vec<Student>, AttendanceError> {
        self.students
            .list_without_accounts()
            .await
            .map_err(storage_fault("Failed to list students without accounts"))
    }
}
