use std::sync::Arc;

use tracing::info;

use crate::{
    error::{AttendanceError, storage_fault},
    model::{
        course::{Course, CourseForm, CourseWithStats, NewCourse},
        student::Student,
    },
    service::clean,
    store::{CoursePatch, CourseStore, StoreError, StudentStore},
};

const DUPLICATE_CODE: &str = "Course code already exists";

fn not_found() -> AttendanceError {
    AttendanceError::NotFound("Course not found".into())
}

/// Codes are compared and stored trimmed and upper-cased.
fn normalize_code(raw: Option<&str>) -> Option<String> {
    clean(raw).map(|code| code.to_uppercase())
}

pub struct CourseService {
    courses: Arc<dyn CourseStore>,
    students: Arc<dyn StudentStore>,
}

impl CourseService {
    pub fn new(courses: Arc<dyn CourseStore>, students: Arc<dyn StudentStore>) -> Self {
        Self { courses, students }
    }

    /// Checks the merged course (form over `current`) and returns it.
    async fn validate(
        &self,
        form: &CourseForm,
        current: Option<&Course>,
    ) -> Result<NewCourse, AttendanceError> {
        let mut errors = Vec::new();

        let code = match &form.course_code {
            Some(raw) => normalize_code(Some(raw)),
            None => current.map(|c| c.course_code.clone()),
        };
        let name = match &form.course_name {
            Some(raw) => clean(Some(raw)),
            None => current.map(|c| c.course_name.clone()),
        };
        let description = match &form.description {
            Some(raw) => clean(Some(raw)),
            None => current.and_then(|c| c.description.clone()),
        };

        match &code {
            None => errors.push("Course code is required".to_string()),
            Some(code) => {
                let existing = self
                    .courses
                    .find_by_code(code)
                    .await
                    .map_err(storage_fault("Failed to check course code"))?;
                if existing.is_some_and(|other| current.is_none_or(|c| c.id != other.id)) {
                    errors.push(DUPLICATE_CODE.to_string());
                }
            }
        }

        if name.is_none() {
            errors.push("Course name is required".to_string());
        }

        match (code, name) {
            (Some(course_code), Some(course_name)) if errors.is_empty() => Ok(NewCourse {
                course_code,
                course_name,
                description,
            }),
            _ => Err(AttendanceError::Validation(errors)),
        }
    }

    fn write_fault(e: StoreError) -> AttendanceError {
        match e {
            StoreError::Conflict(_) => AttendanceError::Conflict(DUPLICATE_CODE.into()),
            other => storage_fault("Failed to save course")(other),
        }
    }

    pub async fn create(&self, form: &CourseForm) -> Result<Course, AttendanceError> {
        let course = self.validate(form, None).await?;

        let id = self
            .courses
            .create(&course)
            .await
            .map_err(Self::write_fault)?;
        info!(id, code = %course.course_code, "Course created");

        self.find(id).await
    }

    async fn find(&self, id: u64) -> Result<Course, AttendanceError> {
        self.courses
            .find_by_id(id)
            .await
            .map_err(storage_fault("Failed to fetch course"))?
            .ok_or_else(not_found)
    }

    async fn with_stats(&self, course: Course) -> Result<CourseWithStats, AttendanceError> {
        let stats = self
            .courses
            .stats(course.id)
            .await
            .map_err(storage_fault("Failed to compute course stats"))?;

        Ok(CourseWithStats { course, stats })
    }

    pub async fn get(&self, id: u64) -> Result<CourseWithStats, AttendanceError> {
        let course = self.find(id).await?;
        self.with_stats(course).await
    }

    /// Every course by name, each with its enrollment and record counts.
    pub async fn list(&self) -> Result<Vec<CourseWithStats>, AttendanceError> {
        let courses = self
            .courses
            .list()
            .await
            .map_err(storage_fault("Failed to list courses"))?;

        let mut listed = Vec::with_capacity(courses.len());
        for course in courses {
            listed.push(self.with_stats(course).await?);
        }

        Ok(listed)
    }

    pub async fn update(&self, id: u64, form: &CourseForm) -> Result<Course, AttendanceError> {
        let current = self.find(id).await?;
        let merged = self.validate(form, Some(&current)).await?;

        let patch = CoursePatch {
            course_code: Some(merged.course_code).filter(|code| *code != current.course_code),
            course_name: Some(merged.course_name).filter(|name| *name != current.course_name),
            description: Some(merged.description).filter(|d| *d != current.description),
        };

        self.courses
            .update(id, &patch)
            .await
            .map_err(Self::write_fault)?;
        info!(id, "Course updated");

        self.find(id).await
    }

    /// Enrolled students keep their rows; their course is cleared.
    pub async fn delete(&self, id: u64) -> Result<(), AttendanceError> {
        let deleted = self
            .courses
            .delete(id)
            .await
            .map_err(storage_fault("Failed to delete course"))?;

        if !deleted {
            return Err(not_found());
        }
        info!(id, "Course deleted");

        Ok(())
    }

    pub async fn year_levels(&self, id: u64) -> Result<Vec<u8>, AttendanceError> {
        self.find(id).await?;

        self.courses
            .year_levels(id)
            .await
            .map_err(storage_fault("Failed to list year levels"))
    }

    /// Ordered by year level, last name, first name.
    pub async fn students(
        &self,
        id: u64,
        year_level: Option<u8>,
    ) -> Result<Vec<Student>, AttendanceError> {
        self.find(id).await?;

        self.students
            .list_by_course(id, year_level)
            .await
            .map_err(storage_fault("Failed to list course students"))
    }
}
