//! In-memory store used by the unit tests. It mirrors the MySQL schema's
//! unique keys, foreign keys and cascades so services behave the same on both.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};

use super::{
    AttendanceStore, CoursePatch, CourseStore, StoreError, StoreResult, StudentPatch,
    StudentStore, UserStore,
};
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

#[derive(Default)]
struct Tables {
    next_id: u64,
    courses: Vec<Course>,
    students: Vec<Student>,
    users: Vec<User>,
    attendance: Vec<AttendanceRecord>,
    refresh_tokens: Vec<(String, RefreshToken)>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn with_course(&self, student: &Student) -> Student {
        let course = student
            .course_id
            .and_then(|id| self.courses.iter().find(|c| c.id == id));

        Student {
            course_code: course.map(|c| c.course_code.clone()),
            course_name: course.map(|c| c.course_name.clone()),
            ..student.clone()
        }
    }

    fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.student_id == student_id)
    }

    fn check_attendance_keys(&self, entry: &NewAttendance, skip_id: Option<u64>) -> StoreResult<()> {
        if self.student(&entry.student_id).is_none() {
            return Err(StoreError::Conflict(format!(
                "unknown student {}",
                entry.student_id
            )));
        }

        let duplicate = self.attendance.iter().any(|a| {
            Some(a.id) != skip_id && a.student_id == entry.student_id && a.date == entry.date
        });
        if duplicate {
            return Err(StoreError::Conflict("duplicate (student_id, date)".into()));
        }

        Ok(())
    }

    fn check_student_keys(
        &self,
        student_id: &str,
        email: &str,
        course_id: Option<u64>,
        skip_id: Option<u64>,
    ) -> StoreResult<()> {
        let others = self.students.iter().filter(|s| Some(s.id) != skip_id);
        for other in others {
            if other.student_id == student_id {
                return Err(StoreError::Conflict("duplicate student_id".into()));
            }
            if other.email == email {
                return Err(StoreError::Conflict("duplicate email".into()));
            }
        }

        if let Some(course_id) = course_id {
            if !self.courses.iter().any(|c| c.id == course_id) {
                return Err(StoreError::Conflict(format!("unknown course {course_id}")));
            }
        }

        Ok(())
    }

    fn insert_student(&mut self, student: &NewStudent) -> StoreResult<u64> {
        self.check_student_keys(
            &student.student_id,
            &student.email,
            Some(student.course_id),
            None,
        )?;

        let id = self.next_id();
        self.students.push(Student {
            id,
            student_id: student.student_id.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            email: student.email.clone(),
            phone: student.phone.clone(),
            address: student.address.clone(),
            course_id: Some(student.course_id),
            year_level: student.year_level,
            course_code: None,
            course_name: None,
            created_at: now(),
        });

        Ok(id)
    }

    fn insert_user(&mut self, user: &NewUser) -> StoreResult<u64> {
        if self.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("duplicate username".into()));
        }
        if let Some(student_id) = &user.student_id {
            if self.student(student_id).is_none() {
                return Err(StoreError::Conflict(format!("unknown student {student_id}")));
            }
        }

        let id = self.next_id();
        self.users.push(User {
            id,
            username: user.username.clone(),
            password: user.password.clone(),
            role: user.role,
            student_id: user.student_id.clone(),
        });

        Ok(id)
    }

    fn joined(&self, record: &AttendanceRecord) -> AttendanceWithStudent {
        let student = self.student(&record.student_id);

        AttendanceWithStudent {
            record: record.clone(),
            first_name: student.map(|s| s.first_name.clone()),
            last_name: student.map(|s| s.last_name.clone()),
        }
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn sort_students(students: &mut [Student]) {
    students.sort_by(|a, b| {
        (a.year_level, &a.last_name, &a.first_name).cmp(&(b.year_level, &b.last_name, &b.first_name))
    });
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn upsert(&self, entry: &NewAttendance) -> StoreResult<UpsertOutcome> {
        let mut tables = self.tables();

        if let Some(existing) = tables
            .attendance
            .iter_mut()
            .find(|a| a.student_id == entry.student_id && a.date == entry.date)
        {
            existing.status = entry.status;
            existing.remarks = entry.remarks.clone();
            existing.updated_at = now();
            return Ok(UpsertOutcome::Updated);
        }

        tables.check_attendance_keys(entry, None)?;
        let id = tables.next_id();
        let stamp = now();
        tables.attendance.push(AttendanceRecord {
            id,
            student_id: entry.student_id.clone(),
            date: entry.date,
            status: entry.status,
            remarks: entry.remarks.clone(),
            created_at: stamp,
            updated_at: stamp,
        });

        Ok(UpsertOutcome::Created)
    }

    async fn insert(&self, entry: &NewAttendance) -> StoreResult<u64> {
        let mut tables = self.tables();
        tables.check_attendance_keys(entry, None)?;

        let id = tables.next_id();
        let stamp = now();
        tables.attendance.push(AttendanceRecord {
            id,
            student_id: entry.student_id.clone(),
            date: entry.date,
            status: entry.status,
            remarks: entry.remarks.clone(),
            created_at: stamp,
            updated_at: stamp,
        });

        Ok(id)
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self.tables().attendance.iter().find(|a| a.id == id).cloned())
    }

    async fn find_for_date(
        &self,
        student_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        Ok(self
            .tables()
            .attendance
            .iter()
            .find(|a| a.student_id == student_id && a.date == date)
            .cloned())
    }

    async fn list_by_student(&self, student_id: &str) -> StoreResult<Vec<AttendanceRecord>> {
        let mut records: Vec<_> = self
            .tables()
            .attendance
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(records)
    }

    async fn list_by_date(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceWithStudent>> {
        let tables = self.tables();
        let mut rows: Vec<_> = tables
            .attendance
            .iter()
            .filter(|a| a.date == date)
            .map(|a| tables.joined(a))
            .collect();
        rows.sort_by(|a, b| a.last_name.cmp(&b.last_name));

        Ok(rows)
    }

    async fn list_with_students(&self) -> StoreResult<Vec<AttendanceWithStudent>> {
        let tables = self.tables();
        let mut rows: Vec<_> = tables.attendance.iter().map(|a| tables.joined(a)).collect();
        rows.sort_by(|a, b| {
            b.record
                .date
                .cmp(&a.record.date)
                .then_with(|| a.last_name.cmp(&b.last_name))
        });

        Ok(rows)
    }

    async fn report_rows(&self, filter: &ReportFilter) -> StoreResult<Vec<ReportRow>> {
        let tables = self.tables();
        let mut rows: Vec<ReportRow> = tables
            .attendance
            .iter()
            .filter_map(|a| {
                let student = tables.with_course(tables.student(&a.student_id)?);
                Some(ReportRow {
                    record: a.clone(),
                    first_name: Some(student.first_name),
                    last_name: Some(student.last_name),
                    year_level: Some(student.year_level),
                    course_id: student.course_id,
                    course_code: student.course_code,
                    course_name: student.course_name,
                })
            })
            .filter(|row| filter.matches(row))
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .date
                .cmp(&a.record.date)
                .then_with(|| a.year_level.cmp(&b.year_level))
                .then_with(|| a.last_name.cmp(&b.last_name))
        });

        Ok(rows)
    }

    async fn update(&self, id: u64, entry: &NewAttendance) -> StoreResult<bool> {
        let mut tables = self.tables();
        if !tables.attendance.iter().any(|a| a.id == id) {
            return Ok(false);
        }
        tables.check_attendance_keys(entry, Some(id))?;

        if let Some(record) = tables.attendance.iter_mut().find(|a| a.id == id) {
            record.student_id = entry.student_id.clone();
            record.date = entry.date;
            record.status = entry.status;
            record.remarks = entry.remarks.clone();
            record.updated_at = now();
        }

        Ok(true)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let mut tables = self.tables();
        let before = tables.attendance.len();
        tables.attendance.retain(|a| a.id != id);

        Ok(tables.attendance.len() < before)
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.tables().attendance.len() as i64)
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn create(&self, course: &NewCourse) -> StoreResult<u64> {
        let mut tables = self.tables();
        if tables
            .courses
            .iter()
            .any(|c| c.course_code == course.course_code)
        {
            return Err(StoreError::Conflict("duplicate course_code".into()));
        }

        let id = tables.next_id();
        tables.courses.push(Course {
            id,
            course_code: course.course_code.clone(),
            course_name: course.course_name.clone(),
            description: course.description.clone(),
            created_at: now(),
        });

        Ok(id)
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<Course>> {
        Ok(self.tables().courses.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_code(&self, course_code: &str) -> StoreResult<Option<Course>> {
        Ok(self
            .tables()
            .courses
            .iter()
            .find(|c| c.course_code == course_code)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<Course>> {
        let mut courses = self.tables().courses.clone();
        courses.sort_by(|a, b| a.course_name.cmp(&b.course_name));

        Ok(courses)
    }

    async fn update(&self, id: u64, patch: &CoursePatch) -> StoreResult<bool> {
        let mut tables = self.tables();
        if let Some(code) = &patch.course_code {
            if tables
                .courses
                .iter()
                .any(|c| c.id != id && &c.course_code == code)
            {
                return Err(StoreError::Conflict("duplicate course_code".into()));
            }
        }

        let Some(course) = tables.courses.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        if let Some(code) = &patch.course_code {
            course.course_code = code.clone();
        }
        if let Some(name) = &patch.course_name {
            course.course_name = name.clone();
        }
        if let Some(description) = &patch.description {
            course.description = description.clone();
        }

        Ok(true)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let mut tables = self.tables();
        let before = tables.courses.len();
        tables.courses.retain(|c| c.id != id);

        // ON DELETE SET NULL
        for student in tables.students.iter_mut().filter(|s| s.course_id == Some(id)) {
            student.course_id = None;
        }

        Ok(tables.courses.len() < before)
    }

    async fn stats(&self, id: u64) -> StoreResult<CourseStats> {
        let tables = self.tables();
        let enrolled: Vec<&Student> = tables
            .students
            .iter()
            .filter(|s| s.course_id == Some(id))
            .collect();

        let mut levels: Vec<u8> = enrolled.iter().map(|s| s.year_level).collect();
        levels.sort_unstable();
        levels.dedup();

        let records = tables
            .attendance
            .iter()
            .filter(|a| enrolled.iter().any(|s| s.student_id == a.student_id))
            .count();

        Ok(CourseStats {
            total_students: enrolled.len() as i64,
            year_levels: levels.len() as i64,
            total_attendance_records: records as i64,
        })
    }

    async fn year_levels(&self, id: u64) -> StoreResult<Vec<u8>> {
        let mut levels: Vec<u8> = self
            .tables()
            .students
            .iter()
            .filter(|s| s.course_id == Some(id))
            .map(|s| s.year_level)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        Ok(levels)
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.tables().courses.len() as i64)
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn create(&self, student: &NewStudent) -> StoreResult<u64> {
        self.tables().insert_student(student)
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<Student>> {
        let tables = self.tables();
        Ok(tables
            .students
            .iter()
            .find(|s| s.id == id)
            .map(|s| tables.with_course(s)))
    }

    async fn find_by_student_id(&self, student_id: &str) -> StoreResult<Option<Student>> {
        let tables = self.tables();
        Ok(tables.student(student_id).map(|s| tables.with_course(s)))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Student>> {
        let tables = self.tables();
        Ok(tables
            .students
            .iter()
            .find(|s| s.email == email)
            .map(|s| tables.with_course(s)))
    }

    async fn list(&self) -> StoreResult<Vec<Student>> {
        let tables = self.tables();
        let mut students: Vec<_> = tables.students.iter().map(|s| tables.with_course(s)).collect();
        sort_students(&mut students);

        Ok(students)
    }

    async fn search_by_name(&self, name: &str) -> StoreResult<Vec<Student>> {
        let needle = name.to_lowercase();
        let tables = self.tables();
        let mut students: Vec<_> = tables
            .students
            .iter()
            .filter(|s| {
                s.first_name.to_lowercase().contains(&needle)
                    || s.last_name.to_lowercase().contains(&needle)
            })
            .map(|s| tables.with_course(s))
            .collect();
        sort_students(&mut students);

        Ok(students)
    }

    async fn list_by_course(
        &self,
        course_id: u64,
        year_level: Option<u8>,
    ) -> StoreResult<Vec<Student>> {
        let tables = self.tables();
        let mut students: Vec<_> = tables
            .students
            .iter()
            .filter(|s| s.course_id == Some(course_id))
            .filter(|s| year_level.is_none_or(|y| s.year_level == y))
            .map(|s| tables.with_course(s))
            .collect();
        sort_students(&mut students);

        Ok(students)
    }

    async fn list_without_accounts(&self) -> StoreResult<Vec<Student>> {
        let tables = self.tables();
        let mut students: Vec<_> = tables
            .students
            .iter()
            .filter(|s| {
                !tables
                    .users
                    .iter()
                    .any(|u| u.student_id.as_deref() == Some(s.student_id.as_str()))
            })
            .map(|s| tables.with_course(s))
            .collect();
        students.sort_by(|a, b| a.last_name.cmp(&b.last_name));

        Ok(students)
    }

    async fn last_student_id(&self, prefix: &str) -> StoreResult<Option<String>> {
        Ok(self
            .tables()
            .students
            .iter()
            .filter_map(|s| {
                let seq = s.student_id.strip_prefix(prefix)?.parse::<u64>().ok();
                Some((seq, s.student_id.clone()))
            })
            .max()
            .map(|(_, id)| id))
    }

    async fn update(&self, id: u64, patch: &StudentPatch) -> StoreResult<bool> {
        let mut tables = self.tables();
        let Some(current) = tables.students.iter().find(|s| s.id == id).cloned() else {
            return Ok(false);
        };

        let student_id = patch.student_id.clone().unwrap_or(current.student_id.clone());
        let email = patch.email.clone().unwrap_or(current.email.clone());
        let course_id = patch.course_id.or(current.course_id);
        tables.check_student_keys(&student_id, &email, patch.course_id, Some(id))?;

        // ON UPDATE CASCADE
        if student_id != current.student_id {
            for record in tables
                .attendance
                .iter_mut()
                .filter(|a| a.student_id == current.student_id)
            {
                record.student_id = student_id.clone();
            }
            for user in tables
                .users
                .iter_mut()
                .filter(|u| u.student_id.as_deref() == Some(current.student_id.as_str()))
            {
                user.student_id = Some(student_id.clone());
            }
        }

        if let Some(student) = tables.students.iter_mut().find(|s| s.id == id) {
            student.student_id = student_id;
            student.email = email;
            student.course_id = course_id;
            if let Some(first_name) = &patch.first_name {
                student.first_name = first_name.clone();
            }
            if let Some(last_name) = &patch.last_name {
                student.last_name = last_name.clone();
            }
            if let Some(phone) = &patch.phone {
                student.phone = phone.clone();
            }
            if let Some(address) = &patch.address {
                student.address = address.clone();
            }
            if let Some(year_level) = patch.year_level {
                student.year_level = year_level;
            }
        }

        Ok(true)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let mut tables = self.tables();
        let Some(position) = tables.students.iter().position(|s| s.id == id) else {
            return Ok(false);
        };

        // ON DELETE CASCADE
        let removed = tables.students.remove(position);
        tables.attendance.retain(|a| a.student_id != removed.student_id);
        tables
            .users
            .retain(|u| u.student_id.as_deref() != Some(removed.student_id.as_str()));

        Ok(true)
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.tables().students.len() as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_for_login(&self, login: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables()
            .users
            .iter()
            .find(|u| u.username == login || u.student_id.as_deref() == Some(login))
            .cloned())
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<User>> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        Ok(self.tables().users.iter().any(|u| u.username == username))
    }

    async fn create(&self, user: &NewUser) -> StoreResult<u64> {
        self.tables().insert_user(user)
    }

    async fn create_with_student(
        &self,
        student: &NewStudent,
        user: &NewUser,
    ) -> StoreResult<u64> {
        let mut tables = self.tables();
        let student_row = tables.insert_student(student)?;

        let user = NewUser {
            student_id: Some(student.student_id.clone()),
            ..user.clone()
        };
        match tables.insert_user(&user) {
            Ok(id) => Ok(id),
            Err(e) => {
                // rollback
                tables.students.retain(|s| s.id != student_row);
                Err(e)
            }
        }
    }

    async fn update_password(&self, user_id: u64, password_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables();
        let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(false);
        };
        user.password = password_hash.to_string();

        Ok(true)
    }

    async fn count_by_role(&self, role: Role) -> StoreResult<i64> {
        Ok(self.tables().users.iter().filter(|u| u.role == role).count() as i64)
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        _expires_at: i64,
    ) -> StoreResult<()> {
        let mut tables = self.tables();
        tables.refresh_tokens.push((
            jti.to_string(),
            RefreshToken {
                user_id,
                revoked: false,
            },
        ));

        Ok(())
    }

    async fn find_refresh_token(&self, jti: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self
            .tables()
            .refresh_tokens
            .iter()
            .find(|(key, _)| key == jti)
            .map(|(_, token)| token.clone()))
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let mut tables = self.tables();
        let Some((_, token)) = tables.refresh_tokens.iter_mut().find(|(key, _)| key == jti) else {
            return Ok(false);
        };
        token.revoked = true;

        Ok(true)
    }
}

impl MemoryStore {
    /// Enrolls a student, creating the course on first use. Returns the
    /// student's row id.
    pub fn seed_student(
        &self,
        student_id: &str,
        first_name: &str,
        last_name: &str,
        course_name: &str,
        year_level: u8,
    ) -> u64 {
        let mut tables = self.tables();
        let course_code: String = course_name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .collect::<String>()
            .to_uppercase();

        let course_id = match tables.courses.iter().find(|c| c.course_name == course_name) {
            Some(course) => course.id,
            None => {
                let id = tables.next_id();
                tables.courses.push(Course {
                    id,
                    course_code,
                    course_name: course_name.into(),
                    description: None,
                    created_at: now(),
                });
                id
            }
        };

        tables
            .insert_student(&NewStudent {
                student_id: student_id.into(),
                first_name: first_name.into(),
                last_name: last_name.into(),
                email: format!("{}@school.edu", student_id),
                phone: None,
                address: None,
                course_id,
                year_level,
            })
            .expect("seed student")
    }

    pub fn seed_course_id(&self, course_name: &str) -> u64 {
        self.tables()
            .courses
            .iter()
            .find(|c| c.course_name == course_name)
            .map(|c| c.id)
            .expect("seeded course")
    }
}
