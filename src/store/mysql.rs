use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;
use tracing::debug;

use super::{
    AttendanceStore, CoursePatch, CourseStore, StoreResult, StudentPatch, StudentStore, UserStore,
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
use crate::utils::db_utils::{UpdateBuilder, execute_update};

const ATTENDANCE_COLUMNS: &str =
    "a.id, a.student_id, a.date, a.status, a.remarks, a.created_at, a.updated_at";

const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.student_id, s.first_name, s.last_name, s.email, s.phone, s.address,
           s.course_id, s.year_level, s.created_at, c.course_code, c.course_name
    FROM students s
    LEFT JOIN courses c ON s.course_id = c.id
"#;

const STUDENT_ORDER: &str = " ORDER BY s.year_level ASC, s.last_name ASC, s.first_name ASC";

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    U8(u8),
    Date(NaiveDate),
}

/// MySQL implementation of every store trait over one connection pool.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn upsert(&self, entry: &NewAttendance) -> StoreResult<UpsertOutcome> {
        let existed = self
            .find_for_date(&entry.student_id, entry.date)
            .await?
            .is_some();

        // A single statement keeps concurrent upserts of the same key down to one row.
        sqlx::query(
            r#"
            INSERT INTO attendance (student_id, date, status, remarks)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                remarks = VALUES(remarks),
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&entry.student_id)
        .bind(entry.date)
        .bind(entry.status.as_ref())
        .bind(&entry.remarks)
        .execute(&self.pool)
        .await?;

        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }

    async fn insert(&self, entry: &NewAttendance) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance (student_id, date, status, remarks)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&entry.student_id)
        .bind(entry.date)
        .bind(entry.status.as_ref())
        .bind(&entry.remarks)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.id = ?");

        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_for_date(
        &self,
        student_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.student_id = ? AND a.date = ?"
        );

        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(student_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list_by_student(&self, student_id: &str) -> StoreResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.student_id = ? ORDER BY a.date DESC"
        );

        let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn list_by_date(&self, date: NaiveDate) -> StoreResult<Vec<AttendanceWithStudent>> {
        let sql = format!(
            r#"
            SELECT {ATTENDANCE_COLUMNS}, s.first_name, s.last_name
            FROM attendance a
            LEFT JOIN students s ON a.student_id = s.student_id
            WHERE a.date = ?
            ORDER BY s.last_name ASC
            "#
        );

        let rows = sqlx::query_as::<_, AttendanceWithStudent>(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_with_students(&self) -> StoreResult<Vec<AttendanceWithStudent>> {
        let sql = format!(
            r#"
            SELECT {ATTENDANCE_COLUMNS}, s.first_name, s.last_name
            FROM attendance a
            LEFT JOIN students s ON a.student_id = s.student_id
            ORDER BY a.date DESC, s.last_name ASC
            "#
        );

        let rows = sqlx::query_as::<_, AttendanceWithStudent>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn report_rows(&self, filter: &ReportFilter) -> StoreResult<Vec<ReportRow>> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(course_id) = filter.course_id {
            where_sql.push_str(" AND s.course_id = ?");
            args.push(FilterValue::U64(course_id));
        }

        if let Some(year_level) = filter.year_level {
            where_sql.push_str(" AND s.year_level = ?");
            args.push(FilterValue::U8(year_level));
        }

        if let Some(date_from) = filter.date_from {
            where_sql.push_str(" AND a.date >= ?");
            args.push(FilterValue::Date(date_from));
        }

        if let Some(date_to) = filter.date_to {
            where_sql.push_str(" AND a.date <= ?");
            args.push(FilterValue::Date(date_to));
        }

        let sql = format!(
            r#"
            SELECT {ATTENDANCE_COLUMNS}, s.first_name, s.last_name, s.year_level,
                   s.course_id, c.course_code, c.course_name
            FROM attendance a
            JOIN students s ON a.student_id = s.student_id
            LEFT JOIN courses c ON s.course_id = c.id
            {where_sql}
            ORDER BY a.date DESC, s.year_level ASC, s.last_name ASC
            "#
        );
        debug!(sql = %sql, "Fetching report rows");

        let mut query = sqlx::query_as::<_, ReportRow>(&sql);
        for arg in args {
            query = match arg {
                FilterValue::U64(v) => query.bind(v),
                FilterValue::U8(v) => query.bind(v),
                FilterValue::Date(v) => query.bind(v),
            };
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn update(&self, id: u64, entry: &NewAttendance) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET student_id = ?, date = ?, status = ?, remarks = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&entry.student_id)
        .bind(entry.date)
        .bind(entry.status.as_ref())
        .bind(&entry.remarks)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM attendance")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

#[async_trait]
impl CourseStore for MySqlStore {
    async fn create(&self, course: &NewCourse) -> StoreResult<u64> {
        let result = sqlx::query(
            "INSERT INTO courses (course_code, course_name, description) VALUES (?, ?, ?)",
        )
        .bind(&course.course_code)
        .bind(&course.course_name)
        .bind(&course.description)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, course_code, course_name, description, created_at FROM courses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn find_by_code(&self, course_code: &str) -> StoreResult<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, course_code, course_name, description, created_at
            FROM courses
            WHERE course_code = ?
            "#,
        )
        .bind(course_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn list(&self) -> StoreResult<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, course_code, course_name, description, created_at
            FROM courses
            ORDER BY course_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(courses)
    }

    async fn update(&self, id: u64, patch: &CoursePatch) -> StoreResult<bool> {
        let update = UpdateBuilder::new()
            .set("course_code", patch.course_code.clone())
            .set("course_name", patch.course_name.clone())
            .set("description", patch.description.clone())
            .build("courses", "id", id);

        let Some(update) = update else {
            return Ok(CourseStore::find_by_id(self, id).await?.is_some());
        };

        Ok(execute_update(&self.pool, update).await? > 0)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, id: u64) -> StoreResult<CourseStats> {
        let stats = sqlx::query_as::<_, CourseStats>(
            r#"
            SELECT
                COUNT(DISTINCT s.id) AS total_students,
                COUNT(DISTINCT s.year_level) AS year_levels,
                COUNT(a.id) AS total_attendance_records
            FROM students s
            LEFT JOIN attendance a ON s.student_id = a.student_id
            WHERE s.course_id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn year_levels(&self, id: u64) -> StoreResult<Vec<u8>> {
        let levels = sqlx::query_scalar::<_, u8>(
            r#"
            SELECT DISTINCT year_level
            FROM students
            WHERE course_id = ?
            ORDER BY year_level ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(levels)
    }

    async fn count(&self) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

#[async_trait]
impl StudentStore for MySqlStore {
    async fn create(&self, student: &NewStudent) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO students
            (student_id, first_name, last_name, email, phone, address, course_id, year_level)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.student_id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.address)
        .bind(student.course_id)
        .bind(student.year_level)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<Student>> {
        let sql = format!("{STUDENT_SELECT} WHERE s.id = ?");

        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    async fn find_by_student_id(&self, student_id: &str) -> StoreResult<Option<Student>> {
        let sql = format!("{STUDENT_SELECT} WHERE s.student_id = ?");

        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Student>> {
        let sql = format!("{STUDENT_SELECT} WHERE s.email = ?");

        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(student)
    }

    async fn list(&self) -> StoreResult<Vec<Student>> {
        let sql = format!("{STUDENT_SELECT}{STUDENT_ORDER}");

        Ok(sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn search_by_name(&self, name: &str) -> StoreResult<Vec<Student>> {
        let sql = format!("{STUDENT_SELECT} WHERE s.first_name LIKE ? OR s.last_name LIKE ?{STUDENT_ORDER}");
        let like = format!("%{}%", name);

        Ok(sqlx::query_as::<_, Student>(&sql)
            .bind(&like)
            .bind(&like)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_by_course(
        &self,
        course_id: u64,
        year_level: Option<u8>,
    ) -> StoreResult<Vec<Student>> {
        let mut sql = format!("{STUDENT_SELECT} WHERE s.course_id = ?");
        if year_level.is_some() {
            sql.push_str(" AND s.year_level = ?");
        }
        sql.push_str(STUDENT_ORDER);

        let mut query = sqlx::query_as::<_, Student>(&sql).bind(course_id);
        if let Some(year_level) = year_level {
            query = query.bind(year_level);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn list_without_accounts(&self) -> StoreResult<Vec<Student>> {
        let sql = format!(
            "{STUDENT_SELECT} LEFT JOIN users u ON s.student_id = u.student_id WHERE u.id IS NULL ORDER BY s.last_name ASC"
        );

        Ok(sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn last_student_id(&self, prefix: &str) -> StoreResult<Option<String>> {
        let last = sqlx::query_scalar::<_, String>(
            r#"
            SELECT student_id
            FROM students
            WHERE student_id LIKE ?
            ORDER BY CAST(SUBSTRING_INDEX(student_id, '-', -1) AS UNSIGNED) DESC, student_id DESC
            LIMIT 1
            "#,
        )
        .bind(format!("{prefix}%"))
        .fetch_optional(&self.pool)
        .await?;

        Ok(last)
    }

    async fn update(&self, id: u64, patch: &StudentPatch) -> StoreResult<bool> {
        let update = UpdateBuilder::new()
            .set("student_id", patch.student_id.clone())
            .set("first_name", patch.first_name.clone())
            .set("last_name", patch.last_name.clone())
            .set("email", patch.email.clone())
            .set("phone", patch.phone.clone())
            .set("address", patch.address.clone())
            .set("course_id", patch.course_id)
            .set("year_level", patch.year_level)
            .build("students", "id", id);

        let Some(update) = update else {
            return Ok(StudentStore::find_by_id(self, id).await?.is_some());
        };

        Ok(execute_update(&self.pool, update).await? > 0)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn find_for_login(&self, login: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password, role, student_id
            FROM users
            WHERE username = ? OR student_id = ?
            LIMIT 1
            "#,
        )
        .bind(login)
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: u64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, role, student_id FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let matches = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;

        Ok(matches > 0)
    }

    async fn create(&self, user: &NewUser) -> StoreResult<u64> {
        let result = sqlx::query(
            "INSERT INTO users (username, password, role, student_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role.as_ref())
        .bind(&user.student_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn create_with_student(
        &self,
        student: &NewStudent,
        user: &NewUser,
    ) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO students
            (student_id, first_name, last_name, email, phone, address, course_id, year_level)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&student.student_id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.address)
        .bind(student.course_id)
        .bind(student.year_level)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO users (username, password, role, student_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role.as_ref())
        .bind(&student.student_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.last_insert_id())
    }

    async fn update_password(&self, user_id: u64, password_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_by_role(&self, role: Role) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(role.as_ref())
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, FROM_UNIXTIME(?))
            "#,
        )
        .bind(user_id)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_refresh_token(&self, jti: &str) -> StoreResult<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT user_id, revoked
            FROM refresh_tokens
            WHERE jti = ?
            AND expires_at > NOW()
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
            .bind(jti)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
