use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::session::SessionContext,
    engine::{
        self, available_months_and_years, filter_by_month_year_status,
        policy::LOGGING_WINDOW_MESSAGE,
    },
    error::{AttendanceError, storage_fault},
    model::attendance::{
        AttendanceForm, AttendanceHistory, AttendanceRecord, AttendanceStatus,
        AttendanceWithStudent, HistoryQuery, LogAttendanceForm, LoggedAttendance, NewAttendance,
        UpsertOutcome,
    },
    service::clean,
    store::{AttendanceStore, StoreError},
};

const INVALID_STATUS: &str = "Valid status is required (Present, Absent, Late)";
const DUPLICATE_RECORD: &str = "Attendance already recorded for this student on this date";

/// Writes that hit a foreign key conflict name a student that does not exist.
fn write_fault(context: &'static str) -> impl Fn(StoreError) -> AttendanceError {
    move |e| match e {
        StoreError::Conflict(_) => AttendanceError::validation("Student not found"),
        other => storage_fault(context)(other),
    }
}

fn parse_status(raw: Option<&str>) -> Option<AttendanceStatus> {
    raw.map(str::trim).and_then(|s| s.parse().ok())
}

/// Checks a submitted record; every problem is reported at once.
pub fn validate_entry(
    form: &AttendanceForm,
    today: NaiveDate,
) -> Result<NewAttendance, AttendanceError> {
    let mut errors = Vec::new();

    let student_id = clean(form.student_id.as_deref());
    if student_id.is_none() {
        errors.push("Student ID is required".to_string());
    }

    match form.date {
        None => errors.push("Date is required".to_string()),
        Some(date) if date > today => {
            errors.push("Cannot log attendance for future dates".to_string())
        }
        Some(_) => {}
    }

    let status = parse_status(form.status.as_deref());
    if status.is_none() {
        errors.push(INVALID_STATUS.to_string());
    }

    match (student_id, form.date, status) {
        (Some(student_id), Some(date), Some(status)) if errors.is_empty() => Ok(NewAttendance {
            student_id,
            date,
            status,
            remarks: clean(form.remarks.as_deref()),
        }),
        _ => Err(AttendanceError::Validation(errors)),
    }
}

pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    /// A student logs their own attendance. Today's log is only accepted
    /// inside the logging window; without a chosen status it is Present up
    /// to the cutoff and Late after it.
    #[instrument(skip(self, session, form), fields(user = %session.username))]
    pub async fn log_attendance(
        &self,
        session: &SessionContext,
        form: &LogAttendanceForm,
        now: NaiveDateTime,
    ) -> Result<LoggedAttendance, AttendanceError> {
        let student_id = session.require_student()?;
        let today = now.date();
        let date = form.attendance_date.unwrap_or(today);

        if date == today && !engine::is_logging_allowed(now.time()) {
            warn!(time = %now.time(), "Attendance logged outside the window");
            return Err(AttendanceError::PolicyViolation(
                LOGGING_WINDOW_MESSAGE.to_string(),
            ));
        }

        let chosen = clean(form.status.as_deref());
        let status = match chosen {
            None if date == today => {
                Some(engine::resolve_auto_status(now.time(), engine::DEFAULT_CUTOFF).to_string())
            }
            other => other,
        };

        let entry = validate_entry(
            &AttendanceForm {
                student_id: Some(student_id.to_string()),
                date: Some(date),
                status,
                remarks: form.remarks.clone(),
            },
            today,
        )
        .inspect_err(|e| warn!(error = %e, "Rejected attendance log"))?;

        let outcome = self.write(&entry).await?;

        Ok(LoggedAttendance {
            outcome,
            date: entry.date,
            status: entry.status,
        })
    }

    /// Inserts the record for (student, date) or replaces the existing one.
    pub async fn upsert_for_date(
        &self,
        form: &AttendanceForm,
        today: NaiveDate,
    ) -> Result<UpsertOutcome, AttendanceError> {
        let entry = validate_entry(form, today)?;
        self.write(&entry).await
    }

    async fn write(&self, entry: &NewAttendance) -> Result<UpsertOutcome, AttendanceError> {
        let outcome = self
            .store
            .upsert(entry)
            .await
            .map_err(write_fault("Failed to save attendance"))?;

        info!(
            student_id = %entry.student_id,
            date = %entry.date,
            status = %entry.status,
            ?outcome,
            "Attendance saved"
        );

        Ok(outcome)
    }

    pub async fn exists_for_date(
        &self,
        student_id: &str,
        date: NaiveDate,
    ) -> Result<bool, AttendanceError> {
        Ok(self.get_for_date(student_id, date).await?.is_some())
    }

    pub async fn get_for_date(
        &self,
        student_id: &str,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        self.store
            .find_for_date(student_id, date)
            .await
            .map_err(storage_fault("Failed to fetch attendance"))
    }

    /// Newest first.
    pub async fn list_by_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        self.store
            .list_by_student(student_id)
            .await
            .map_err(storage_fault("Failed to list student attendance"))
    }

    pub async fn list_by_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceWithStudent>, AttendanceError> {
        self.store
            .list_by_date(date)
            .await
            .map_err(storage_fault("Failed to list attendance by date"))
    }

    pub async fn list_all(&self) -> Result<Vec<AttendanceWithStudent>, AttendanceError> {
        self.store
            .list_with_students()
            .await
            .map_err(storage_fault("Failed to list attendance"))
    }

    /// A student's records narrowed by month, year and status.
    pub async fn history(
        &self,
        student_id: &str,
        query: &HistoryQuery,
    ) -> Result<AttendanceHistory, AttendanceError> {
        let status = match clean(query.status.as_deref()) {
            None => None,
            Some(raw) => Some(
                raw.parse::<AttendanceStatus>()
                    .map_err(|_| AttendanceError::validation(INVALID_STATUS))?,
            ),
        };
        if query.month.is_some_and(|m| !(1..=12).contains(&m)) {
            return Err(AttendanceError::validation("Month must be between 1 and 12"));
        }

        let all = self.list_by_student(student_id).await?;
        let (months, years) = available_months_and_years(&all);
        let records = filter_by_month_year_status(&all, query.month, query.year, status);

        Ok(AttendanceHistory {
            summary: engine::summarize(&records),
            records,
            months,
            years,
        })
    }

    /// Admin insert; a second record for the same student and date is a
    /// conflict.
    pub async fn create(
        &self,
        form: &AttendanceForm,
        today: NaiveDate,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let entry = validate_entry(form, today)?;

        if self.exists_for_date(&entry.student_id, entry.date).await? {
            return Err(AttendanceError::Conflict(DUPLICATE_RECORD.into()));
        }

        let id = self
            .store
            .insert(&entry)
            .await
            .map_err(write_fault("Failed to create attendance"))?;
        info!(id, student_id = %entry.student_id, "Attendance created");

        self.get(id).await
    }

    pub async fn get(&self, id: u64) -> Result<AttendanceRecord, AttendanceError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(storage_fault("Failed to fetch attendance"))?
            .ok_or_else(|| AttendanceError::NotFound("Attendance record not found".into()))
    }

    pub async fn update(
        &self,
        id: u64,
        form: &AttendanceForm,
        today: NaiveDate,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.get(id).await?;
        let entry = validate_entry(form, today)?;

        let clash = self.get_for_date(&entry.student_id, entry.date).await?;
        if clash.is_some_and(|other| other.id != id) {
            return Err(AttendanceError::Conflict(DUPLICATE_RECORD.into()));
        }

        self.store
            .update(id, &entry)
            .await
            .map_err(write_fault("Failed to update attendance"))?;
        info!(id, "Attendance updated");

        self.get(id).await
    }

    pub async fn delete(&self, id: u64) -> Result<(), AttendanceError> {
        let deleted = self
            .store
            .delete(id)
            .await
            .map_err(storage_fault("Failed to delete attendance"))?;

        if !deleted {
            return Err(AttendanceError::NotFound("Attendance record not found".into()));
        }
        info!(id, "Attendance deleted");

        Ok(())
    }
}
