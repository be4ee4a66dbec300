use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        session::SessionContext,
    },
    error::{AttendanceError, storage_fault},
    model::{
        role::Role,
        user::{NewUser, User},
    },
    models::{ChangePasswordReq, CreateAccountReq, RegisterReq},
    service::{clean, student::validate_profile},
    store::{CourseStore, StoreError, StudentStore, UserStore},
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

const DUPLICATE_USERNAME: &str = "Username already exists";

fn hash(password: &str) -> Result<String, AttendanceError> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        AttendanceError::Storage
    })
}

fn password_errors(password: &str, errors: &mut Vec<String>) {
    if password.is_empty() {
        errors.push("Password is required".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
}

fn write_fault(e: StoreError) -> AttendanceError {
    match e {
        StoreError::Conflict(_) => AttendanceError::Conflict(DUPLICATE_USERNAME.into()),
        other => storage_fault("Failed to save account")(other),
    }
}

pub struct AccountService {
    users: Arc<dyn UserStore>,
    students: Arc<dyn StudentStore>,
    courses: Arc<dyn CourseStore>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        students: Arc<dyn StudentStore>,
        courses: Arc<dyn CourseStore>,
    ) -> Self {
        Self {
            users,
            students,
            courses,
        }
    }

    /// Required, trimmed and not taken.
    async fn check_username(
        &self,
        raw: &str,
        errors: &mut Vec<String>,
    ) -> Result<Option<String>, AttendanceError> {
        let Some(username) = clean(Some(raw)) else {
            errors.push("Username is required".to_string());
            return Ok(None);
        };

        let taken = self
            .users
            .username_exists(&username)
            .await
            .map_err(storage_fault("Failed to check username"))?;
        if taken {
            errors.push(DUPLICATE_USERNAME.to_string());
        }

        Ok(Some(username))
    }

    /// Creates an account. Student accounts carry a full student profile and
    /// create the student row in the same transaction.
    #[instrument(skip(self, req), fields(username = %req.username))]
    pub async fn register(&self, req: &RegisterReq) -> Result<u64, AttendanceError> {
        let mut errors = Vec::new();

        let username = self.check_username(&req.username, &mut errors).await?;
        password_errors(&req.password, &mut errors);

        let role = req.role.trim().parse::<Role>().ok();
        if role.is_none() {
            errors.push("Valid role is required (admin or student)".to_string());
        }

        let profile = match role {
            Some(Role::Student) => match validate_profile(
                self.students.as_ref(),
                self.courses.as_ref(),
                &req.profile,
                None,
            )
            .await
            {
                Ok(profile) => Some(profile),
                Err(AttendanceError::Validation(profile_errors)) => {
                    errors.extend(profile_errors);
                    None
                }
                Err(other) => return Err(other),
            },
            _ => None,
        };

        let (Some(username), Some(role), true) = (username, role, errors.is_empty()) else {
            warn!(?errors, "Registration rejected");
            return Err(AttendanceError::Validation(errors));
        };

        let user = NewUser {
            username,
            password: hash(&req.password)?,
            role,
            student_id: profile.as_ref().map(|p| p.student_id.clone()),
        };

        let id = match &profile {
            Some(student) => self.users.create_with_student(student, &user).await,
            None => self.users.create(&user).await,
        }
        .map_err(write_fault)?;
        info!(id, role = %user.role, "Account registered");

        Ok(id)
    }

    /// Accepts a username or a student ID as the login.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<SessionContext, AttendanceError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AttendanceError::validation(
                "Username and password are required",
            ));
        }

        let user = self
            .users
            .find_for_login(login)
            .await
            .map_err(storage_fault("Failed to fetch user"))?
            .ok_or(AttendanceError::Unauthorized)?;

        if let Err(e) = verify_password(password, &user.password) {
            info!(error = %e, "Invalid credentials: password mismatch");
            return Err(AttendanceError::Unauthorized);
        }

        Ok(SessionContext::from(&user))
    }

    async fn user(&self, user_id: u64) -> Result<Option<User>, AttendanceError> {
        self.users
            .find_by_id(user_id)
            .await
            .map_err(storage_fault("Failed to fetch user"))
    }

    pub async fn change_password(
        &self,
        session: &SessionContext,
        req: &ChangePasswordReq,
    ) -> Result<(), AttendanceError> {
        let user = self
            .user(session.user_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Account not found".into()))?;

        if verify_password(&req.old_password, &user.password).is_err() {
            return Err(AttendanceError::validation("Current password is incorrect"));
        }

        let mut errors = Vec::new();
        password_errors(&req.new_password, &mut errors);
        if !errors.is_empty() {
            return Err(AttendanceError::Validation(errors));
        }

        self.users
            .update_password(user.id, &hash(&req.new_password)?)
            .await
            .map_err(storage_fault("Failed to update password"))?;
        info!(user_id = user.id, "Password changed");

        Ok(())
    }

    /// Admin creates the login of an existing student.
    pub async fn create_student_account(
        &self,
        student_id: &str,
        req: &CreateAccountReq,
    ) -> Result<u64, AttendanceError> {
        let student = self
            .students
            .find_by_student_id(student_id)
            .await
            .map_err(storage_fault("Failed to fetch student"))?
            .ok_or_else(|| AttendanceError::NotFound("Student not found".into()))?;

        let linked = self
            .users
            .find_for_login(&student.student_id)
            .await
            .map_err(storage_fault("Failed to fetch user"))?
            .is_some_and(|u| u.student_id.as_deref() == Some(student.student_id.as_str()));
        if linked {
            return Err(AttendanceError::Conflict(
                "Student already has an account".into(),
            ));
        }

        let mut errors = Vec::new();
        let username = self.check_username(&req.username, &mut errors).await?;
        password_errors(&req.password, &mut errors);
        let (Some(username), true) = (username, errors.is_empty()) else {
            return Err(AttendanceError::Validation(errors));
        };

        let id = self
            .users
            .create(&NewUser {
                username,
                password: hash(&req.password)?,
                role: Role::Student,
                student_id: Some(student.student_id.clone()),
            })
            .await
            .map_err(write_fault)?;
        info!(id, student_id = %student.student_id, "Student account created");

        Ok(id)
    }

    pub async fn remember_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: i64,
    ) -> Result<(), AttendanceError> {
        self.users
            .store_refresh_token(user_id, jti, expires_at)
            .await
            .map_err(storage_fault("Failed to store refresh token"))
    }

    /// Revokes a live refresh token and returns the current identity of its
    /// owner, so the caller can issue a new pair.
    pub async fn rotate_refresh_token(&self, jti: &str) -> Result<SessionContext, AttendanceError> {
        let record = self
            .users
            .find_refresh_token(jti)
            .await
            .map_err(storage_fault("Failed to fetch refresh token"))?;

        let record = match record {
            Some(r) if !r.revoked => r,
            _ => return Err(AttendanceError::Unauthorized),
        };

        self.revoke_refresh_token(jti).await?;

        let user = self
            .user(record.user_id)
            .await?
            .ok_or(AttendanceError::Unauthorized)?;

        Ok(SessionContext::from(&user))
    }

    /// Idempotent.
    pub async fn revoke_refresh_token(&self, jti: &str) -> Result<(), AttendanceError> {
        self.users
            .revoke_refresh_token(jti)
            .await
            .map_err(storage_fault("Failed to revoke refresh token"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::student::StudentForm, store::memory::MemoryStore};

    fn setup() -> (Arc<MemoryStore>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        store.seed_student("2026-001", "Ana", "Cruz", "Computer Science", 1);
        let service = AccountService::new(store.clone(), store.clone(), store.clone());
        (store, service)
    }

    fn admin(username: &str, password: &str) -> RegisterReq {
        RegisterReq {
            username: username.into(),
            password: password.into(),
            role: "admin".into(),
            profile: StudentForm::default(),
        }
    }

    #[actix_web::test]
    async fn registered_admin_can_log_in() {
        let (_, service) = setup();

        service.register(&admin("root", "secret123")).await.unwrap();

        let session = service.authenticate("root", "secret123").await.unwrap();
        assert_eq!(session.role, Role::Admin);
        assert!(matches!(
            service.authenticate("root", "wrong-pass").await,
            Err(AttendanceError::Unauthorized)
        ));
        assert!(matches!(
            service.authenticate("nobody", "secret123").await,
            Err(AttendanceError::Unauthorized)
        ));
    }

    #[actix_web::test]
    async fn registration_validates_credentials_and_role() {
        let (_, service) = setup();
        service.register(&admin("root", "secret123")).await.unwrap();

        let err = service
            .register(&RegisterReq {
                role: "teacher".into(),
                ..admin("root", "123")
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.messages(),
            vec![
                "Username already exists",
                "Password must be at least 6 characters long",
                "Valid role is required (admin or student)",
            ]
        );
    }

    #[actix_web::test]
    async fn student_registration_creates_profile_and_login_by_student_id() {
        let (store, service) = setup();
        let course_id = store.seed_course_id("Computer Science");

        service
            .register(&RegisterReq {
                username: "msantos".into(),
                password: "secret123".into(),
                role: "student".into(),
                profile: StudentForm {
                    student_id: Some("2026-002".into()),
                    first_name: Some("Maria".into()),
                    last_name: Some("Santos".into()),
                    email: Some("maria@school.edu".into()),
                    course_id: Some(course_id),
                    year_level: Some(1),
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        let session = service.authenticate("2026-002", "secret123").await.unwrap();
        assert_eq!(session.username, "msantos");
        assert_eq!(session.require_student().unwrap(), "2026-002");
    }

    #[actix_web::test]
    async fn student_registration_needs_a_profile() {
        let (_, service) = setup();

        let err = service
            .register(&RegisterReq {
                role: "student".into(),
                ..admin("msantos", "secret123")
            })
            .await
            .unwrap_err();

        assert!(err.messages().contains(&"Student ID is required".to_string()));
        assert!(err.messages().contains(&"Course selection is required".to_string()));
    }

    #[actix_web::test]
    async fn password_change_checks_the_old_password() {
        let (_, service) = setup();
        service.register(&admin("root", "secret123")).await.unwrap();
        let session = service.authenticate("root", "secret123").await.unwrap();

        let wrong = service
            .change_password(
                &session,
                &ChangePasswordReq {
                    old_password: "nope".into(),
                    new_password: "another1".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(wrong.messages(), vec!["Current password is incorrect"]);

        service
            .change_password(
                &session,
                &ChangePasswordReq {
                    old_password: "secret123".into(),
                    new_password: "another1".into(),
                },
            )
            .await
            .unwrap();
        assert!(service.authenticate("root", "another1").await.is_ok());
    }

    #[actix_web::test]
    async fn one_account_per_student() {
        let (_, service) = setup();
        let req = CreateAccountReq {
            username: "acruz".into(),
            password: "secret123".into(),
        };

        service.create_student_account("2026-001", &req).await.unwrap();

        let again = service
            .create_student_account(
                "2026-001",
                &CreateAccountReq {
                    username: "acruz2".into(),
                    ..req
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(again, AttendanceError::Conflict(_)));

        let missing = service
            .create_student_account(
                "2026-404",
                &CreateAccountReq {
                    username: "ghost".into(),
                    password: "secret123".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, AttendanceError::NotFound(_)));
    }

    #[actix_web::test]
    async fn refresh_tokens_rotate_once() {
        let (_, service) = setup();
        let id = service.register(&admin("root", "secret123")).await.unwrap();
        service
            .remember_refresh_token(id, "jti-1", i64::MAX)
            .await
            .unwrap();

        let session = service.rotate_refresh_token("jti-1").await.unwrap();
        assert_eq!(session.user_id, id);

        assert!(matches!(
            service.rotate_refresh_token("jti-1").await,
            Err(AttendanceError::Unauthorized)
        ));
        assert!(service.revoke_refresh_token("unknown").await.is_ok());
    }
}
