use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

use crate::{
    auth::jwt::verify_token,
    config::Config,
    error::AttendanceError,
    model::{role::Role, user::User},
    models::{Claims, TokenType},
};

/// Identity of the caller, handed explicitly to every operation that needs
/// to know who is acting.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only for student accounts
    pub student_id: Option<String>,
}

impl From<Claims> for SessionContext {
    fn from(claims: Claims) -> Self {
        SessionContext {
            user_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
            student_id: claims.student_id,
        }
    }
}

impl From<&User> for SessionContext {
    fn from(user: &User) -> Self {
        SessionContext {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            student_id: user.student_id.clone(),
        }
    }
}

impl SessionContext {
    pub fn require_admin(&self) -> Result<(), AttendanceError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AttendanceError::Forbidden("Admin only".into()))
        }
    }

    /// The linked student ID of a student session.
    pub fn require_student(&self) -> Result<&str, AttendanceError> {
        if self.role != Role::Student {
            return Err(AttendanceError::Forbidden("Students only".into()));
        }

        self.student_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AttendanceError::Forbidden("No student profile linked to this account".into())
            })
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by the auth middleware on protected scopes.
        if let Some(session) = req.extensions().get::<SessionContext>() {
            return ready(Ok(session.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        match verify_token(token, &config.jwt_secret) {
            Ok(claims) if claims.token_type == TokenType::Access => ready(Ok(claims.into())),
            _ => ready(Err(ErrorUnauthorized("Invalid token"))),
        }
    }
}
