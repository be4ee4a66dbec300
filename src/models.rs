use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{role::Role, student::StudentForm};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "msantos")]
    pub username: String,
    #[schema(example = "secret123")]
    pub password: String,
    /// admin or student
    #[schema(example = "student")]
    pub role: String,
    /// Student profile, required when `role` is student
    #[serde(flatten)]
    pub profile: StudentForm,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    /// Username or student ID
    #[schema(example = "msantos")]
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordReq {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAccountReq {
    #[schema(example = "msantos")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only for student accounts
    pub student_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}
