use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        session::SessionContext,
    },
    config::Config,
    error::AttendanceError,
    model::role::Role,
    models::{Claims, LoginReqDto, RegisterReq, TokenType},
    service::AccountService,
};

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[schema(example = "student")]
    role: Role,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Claims of a valid refresh token in the Authorization header.
fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer_token(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Signs an access/refresh pair and records the refresh token id.
async fn issue_tokens(
    session: &SessionContext,
    accounts: &AccountService,
    config: &Config,
) -> Result<LoginResponse, AttendanceError> {
    let signing_fault = |e: jsonwebtoken::errors::Error| {
        error!(error = %e, "Failed to sign token");
        AttendanceError::Storage
    };

    debug!("Generating access token");
    let access_token =
        generate_access_token(session, &config.jwt_secret, config.access_token_ttl)
            .map_err(signing_fault)?;

    debug!("Generating refresh token");
    let (refresh_token, claims) =
        generate_refresh_token(session, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(signing_fault)?;

    debug!(user_id = session.user_id, jti = %claims.jti, "Storing refresh token");
    accounts
        .remember_refresh_token(session.user_id, &claims.jti, claims.exp as i64)
        .await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        role: session.role,
    })
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "errors": ["Username already exists", "Password must be at least 6 characters long"]
        }))
    ),
    tag = "Auth"
)]
pub async fn register(
    payload: web::Json<RegisterReq>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AttendanceError> {
    accounts.register(&payload).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully"
    })))
}

/// Log in with a username or a student ID
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(accounts, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    accounts: web::Data<AccountService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AttendanceError> {
    info!("Login request received");

    let session = accounts.authenticate(&user.username, &user.password).await?;
    debug!(user_id = session.user_id, "Password verified");

    let tokens = issue_tokens(&session, &accounts, &config).await?;
    info!("Login successful");

    Ok(HttpResponse::Ok().json(tokens))
}

/// Exchange a refresh token for a new pair; the old one is revoked
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = LoginResponse),
        (status = 401, description = "Missing, expired or revoked refresh token")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh_token(
    req: HttpRequest,
    accounts: web::Data<AccountService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AttendanceError> {
    let claims = refresh_claims(&req, &config).ok_or(AttendanceError::Unauthorized)?;

    let session = accounts.rotate_refresh_token(&claims.jti).await?;
    let tokens = issue_tokens(&session, &accounts, &config).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke a refresh token; always succeeds
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    req: HttpRequest,
    accounts: web::Data<AccountService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AttendanceError> {
    if let Some(claims) = refresh_claims(&req, &config) {
        accounts.revoke_refresh_token(&claims.jti).await?;
    }

    Ok(HttpResponse::NoContent().finish())
}
