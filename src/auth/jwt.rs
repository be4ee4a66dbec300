use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::{
    auth::session::SessionContext,
    models::{Claims, TokenType},
};

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn claims_for(session: &SessionContext, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: session.user_id,
        sub: session.username.clone(),
        role: session.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        student_id: session.student_id.clone(),
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    session: &SessionContext,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    sign(&claims_for(session, TokenType::Access, ttl), secret)
}

/// Returns the token and its claims; the caller persists `claims.jti`.
pub fn generate_refresh_token(
    session: &SessionContext,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims_for(session, TokenType::Refresh, ttl);
    let token = sign(&claims, secret)?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn student() -> SessionContext {
        SessionContext {
            user_id: 4,
            username: "msantos".into(),
            role: Role::Student,
            student_id: Some("2026-007".into()),
        }
    }

    #[test]
    fn access_token_round_trips_identity() {
        let token = generate_access_token(&student(), "s3cret", 900).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();

        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(SessionContext::from(claims), student());
    }

    #[test]
    fn refresh_tokens_get_unique_ids() {
        let (_, first) = generate_refresh_token(&student(), "s3cret", 60).unwrap();
        let (_, second) = generate_refresh_token(&student(), "s3cret", 60).unwrap();

        assert_eq!(first.token_type, TokenType::Refresh);
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let token = generate_access_token(&student(), "s3cret", 900).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }
}
